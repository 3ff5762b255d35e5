//! Search path: query the shop's e-book search and turn the listing into
//! candidate product URLs.

use std::time::Duration;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::error::LookupError;
use crate::fetch::Fetcher;
use crate::host::HostServices;
use crate::lookup::resolve;

static LISTING_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("div#produkter ul > li[id]").unwrap());

/// Candidate product URLs in listing order. Finite and single-pass; each URL is
/// built when it is pulled, and items whose id is not a valid ISBN are skipped.
pub struct Candidates<'a> {
    ids: std::vec::IntoIter<String>,
    base_url: &'a str,
    host: &'a dyn HostServices,
}

impl<'a> Candidates<'a> {
    fn new(ids: Vec<String>, base_url: &'a str, host: &'a dyn HostServices) -> Self {
        Self {
            ids: ids.into_iter(),
            base_url,
            host,
        }
    }

    fn empty(base_url: &'a str, host: &'a dyn HostServices) -> Self {
        Self::new(Vec::new(), base_url, host)
    }
}

impl Iterator for Candidates<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for id in self.ids.by_ref() {
            match resolve::isbn_url(self.base_url, self.host, &id) {
                Some(url) => {
                    tracing::info!("Found book URL: {}", url);
                    return Some(url);
                }
                None => tracing::debug!("Skipping listing item with id {:?}", id),
            }
        }
        None
    }
}

/// Run one search request. An HTTP error status means no candidates; a
/// transport failure is an error.
pub fn search<'a>(
    fetcher: &dyn Fetcher,
    host: &'a dyn HostServices,
    base_url: &'a str,
    title: Option<&str>,
    author: Option<&str>,
    timeout: Duration,
) -> Result<Candidates<'a>, LookupError> {
    let url = resolve::search_url(base_url, title, author)
        .ok_or_else(|| LookupError::InvalidUrl(base_url.to_string()))?;
    tracing::info!("Searching URL: {}", url);
    let resp = fetcher.fetch(&url, timeout)?;
    if resp.is_error() {
        tracing::info!("Search answered HTTP {}", resp.status);
        return Ok(Candidates::empty(base_url, host));
    }
    let ids = parse_listing(&resp.text());
    Ok(Candidates::new(ids, base_url, host))
}

/// Product ids of the listing items, in page order. Empty ids are dropped.
pub fn parse_listing(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&LISTING_ITEM)
        .filter_map(|li| li.value().attr("id"))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}
