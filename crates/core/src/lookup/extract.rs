//! Product page extraction.
//!
//! Every field is best-effort: a missing meta tag or detail row leaves that field
//! unset. Only title and authors are required for a record to exist.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use chrono_tz::Europe::Oslo;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::LookupError;
use crate::fetch::Fetcher;
use crate::host::HostServices;
use crate::lookup::languages::parse_languages;
use crate::metadata::Metadata;

static META: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").unwrap());
static CONTRIBUTORS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[data-component='pdp-contributors'] a").unwrap());
static DETAIL_CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("dl dt, dl dd").unwrap());
static SERIES_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"Del (\d+) av serien").unwrap());

const LABEL_PUBLISHER: &str = "Forlag";
const LABEL_FIRST_SALE: &str = "Første salgsdato";
const LABEL_LANGUAGE: &str = "Språk";
const LABEL_SERIES: &str = "Serie";

/// Raw fields scraped from a product page, before any record is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPage {
    pub title: Option<String>,
    pub cover_url: Option<String>,
    pub isbn: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub pubdate: Option<DateTime<FixedOffset>>,
    pub languages: Vec<String>,
    pub series: Option<String>,
    pub series_index: Option<f32>,
}

impl ProductPage {
    /// Title and at least one author: the minimum for a record.
    pub fn is_complete(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty()) && !self.authors.is_empty()
    }
}

pub fn parse_product_page(html: &str) -> ProductPage {
    let document = Html::parse_document(html);
    let mut page = ProductPage::default();

    for meta in document.select(&META) {
        let el = meta.value();
        let content = el.attr("content").map(|c| c.trim().to_string());
        match (el.attr("property"), el.attr("name")) {
            (Some("og:title"), _) => {
                tracing::debug!("Found title: {:?}", content);
                page.title = content;
            }
            (Some("og:image"), _) => {
                tracing::debug!("Found cover URL: {:?}", content);
                page.cover_url = content;
            }
            (_, Some("evg:sku")) => {
                tracing::debug!("Found ISBN: {:?}", content);
                page.isbn = content;
            }
            _ => {}
        }
    }

    page.authors = document
        .select(&CONTRIBUTORS)
        .map(|a| element_text(&a))
        .filter(|a| !a.is_empty())
        .collect();
    tracing::debug!("Found authors: {:?}", page.authors);

    let details = detail_pairs(&document);
    page.publisher = details.get(LABEL_PUBLISHER).cloned();
    page.pubdate = details.get(LABEL_FIRST_SALE).and_then(|raw| {
        let parsed = parse_first_sale_date(raw);
        if parsed.is_none() {
            tracing::warn!("Unparsable first sale date {:?}, leaving it unset", raw);
        }
        parsed
    });
    page.languages = details.get(LABEL_LANGUAGE).map(|l| parse_languages(l)).unwrap_or_default();
    page.series = details.get(LABEL_SERIES).cloned();
    page.series_index = series_index(&document);

    page
}

/// `dt` label → `dd` value for every definition list on the page. Labels are
/// trimmed of a trailing colon; the first occurrence of a label wins.
fn detail_pairs(document: &Html) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    let mut label: Option<String> = None;
    for cell in document.select(&DETAIL_CELLS) {
        let text = element_text(&cell);
        match cell.value().name() {
            "dt" => label = Some(text.trim_end_matches(':').trim_end().to_string()),
            "dd" => {
                if let Some(l) = label.take() {
                    if !text.is_empty() {
                        pairs.entry(l).or_insert(text);
                    }
                }
            }
            _ => {}
        }
    }
    pairs
}

/// `dd.mm.yyyy`, pinned to midnight in Oslo.
pub fn parse_first_sale_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%d.%m.%Y").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Oslo.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

fn series_index(document: &Html) -> Option<f32> {
    document
        .root_element()
        .text()
        .filter(|t| t.contains(" av serien"))
        .find_map(parse_series_index)
}

/// Number from "Del N av serien ..."; anything else leaves the index unset.
pub fn parse_series_index(text: &str) -> Option<f32> {
    let caps = SERIES_INDEX.captures(text)?;
    caps.get(1)?.as_str().parse::<f32>().ok()
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn a complete page into a record, registering its cover with the host.
pub fn page_to_metadata(page: ProductPage, host: &dyn HostServices, relevance: i32) -> Option<Metadata> {
    if !page.is_complete() {
        return None;
    }
    let title = page.title?;
    let mut mi = Metadata::new(title, page.authors);
    mi.source_relevance = relevance;
    if let Some(sku) = page.isbn.as_deref().filter(|i| !i.is_empty()) {
        match host.check_isbn(sku) {
            Some(isbn) => mi.set_identifier("isbn", isbn),
            None => tracing::debug!("Ignoring sku {:?}, not an ISBN", sku),
        }
    }
    let cover_url = page.cover_url.filter(|c| !c.is_empty());
    mi.has_cover = cover_url.is_some();
    if let (Some(isbn), Some(cover)) = (mi.isbn(), cover_url.as_deref()) {
        host.cache_cover_url(isbn, cover);
    }
    mi.publisher = page.publisher;
    mi.pubdate = page.pubdate;
    mi.languages = page.languages;
    mi.series = page.series;
    mi.series_index = page.series_index;

    host.clean_metadata(&mut mi);
    if mi.title.is_empty() || mi.authors.is_empty() {
        return None;
    }
    Some(mi)
}

/// Fetch and extract one product page. `Ok(None)` is a soft-miss: an HTTP error
/// status, or a page without title or authors.
pub fn fetch_metadata(
    fetcher: &dyn Fetcher,
    host: &dyn HostServices,
    url: &str,
    relevance: i32,
    timeout: Duration,
) -> Result<Option<Metadata>, LookupError> {
    tracing::info!("Fetching metadata from URL: {}", url);
    let resp = fetcher.fetch(url, timeout)?;
    if resp.is_error() {
        tracing::info!("{} answered HTTP {}", url, resp.status);
        return Ok(None);
    }
    let page = parse_product_page(&resp.text());
    let mi = page_to_metadata(page, host, relevance);
    match &mi {
        Some(mi) => tracing::info!("Fetched metadata: {} by {}", mi.title, mi.authors.join(" & ")),
        None => tracing::info!("No metadata found at URL: {}", url),
    }
    Ok(mi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;
    use chrono::{Datelike, Timelike};
    use pretty_assertions::assert_eq;

    fn page(head: &str, body: &str) -> String {
        format!("<html><head>{}</head><body>{}</body></html>", head, body)
    }

    const HEAD: &str = r#"
        <meta property="og:title" content="Diamanter og rust - en Hanne Wilhelmsen-roman">
        <meta property="og:image" content="https://images.ark.no/cover/9788205598980.jpg">
        <meta name="evg:sku" content="9788205598980">
        <meta property="og:type" content="product">"#;

    const CONTRIBUTORS_HTML: &str = r#"
        <div data-component="pdp-contributors">Av <a href="/forfatter/anne-holt"> Anne
          Holt </a></div>"#;

    #[test]
    fn meta_tags_and_contributors() {
        let p = parse_product_page(&page(HEAD, CONTRIBUTORS_HTML));
        assert_eq!(p.title.as_deref(), Some("Diamanter og rust - en Hanne Wilhelmsen-roman"));
        assert_eq!(p.cover_url.as_deref(), Some("https://images.ark.no/cover/9788205598980.jpg"));
        assert_eq!(p.isbn.as_deref(), Some("9788205598980"));
        assert_eq!(p.authors, vec!["Anne Holt"]);
        assert!(p.is_complete());
    }

    #[test]
    fn definition_list_fields() {
        let body = format!(
            "{}{}",
            CONTRIBUTORS_HTML,
            r#"<dl class="product-details">
                <dt>Forlag</dt><dd>Gyldendal</dd>
                <dt>Første salgsdato:</dt><dd>12.03.2021</dd>
                <dt>Språk</dt><dd>Norsk, Engelsk, Klingon</dd>
                <div><dt>Serie</dt><dd><a href="/serie/x">Hanne Wilhelmsen</a></dd></div>
                <dt>Sider</dt><dd></dd>
            </dl>"#
        );
        let p = parse_product_page(&page(HEAD, &body));
        assert_eq!(p.publisher.as_deref(), Some("Gyldendal"));
        assert_eq!(p.languages, vec!["no", "en"]);
        assert_eq!(p.series.as_deref(), Some("Hanne Wilhelmsen"));
        let date = p.pubdate.unwrap();
        assert_eq!((date.year(), date.month(), date.day(), date.hour()), (2021, 3, 12, 0));
        assert_eq!(date.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn summer_dates_carry_dst_offset() {
        let date = parse_first_sale_date("01.07.2020").unwrap();
        assert_eq!(date.offset().local_minus_utc(), 7200);
        assert_eq!(date.to_rfc3339(), "2020-07-01T00:00:00+02:00");
    }

    #[test]
    fn bad_date_is_dropped_not_fatal() {
        let body = format!("{}<dl><dt>Første salgsdato</dt><dd>mars 2021</dd></dl>", CONTRIBUTORS_HTML);
        let p = parse_product_page(&page(HEAD, &body));
        assert!(p.pubdate.is_none());
        assert!(p.is_complete());
    }

    #[test]
    fn series_index_from_free_text() {
        assert_eq!(parse_series_index("Del 3 av serien X"), Some(3.0));
        assert_eq!(parse_series_index("Del  av serien X"), None);
        assert_eq!(parse_series_index("Bind 3 av serien X"), None);

        let body = format!("{}<p class=\"series\">Del 12 av serien <a>Harry Hole</a></p>", CONTRIBUTORS_HTML);
        assert_eq!(parse_product_page(&page(HEAD, &body)).series_index, Some(12.0));

        let body = format!("{}<p>Del  av serien Harry Hole</p>", CONTRIBUTORS_HTML);
        assert_eq!(parse_product_page(&page(HEAD, &body)).series_index, None);
    }

    #[test]
    fn series_index_skips_blurbs_mentioning_the_series() {
        let body = format!(
            "{}<p>Nittende bok av serien om Jack Reacher.</p><p>Del 19 av serien <a>Jack Reacher</a></p>",
            CONTRIBUTORS_HTML
        );
        assert_eq!(parse_product_page(&page(HEAD, &body)).series_index, Some(19.0));
    }

    #[test]
    fn missing_contributors_is_incomplete() {
        let p = parse_product_page(&page(HEAD, r#"<div data-component="pdp-contributors"></div>"#));
        assert!(p.authors.is_empty());
        assert!(!p.is_complete());
        assert!(page_to_metadata(p, &InMemoryHost::new(), 0).is_none());
    }

    #[test]
    fn empty_title_is_incomplete() {
        let p = parse_product_page(&page(r#"<meta property="og:title" content="  ">"#, CONTRIBUTORS_HTML));
        assert!(!p.is_complete());
    }

    #[test]
    fn record_caches_cover_and_sets_relevance() {
        let host = InMemoryHost::new();
        let p = parse_product_page(&page(HEAD, CONTRIBUTORS_HTML));
        let mi = page_to_metadata(p, &host, 2).unwrap();
        assert_eq!(mi.isbn(), Some("9788205598980"));
        assert!(mi.has_cover);
        assert_eq!(mi.source_relevance, 2);
        assert_eq!(
            host.cached_cover_url("9788205598980").as_deref(),
            Some("https://images.ark.no/cover/9788205598980.jpg")
        );
    }

    #[test]
    fn hyphenated_sku_is_normalized_before_caching() {
        let host = InMemoryHost::new();
        let head = HEAD.replace(r#"content="9788205598980""#, r#"content="978-82-05-59898-0""#);
        let mi = page_to_metadata(parse_product_page(&page(&head, CONTRIBUTORS_HTML)), &host, 0).unwrap();
        assert_eq!(mi.isbn(), Some("9788205598980"));
        assert_eq!(
            host.cached_cover_url("9788205598980").as_deref(),
            Some("https://images.ark.no/cover/9788205598980.jpg")
        );
    }

    #[test]
    fn invalid_sku_is_not_an_identifier() {
        let host = InMemoryHost::new();
        let head = HEAD.replace(r#"content="9788205598980""#, r#"content="ARK-12345""#);
        let mi = page_to_metadata(parse_product_page(&page(&head, CONTRIBUTORS_HTML)), &host, 0).unwrap();
        assert!(mi.isbn().is_none());
        assert!(mi.has_cover);
        assert_eq!(host.cached_count(), 0);
    }

    #[test]
    fn cover_without_isbn_is_not_cached() {
        let host = InMemoryHost::new();
        let head = r#"<meta property="og:title" content="Personlig"><meta property="og:image" content="https://img/x.jpg">"#;
        let mi = page_to_metadata(parse_product_page(&page(head, CONTRIBUTORS_HTML)), &host, 0).unwrap();
        assert!(mi.has_cover);
        assert!(mi.identifiers.is_empty());
        assert_eq!(host.cached_count(), 0);
    }
}
