//! Product and search URLs, and ISBNs recovered from product URLs. No network.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

use crate::host::HostServices;
use crate::metadata::Identifiers;

const SEARCH_FORMAT: &str = "E-Bok (EPUB), nedlastbar";

// 13-digit alternative first: a 13-digit ISBN must never match as its 10-digit prefix.
static PRODUCT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:www\.)?ark\.no/produkt/.*-(\d{13}|\d{10})(?:[/?#].*)?$").unwrap()
});

/// Product page URL for a bare ISBN.
pub fn product_url(base_url: &str, isbn: &str) -> String {
    format!("{}/produkt/{}", base_url, isbn)
}

/// Product page URL for an unvalidated ISBN string.
pub fn isbn_url(base_url: &str, host: &dyn HostServices, raw: &str) -> Option<String> {
    let isbn = host.check_isbn(raw)?;
    Some(product_url(base_url, &isbn))
}

/// Product page URL when `identifiers` carries a valid ISBN.
pub fn book_url(base_url: &str, host: &dyn HostServices, identifiers: &Identifiers) -> Option<String> {
    isbn_url(base_url, host, identifiers.get("isbn")?)
}

/// ISBN embedded in a `.../produkt/<slug>-<isbn>` URL, validated by the host.
pub fn isbn_from_url(host: &dyn HostServices, url: &str) -> Option<String> {
    let caps = PRODUCT_URL.captures(url)?;
    host.check_isbn(caps.get(1)?.as_str())
}

/// E-book search URL for a title and first author; missing parts search as empty.
pub fn search_url(base_url: &str, title: Option<&str>, author: Option<&str>) -> Option<String> {
    let mut url = Url::parse(&format!("{}/search", base_url)).ok()?;
    url.query_pairs_mut()
        .append_pair("forfatter", author.unwrap_or(""))
        .append_pair("format", SEARCH_FORMAT)
        .append_pair("text", title.unwrap_or(""));
    Some(url.into())
}
