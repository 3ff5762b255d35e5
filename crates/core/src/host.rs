//! Services the surrounding cataloging application provides to a metadata source.
//!
//! A source never owns the ISBN rules, the identifier→cover-URL cache or the
//! final cleanup of records; it asks the host. `InMemoryHost` is the stand-alone
//! implementation used by the CLI and the tests.

use std::collections::HashMap;
use std::sync::RwLock;

use unicode_normalization::UnicodeNormalization;

use crate::isbn;
use crate::metadata::Metadata;

pub trait HostServices: Send + Sync {
    /// Validate and normalize an ISBN. `None` means "not an ISBN".
    fn check_isbn(&self, raw: &str) -> Option<String> {
        isbn::check_isbn(raw)
    }

    /// Remember where the cover for `isbn` lives. Last writer wins.
    fn cache_cover_url(&self, isbn: &str, url: &str);

    fn cached_cover_url(&self, isbn: &str) -> Option<String>;

    /// Final normalization applied to every record before it is handed out.
    fn clean_metadata(&self, mi: &mut Metadata) {
        clean_metadata(mi);
    }
}

/// Host with a process-local cover cache.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    covers: RwLock<HashMap<String, String>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_count(&self) -> usize {
        self.covers.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl HostServices for InMemoryHost {
    fn cache_cover_url(&self, isbn: &str, url: &str) {
        match self.covers.write() {
            Ok(mut covers) => {
                covers.insert(isbn.to_string(), url.to_string());
            }
            Err(e) => tracing::warn!("Cover cache poisoned, dropping {}: {}", isbn, e),
        }
    }

    fn cached_cover_url(&self, isbn: &str) -> Option<String> {
        self.covers.read().ok()?.get(isbn).cloned()
    }
}

/// NFC-normalize and trim text fields, dropping empty and duplicate authors.
pub fn clean_metadata(mi: &mut Metadata) {
    mi.title = normalize(&mi.title);

    let mut authors: Vec<String> = Vec::with_capacity(mi.authors.len());
    for author in mi.authors.drain(..) {
        let author = normalize(&author);
        if !author.is_empty() && !authors.contains(&author) {
            authors.push(author);
        }
    }
    mi.authors = authors;

    mi.publisher = mi.publisher.take().map(|p| normalize(&p)).filter(|p| !p.is_empty());
    mi.series = mi.series.take().map(|s| normalize(&s)).filter(|s| !s.is_empty());
}

fn normalize(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.nfc().collect()
}
