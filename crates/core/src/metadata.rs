use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Identifier scheme → value (e.g. `"isbn" → "9788205598980"`).
pub type Identifiers = BTreeMap<String, String>;

/// A metadata record scraped from one product page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    pub identifiers: Identifiers,
    pub has_cover: bool,
    pub publisher: Option<String>,
    /// Midnight of the first sale date, with the Europe/Oslo offset of that day.
    pub pubdate: Option<DateTime<FixedOffset>>,
    /// ISO 639 codes, in the order the page lists them.
    pub languages: Vec<String>,
    pub series: Option<String>,
    pub series_index: Option<f32>,
    /// Position of the candidate this record came from; lower is more relevant.
    pub source_relevance: i32,
}

impl Metadata {
    pub fn new(title: impl Into<String>, authors: Vec<String>) -> Self {
        Self {
            title: title.into(),
            authors,
            ..Default::default()
        }
    }

    pub fn identifier(&self, scheme: &str) -> Option<&str> {
        self.identifiers.get(scheme).map(|s| s.as_str())
    }

    pub fn set_identifier(&mut self, scheme: &str, value: impl Into<String>) {
        self.identifiers.insert(scheme.to_string(), value.into());
    }

    pub fn isbn(&self) -> Option<&str> {
        self.identifier("isbn")
    }
}

/// Cover bytes downloaded for a record, tagged with the source that found them.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverImage {
    pub source: String,
    pub data: Vec<u8>,
    pub media_type: String,
}

impl CoverImage {
    pub fn new(source: impl Into<String>, data: Vec<u8>) -> Self {
        let media_type = sniff_media_type(&data).to_string();
        Self {
            source: source.into(),
            data,
            media_type,
        }
    }

    /// File extension matching the sniffed media type.
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

fn sniff_media_type(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Gif) => "image/gif",
        Ok(image::ImageFormat::WebP) => "image/webp",
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        _ => "application/octet-stream",
    }
}
