//! Metadata lookup: the source interface and the types flowing through it.
//!
//! A lookup resolves a query to candidate product URLs (directly from an ISBN,
//! or through the shop's search page), extracts one record per candidate and
//! pushes records onto the caller's channel as they are found.

pub mod ark;
pub mod dispatch;
pub mod extract;
pub mod languages;
pub mod resolve;
pub mod search;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_BASE_URL;
use crate::error::LookupError;
use crate::metadata::{CoverImage, Identifiers, Metadata};

/// A metadata source with the fixed method set a cataloging host calls.
pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Find records for `query` and send each one to `results` as soon as it is
    /// extracted. Only a failed search request is an error; everything else is
    /// reported per candidate.
    fn identify(
        &self,
        results: &Sender<Metadata>,
        abort: &AbortFlag,
        query: &MetadataQuery,
        timeout: Duration,
    ) -> Result<IdentifyReport, LookupError>;

    /// Find and download a cover for `query`, sending it to `results`. Never fails;
    /// the outcome says what happened.
    fn download_cover(
        &self,
        results: &Sender<CoverImage>,
        abort: &AbortFlag,
        query: &MetadataQuery,
        timeout: Duration,
    ) -> CoverOutcome;

    fn get_cached_cover_url(&self, identifiers: &Identifiers) -> Option<String>;

    /// Product URL for the identifiers, if they carry a valid ISBN.
    fn resolve_url(&self, identifiers: &Identifiers) -> Option<String>;

    /// `(scheme, value)` identifier recovered from a product URL.
    fn id_from_url(&self, url: &str) -> Option<(String, String)>;
}

#[derive(Debug, Clone, Default)]
pub struct MetadataQuery {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub identifiers: Identifiers,
}

impl MetadataQuery {
    pub fn isbn(&self) -> Option<&str> {
        self.identifiers.get("isbn").map(|s| s.as_str())
    }
}

/// Cooperative cancellation shared between the caller and every worker.
/// Checked before each unit of work; never interrupts a request in flight.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// One candidate after another on the calling thread.
    Sequential,
    /// One worker thread per candidate, at most `max_workers` alive at once.
    FanOut { max_workers: usize },
}

#[derive(Debug, Clone)]
pub struct LookupOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub mode: DispatchMode,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            mode: DispatchMode::Sequential,
        }
    }
}

/// What happened to one candidate URL.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// A record was extracted and sent.
    Found,
    /// The page was unavailable or lacked title/authors.
    Empty,
    /// Fetching or parsing failed; siblings were unaffected.
    Failed(String),
    /// The abort flag was set before work started.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateReport {
    pub url: String,
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifyReport {
    pub candidates: Vec<CandidateReport>,
    pub aborted: bool,
}

impl IdentifyReport {
    pub fn found(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Found))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&TaskOutcome) -> bool) -> usize {
        self.candidates.iter().filter(|c| pred(&c.outcome)).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoverOutcome {
    /// Cover bytes were sent to the channel.
    Downloaded { url: String },
    /// No record with a cover URL was found.
    NotFound,
    Aborted,
    /// The download (or the lookup feeding it) failed; logged and swallowed.
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_flag_is_shared_between_clones() {
        let flag = AbortFlag::new();
        let worker_copy = flag.clone();
        assert!(!worker_copy.is_set());
        flag.set();
        assert!(worker_copy.is_set());
    }

    #[test]
    fn report_counts() {
        let report = IdentifyReport {
            candidates: vec![
                CandidateReport { url: "a".into(), outcome: TaskOutcome::Found },
                CandidateReport { url: "b".into(), outcome: TaskOutcome::Failed("boom".into()) },
                CandidateReport { url: "c".into(), outcome: TaskOutcome::Empty },
                CandidateReport { url: "d".into(), outcome: TaskOutcome::Found },
            ],
            aborted: false,
        };
        assert_eq!(report.found(), 2);
        assert_eq!(report.failed(), 1);
    }
}
