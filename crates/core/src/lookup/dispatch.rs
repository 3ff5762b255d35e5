//! Candidate dispatch: extract every candidate URL and push records to the
//! caller's channel, sequentially or one worker per candidate.
//!
//! Each candidate is an isolated unit of work. Its failure (an error or a
//! panicking worker) is logged and recorded in the report; siblings carry on.

use std::collections::VecDeque;
use std::sync::mpsc::Sender;
use std::thread::ScopedJoinHandle;
use std::time::Duration;

use crate::error::LookupError;
use crate::fetch::Fetcher;
use crate::host::HostServices;
use crate::lookup::extract;
use crate::lookup::{AbortFlag, CandidateReport, DispatchMode, IdentifyReport, TaskOutcome};
use crate::metadata::Metadata;

pub struct Dispatcher<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub host: &'a dyn HostServices,
    pub abort: &'a AbortFlag,
    pub results: &'a Sender<Metadata>,
    pub timeout: Duration,
}

impl<'a> Dispatcher<'a> {
    pub fn run(&self, candidates: impl IntoIterator<Item = String>, mode: DispatchMode) -> IdentifyReport {
        match mode {
            DispatchMode::Sequential => self.run_sequential(candidates),
            DispatchMode::FanOut { max_workers } => self.run_fan_out(candidates, max_workers.max(1)),
        }
    }

    fn run_sequential(&self, candidates: impl IntoIterator<Item = String>) -> IdentifyReport {
        let mut report = IdentifyReport::default();
        for (i, url) in candidates.into_iter().enumerate() {
            if self.abort.is_set() {
                tracing::info!("Lookup aborted before {}", url);
                report.aborted = true;
                break;
            }
            let outcome = self.extract_one(self.fetcher, self.results, &url, i as i32);
            report.candidates.push(CandidateReport { url, outcome });
        }
        report
    }

    /// Spawns a worker as soon as each candidate is pulled; when `max_workers`
    /// are in flight the oldest is joined first, so outcomes stay in order.
    fn run_fan_out(&self, candidates: impl IntoIterator<Item = String>, max_workers: usize) -> IdentifyReport {
        let mut report = IdentifyReport::default();
        std::thread::scope(|s| {
            let mut in_flight: VecDeque<(String, ScopedJoinHandle<'_, TaskOutcome>)> = VecDeque::new();
            for (i, url) in candidates.into_iter().enumerate() {
                if self.abort.is_set() {
                    tracing::info!("Lookup aborted before {}", url);
                    report.aborted = true;
                    break;
                }
                if in_flight.len() >= max_workers {
                    if let Some((done, handle)) = in_flight.pop_front() {
                        report.candidates.push(join_worker(done, handle));
                    }
                }
                let fetcher = self.fetcher.clone_fetcher();
                let results = self.results.clone();
                let task_url = url.clone();
                let handle = s.spawn(move || {
                    if self.abort.is_set() {
                        return TaskOutcome::Skipped;
                    }
                    self.extract_one(fetcher.as_ref(), &results, &task_url, i as i32)
                });
                in_flight.push_back((url, handle));
            }
            for (url, handle) in in_flight {
                report.candidates.push(join_worker(url, handle));
            }
        });
        if report.candidates.iter().any(|c| c.outcome == TaskOutcome::Skipped) {
            report.aborted = true;
        }
        report
    }

    fn extract_one(&self, fetcher: &dyn Fetcher, results: &Sender<Metadata>, url: &str, relevance: i32) -> TaskOutcome {
        match extract::fetch_metadata(fetcher, self.host, url, relevance, self.timeout) {
            Ok(Some(mi)) => {
                if results.send(mi).is_err() {
                    tracing::debug!("Result receiver dropped, discarding record from {}", url);
                }
                TaskOutcome::Found
            }
            Ok(None) => TaskOutcome::Empty,
            Err(e) => {
                tracing::warn!("Get details failed for url {}: {}", url, e);
                TaskOutcome::Failed(e.to_string())
            }
        }
    }
}

fn join_worker(url: String, handle: ScopedJoinHandle<'_, TaskOutcome>) -> CandidateReport {
    let outcome = handle.join().unwrap_or_else(|_| {
        let err = LookupError::WorkerPanicked { url: url.clone() };
        tracing::warn!("{}", err);
        TaskOutcome::Failed(err.to_string())
    });
    CandidateReport { url, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResponse;
    use crate::host::InMemoryHost;
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    /// Serves a minimal product page for every URL except those containing
    /// "broken" (transport error) or "panic" (worker panic).
    #[derive(Clone, Default)]
    struct Scripted {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Fetcher for Scripted {
        fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchResponse, LookupError> {
            self.seen.lock().unwrap().push(url.to_string());
            if url.contains("broken") {
                return Err(LookupError::Network("connection reset".to_string()));
            }
            if url.contains("panic") {
                panic!("scripted panic");
            }
            if url.contains("gone") {
                return Ok(FetchResponse { status: 404, body: Vec::new() });
            }
            let html = format!(
                r#"<meta property="og:title" content="Book {}"><div data-component="pdp-contributors"><a>Anne Holt</a></div>"#,
                url
            );
            Ok(FetchResponse { status: 200, body: html.into_bytes() })
        }

        fn clone_fetcher(&self) -> Box<dyn Fetcher> {
            Box::new(self.clone())
        }
    }

    fn urls(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| format!("https://www.ark.no/produkt/{}", n)).collect()
    }

    fn run(mode: DispatchMode, names: &[&str], abort: &AbortFlag) -> (IdentifyReport, Vec<Metadata>, Vec<String>) {
        let fetcher = Scripted::default();
        let host = InMemoryHost::new();
        let (tx, rx) = mpsc::channel();
        let report = Dispatcher {
            fetcher: &fetcher,
            host: &host,
            abort,
            results: &tx,
            timeout: Duration::from_secs(1),
        }
        .run(urls(names), mode);
        drop(tx);
        let seen = fetcher.seen.lock().unwrap().clone();
        (report, rx.iter().collect(), seen)
    }

    #[test]
    fn sequential_isolates_failures() {
        let (report, records, _) = run(DispatchMode::Sequential, &["a", "broken", "gone", "b"], &AbortFlag::new());
        let outcomes: Vec<_> = report.candidates.iter().map(|c| c.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![
                TaskOutcome::Found,
                TaskOutcome::Failed("Network error: connection reset".to_string()),
                TaskOutcome::Empty,
                TaskOutcome::Found,
            ]
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_relevance, 0);
        assert_eq!(records[1].source_relevance, 3);
        assert!(!report.aborted);
    }

    #[test]
    fn fan_out_survives_panicking_worker() {
        let mode = DispatchMode::FanOut { max_workers: 2 };
        let (report, records, seen) = run(mode, &["a", "panic", "b", "broken", "c"], &AbortFlag::new());
        assert_eq!(seen.len(), 5);
        assert_eq!(report.found(), 3);
        assert_eq!(report.failed(), 2);
        assert!(matches!(&report.candidates[1].outcome, TaskOutcome::Failed(m) if m.contains("panicked")));
        let mut relevances: Vec<i32> = records.iter().map(|r| r.source_relevance).collect();
        relevances.sort();
        assert_eq!(relevances, vec![0, 2, 4]);
        // report keeps candidate order regardless of completion order
        let reported: Vec<_> = report.candidates.iter().map(|c| c.url.clone()).collect();
        assert_eq!(reported, urls(&["a", "panic", "b", "broken", "c"]));
    }

    #[test]
    fn abort_before_start_makes_no_requests() {
        for mode in [DispatchMode::Sequential, DispatchMode::FanOut { max_workers: 4 }] {
            let abort = AbortFlag::new();
            abort.set();
            let (report, records, seen) = run(mode, &["a", "b"], &abort);
            assert!(report.aborted);
            assert!(records.is_empty());
            assert!(seen.is_empty());
        }
    }
}
