//! ark.no metadata source.

use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{lookup_options_from_config, AppConfig};
use crate::error::{LookupError, MetadataError};
use crate::fetch::{Fetcher, FixtureFetcher, HttpFetcher};
use crate::host::{HostServices, InMemoryHost};
use crate::lookup::dispatch::Dispatcher;
use crate::lookup::{
    resolve, search, AbortFlag, CoverOutcome, IdentifyReport, LookupOptions, MetadataQuery, MetadataSource,
};
use crate::metadata::{CoverImage, Identifiers, Metadata};
use crate::rank;

pub const SOURCE_NAME: &str = "Ark";

pub struct ArkSource {
    fetcher: Box<dyn Fetcher>,
    host: Arc<dyn HostServices>,
    options: LookupOptions,
}

impl ArkSource {
    pub fn new(fetcher: Box<dyn Fetcher>, host: Arc<dyn HostServices>, options: LookupOptions) -> Self {
        Self { fetcher, host, options }
    }

    /// Source wired from config: HTTP against the configured site, or the files in
    /// `fixtures` when given. The host is a fresh `InMemoryHost`.
    pub fn from_config(cfg: &AppConfig, fixtures: Option<&Path>) -> Result<Self, MetadataError> {
        let fetcher: Box<dyn Fetcher> = match fixtures {
            Some(dir) if !dir.is_dir() => {
                return Err(MetadataError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Fixture directory not found: {}", dir.display()),
                )));
            }
            Some(dir) => {
                tracing::info!("Running against fixtures in {}", dir.display());
                Box::new(FixtureFetcher::new(dir))
            }
            None => Box::new(HttpFetcher::new(&cfg.http)?),
        };
        Ok(Self::new(fetcher, Arc::new(InMemoryHost::new()), lookup_options_from_config(cfg)))
    }

    pub fn options(&self) -> &LookupOptions {
        &self.options
    }

    pub fn host(&self) -> &dyn HostServices {
        self.host.as_ref()
    }

    /// Collect every record `identify` finds, best match first.
    pub fn identify_ranked(
        &self,
        abort: &AbortFlag,
        query: &MetadataQuery,
        timeout: Duration,
    ) -> Result<(Vec<Metadata>, IdentifyReport), LookupError> {
        let (tx, rx) = mpsc::channel();
        let report = self.identify(&tx, abort, query, timeout)?;
        drop(tx);
        let mut results: Vec<Metadata> = rx.try_iter().collect();
        rank::sort_results(&mut results, query, self.host());
        Ok((results, report))
    }

    fn find_cover_url(&self, abort: &AbortFlag, query: &MetadataQuery, timeout: Duration) -> Result<Option<String>, CoverOutcome> {
        if let Some(url) = self.get_cached_cover_url(&query.identifiers) {
            return Ok(Some(url));
        }
        tracing::info!("No cached cover found, running identify");
        let (results, _) = self.identify_ranked(abort, query, timeout).map_err(|e| {
            tracing::warn!("Lookup for cover failed: {}", e);
            CoverOutcome::Failed(e.to_string())
        })?;
        if abort.is_set() {
            return Err(CoverOutcome::Aborted);
        }
        Ok(results.iter().find_map(|mi| self.get_cached_cover_url(&mi.identifiers)))
    }
}

impl MetadataSource for ArkSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn identify(
        &self,
        results: &Sender<Metadata>,
        abort: &AbortFlag,
        query: &MetadataQuery,
        timeout: Duration,
    ) -> Result<IdentifyReport, LookupError> {
        tracing::info!(
            "Identifying book with title: {:?}, authors: {:?}, identifiers: {:?}",
            query.title,
            query.authors,
            query.identifiers
        );
        let dispatcher = Dispatcher {
            fetcher: self.fetcher.as_ref(),
            host: self.host(),
            abort,
            results,
            timeout,
        };

        if let Some(url) = self.resolve_url(&query.identifiers) {
            return Ok(dispatcher.run([url], self.options.mode));
        }

        tracing::info!("No book URL found using identifiers, searching by title and authors.");
        let mut candidates = search::search(
            self.fetcher.as_ref(),
            self.host(),
            &self.options.base_url,
            query.title.as_deref(),
            query.authors.first().map(|a| a.as_str()),
            timeout,
        )?
        .peekable();
        if candidates.peek().is_none() {
            tracing::info!("No book URL found from search.");
            return Ok(IdentifyReport::default());
        }
        let report = dispatcher.run(candidates, self.options.mode);
        tracing::info!("Processed {} book URLs, {} with metadata.", report.candidates.len(), report.found());
        Ok(report)
    }

    fn download_cover(
        &self,
        results: &Sender<CoverImage>,
        abort: &AbortFlag,
        query: &MetadataQuery,
        timeout: Duration,
    ) -> CoverOutcome {
        let url = match self.find_cover_url(abort, query, timeout) {
            Ok(Some(url)) => url,
            Ok(None) => {
                tracing::info!("No cover found");
                return CoverOutcome::NotFound;
            }
            Err(outcome) => return outcome,
        };
        if abort.is_set() {
            return CoverOutcome::Aborted;
        }

        tracing::info!("Downloading cover from: {}", url);
        let data = match self.fetcher.fetch(&url, timeout) {
            Ok(resp) if resp.is_error() => {
                let err = LookupError::Http { status: resp.status, url: url.clone() };
                tracing::warn!("Failed to download cover from {}: {}", url, err);
                return CoverOutcome::Failed(err.to_string());
            }
            Ok(resp) => resp.body,
            Err(e) => {
                tracing::warn!("Failed to download cover from {}: {}", url, e);
                return CoverOutcome::Failed(e.to_string());
            }
        };
        if results.send(CoverImage::new(SOURCE_NAME, data)).is_err() {
            tracing::debug!("Cover receiver dropped");
        }
        CoverOutcome::Downloaded { url }
    }

    fn get_cached_cover_url(&self, identifiers: &Identifiers) -> Option<String> {
        let isbn = self.host.check_isbn(identifiers.get("isbn")?)?;
        self.host.cached_cover_url(&isbn)
    }

    fn resolve_url(&self, identifiers: &Identifiers) -> Option<String> {
        resolve::book_url(&self.options.base_url, self.host(), identifiers)
    }

    fn id_from_url(&self, url: &str) -> Option<(String, String)> {
        let isbn = resolve::isbn_from_url(self.host(), url)?;
        tracing::debug!("Matched ISBN {} in {}", isbn, url);
        Some(("isbn".to_string(), isbn))
    }
}
