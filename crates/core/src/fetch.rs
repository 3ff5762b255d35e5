//! Fetch capability: plain GET returning status and body.
//!
//! `HttpFetcher` talks to the network; `FixtureFetcher` answers from files on
//! disk so lookups can run offline in tests and from the CLI's `--fixtures` mode.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Url;

use crate::config::HttpConfig;
use crate::error::LookupError;

/// Status and raw body of a GET.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse, LookupError>;

    /// Independent handle for a worker thread.
    fn clone_fetcher(&self) -> Box<dyn Fetcher>;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, LookupError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse, LookupError> {
        tracing::debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| LookupError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| LookupError::Network(e.to_string()))?
            .to_vec();
        Ok(FetchResponse { status, body })
    }

    fn clone_fetcher(&self) -> Box<dyn Fetcher> {
        Box::new(Self {
            client: self.client.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const SEARCH_FIXTURE: &str = "search_example.html";
pub const COVER_FIXTURE: &str = "example_cover.jpeg";

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// Serves URLs from a fixture directory:
/// - `.../produkt/<slug>-<isbn>` or `.../produkt/<isbn>` → `<dir>/<isbn>.html`
/// - `.../search?...` → `<dir>/search_example.html`
/// - image URLs → `<dir>/example_cover.jpeg`
/// - `file://` URLs → that path
///
/// Explicit routes take precedence. Missing files answer 404. Every requested
/// URL is recorded, shared across clones.
#[derive(Clone)]
pub struct FixtureFetcher {
    dir: PathBuf,
    routes: HashMap<String, PathBuf>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FixtureFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            routes: HashMap::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer `url` with the contents of `file` (relative to the fixture dir).
    pub fn route(mut self, url: &str, file: impl AsRef<Path>) -> Self {
        self.routes.insert(url.to_string(), self.dir.join(file));
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn resolve(&self, url: &str) -> Option<PathBuf> {
        if let Some(path) = self.routes.get(url) {
            return Some(path.clone());
        }
        let parsed = Url::parse(url).ok()?;
        if parsed.scheme() == "file" {
            return parsed.to_file_path().ok();
        }
        let segments: Vec<&str> = parsed.path_segments().map(|s| s.collect()).unwrap_or_default();
        let last = segments.last().copied().unwrap_or("");
        if let Some(pos) = segments.iter().position(|s| *s == "produkt") {
            let slug = segments.get(pos + 1)?;
            let id = slug.rsplit('-').next().unwrap_or(slug);
            return Some(self.dir.join(format!("{}.html", id)));
        }
        if last == "search" {
            return Some(self.dir.join(SEARCH_FIXTURE));
        }
        let ext = Path::new(last)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if ext.is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str())) {
            return Some(self.dir.join(COVER_FIXTURE));
        }
        None
    }
}

impl Fetcher for FixtureFetcher {
    fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchResponse, LookupError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        let Some(path) = self.resolve(url) else {
            tracing::debug!("No fixture for {}", url);
            return Ok(FetchResponse { status: 404, body: Vec::new() });
        };
        match std::fs::read(&path) {
            Ok(body) => Ok(FetchResponse { status: 200, body }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Fixture {} missing for {}", path.display(), url);
                Ok(FetchResponse { status: 404, body: Vec::new() })
            }
            Err(e) => Err(LookupError::Fixture {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn clone_fetcher(&self) -> Box<dyn Fetcher> {
        Box::new(self.clone())
    }
}
