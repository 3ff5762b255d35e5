pub mod config;
pub mod error;
pub mod fetch;
pub mod host;
pub mod isbn;
pub mod lookup;
pub mod metadata;
pub mod rank;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::fetch::{Fetcher, FixtureFetcher, HttpFetcher};
    pub use crate::host::{HostServices, InMemoryHost};
    pub use crate::lookup::ark::ArkSource;
    pub use crate::lookup::{AbortFlag, CoverOutcome, IdentifyReport, LookupOptions, MetadataQuery, MetadataSource};
    pub use crate::metadata::*;
}
