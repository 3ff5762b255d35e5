//! Result ordering: best match first.
//!
//! Records that share the query's ISBN come first, then records whose cover is
//! cached, then exact title matches, then closer titles, then the order the
//! source found them in.

use crate::host::HostServices;
use crate::lookup::MetadataQuery;
use crate::metadata::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankKey {
    isbn_mismatch: bool,
    no_cached_cover: bool,
    inexact_title: bool,
    title_distance: u32,
    source_relevance: i32,
}

pub fn rank_key(mi: &Metadata, query: &MetadataQuery, host: &dyn HostServices) -> RankKey {
    let query_isbn = query.isbn().and_then(|i| host.check_isbn(i));
    let isbn_match = match (query_isbn.as_deref(), mi.isbn()) {
        (Some(q), Some(m)) => host.check_isbn(m).as_deref() == Some(q),
        _ => false,
    };
    let cached_cover = mi.isbn().and_then(|i| host.cached_cover_url(i)).is_some();

    let (inexact_title, title_distance) = match query.title.as_deref() {
        Some(t) if !t.trim().is_empty() => {
            let want = t.trim().to_lowercase();
            let have = mi.title.trim().to_lowercase();
            let similarity = strsim::jaro_winkler(&want, &have);
            (want != have, ((1.0 - similarity) * 1000.0).round() as u32)
        }
        _ => (false, 0),
    };

    RankKey {
        isbn_mismatch: !isbn_match,
        no_cached_cover: !cached_cover,
        inexact_title,
        title_distance,
        source_relevance: mi.source_relevance,
    }
}

/// Stable sort, best match first.
pub fn sort_results(results: &mut [Metadata], query: &MetadataQuery, host: &dyn HostServices) {
    results.sort_by_cached_key(|mi| rank_key(mi, query, host));
}
