//! Track and search-result types.

use serde::{Deserialize, Serialize};

/// A playable track as returned by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    /// Catalog identifier used to fetch the stream URL.
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork_url: Option<String>,
}

/// One entry of a catalog search result.
///
/// Album hits are expanded into their tracks during queue resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SearchHit {
    Track(Track),
    Album { id: String, title: String },
}

/// What a session is currently playing, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct NowPlaying {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub queue_position: usize,
    pub queue_len: usize,
}
