//! Catalog collaborator trait.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{SearchHit, Track};

/// A music catalog the session resolves queries against.
///
/// The production implementation talks to a remote catalog service; tests
/// substitute an in-memory one.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Searches the catalog, returning at most `limit` hits.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// All tracks of an album, in album order.
    async fn album_tracks(&self, album_id: &str) -> Result<Vec<Track>>;

    /// The upstream stream URL for a track.
    async fn stream_url(&self, track_id: &str) -> Result<String>;
}
