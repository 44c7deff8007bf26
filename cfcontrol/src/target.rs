//! Playback target abstraction.

use anyhow::Result;
use async_trait::async_trait;

/// Player state reported by a playback device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Buffering,
    Playing,
    Paused,
}

/// A media item to load on a playback device.
#[derive(Debug, Clone)]
pub struct MediaItem {
    /// Stream URL the device will fetch.
    pub url: String,
    /// MIME type of the stream.
    pub content_type: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork_url: Option<String>,
}

/// A playback device the session can drive.
///
/// Implementations are cheap to clone and safe to call from multiple tasks;
/// each operation stands alone and carries its own connection if needed.
#[async_trait]
pub trait MediaTarget: Send + Sync {
    /// Loads `item` on the device and starts playback.
    async fn load(&self, item: &MediaItem) -> Result<()>;

    /// Current player state, or `None` when the device reports no media
    /// session.
    async fn player_state(&self) -> Result<Option<PlayerState>>;

    /// Stops playback. A no-op when nothing is loaded.
    async fn stop(&self) -> Result<()>;
}
