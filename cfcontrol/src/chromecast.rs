//! Chromecast backend implementation using the rust_cast library.
//!
//! The rust_cast API is synchronous, so every operation runs on the
//! blocking thread pool and opens a fresh connection. Session IDs are
//! cached between operations; the connection itself is not, to avoid
//! lifetime issues.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_cast::CastDevice;
use rust_cast::channels::media::{Image, Media, Metadata, MusicTrackMediaMetadata, StreamType};
use rust_cast::channels::receiver::CastDeviceApp;
use tracing::debug;

use crate::discovery::CastHost;
use crate::target::{MediaItem, MediaTarget, PlayerState};

/// Default Chromecast port.
pub const DEFAULT_CHROMECAST_PORT: u16 = 8009;

/// Session state for a Chromecast connection.
#[derive(Debug, Default)]
struct SessionState {
    /// The receiver session ID obtained when launching an app.
    receiver_session_id: Option<String>,

    /// The media session ID obtained when loading media.
    media_session_id: Option<i32>,

    /// The destination transport ID (usually "web-0").
    destination_id: Option<String>,
}

impl SessionState {
    fn clear(&mut self) {
        self.receiver_session_id = None;
        self.media_session_id = None;
        self.destination_id = None;
    }
}

/// Chromecast playback target.
#[derive(Clone, Debug)]
pub struct ChromecastTarget {
    host: String,
    port: u16,
    session_state: Arc<Mutex<SessionState>>,
}

impl ChromecastTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            session_state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Creates a target for a device found by mDNS discovery.
    pub fn from_cast_host(host: &CastHost) -> Self {
        Self::new(&host.host, host.port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl MediaTarget for ChromecastTarget {
    async fn load(&self, item: &MediaItem) -> Result<()> {
        debug!("ChromecastTarget: load({})", item.url);

        let host = self.host.clone();
        let port = self.port;
        let session = Arc::clone(&self.session_state);
        let item = item.clone();

        tokio::task::spawn_blocking(move || load_blocking(&host, port, &session, &item))
            .await
            .map_err(|e| anyhow!("Chromecast task failed: {}", e))?
    }

    async fn player_state(&self) -> Result<Option<PlayerState>> {
        let host = self.host.clone();
        let port = self.port;
        let session = Arc::clone(&self.session_state);

        tokio::task::spawn_blocking(move || player_state_blocking(&host, port, &session))
            .await
            .map_err(|e| anyhow!("Chromecast task failed: {}", e))?
    }

    async fn stop(&self) -> Result<()> {
        debug!("ChromecastTarget: stop()");

        let host = self.host.clone();
        let port = self.port;
        let session = Arc::clone(&self.session_state);

        tokio::task::spawn_blocking(move || stop_blocking(&host, port, &session))
            .await
            .map_err(|e| anyhow!("Chromecast task failed: {}", e))?
    }
}

/// Creates a new connection to the Chromecast device.
fn connect<'a>(host: &'a str, port: u16) -> Result<CastDevice<'a>> {
    debug!("Connecting to Chromecast at {}:{}", host, port);

    CastDevice::connect(host, port)
        .map_err(|e| anyhow!("Failed to connect to Chromecast: {}", e))
}

fn load_blocking(
    host: &str,
    port: u16,
    session: &Mutex<SessionState>,
    item: &MediaItem,
) -> Result<()> {
    let device = connect(host, port)?;

    let mut state = session
        .lock()
        .map_err(|e| anyhow!("Failed to acquire session state lock: {}", e))?;

    // Ensure a receiver session exists before any media operation.
    if state.receiver_session_id.is_none() {
        debug!("Launching Default Media Receiver app");

        let app = device
            .receiver
            .launch_app(&CastDeviceApp::DefaultMediaReceiver)
            .map_err(|e| anyhow!("Failed to launch app: {}", e))?;

        state.receiver_session_id = Some(app.session_id.clone());
        state.destination_id = Some(app.transport_id.clone());

        debug!(
            "Launched app with session_id: {}, transport_id: {}",
            app.session_id, app.transport_id
        );
    }

    let destination_id = state
        .destination_id
        .as_ref()
        .ok_or_else(|| anyhow!("No destination ID available"))?
        .clone();

    let session_id = state
        .receiver_session_id
        .as_ref()
        .ok_or_else(|| anyhow!("No receiver session ID available"))?
        .clone();

    // Drop the lock before calling device methods
    drop(state);

    let media = build_media(item);

    let status = device
        .media
        .load(&destination_id, &session_id, &media)
        .map_err(|e| anyhow!("Failed to load media: {}", e))?;

    let mut state = session
        .lock()
        .map_err(|e| anyhow!("Failed to acquire session state lock: {}", e))?;

    if let Some(entry) = status.entries.first() {
        state.media_session_id = Some(entry.media_session_id);
        debug!("Media loaded with session ID: {}", entry.media_session_id);
    }

    Ok(())
}

fn player_state_blocking(
    host: &str,
    port: u16,
    session: &Mutex<SessionState>,
) -> Result<Option<PlayerState>> {
    let (destination_id, media_session_id) = {
        let state = session
            .lock()
            .map_err(|e| anyhow!("Failed to acquire session state lock: {}", e))?;

        match state.destination_id.as_ref() {
            Some(destination_id) => (destination_id.clone(), state.media_session_id),
            // Nothing was ever loaded.
            None => return Ok(None),
        }
    };

    let device = connect(host, port)?;

    let status = device
        .media
        .get_status(destination_id, media_session_id)
        .map_err(|e| anyhow!("Failed to get media status: {}", e))?;

    let Some(entry) = status.entries.first() else {
        return Ok(None);
    };

    use rust_cast::channels::media::PlayerState as CastPlayerState;
    let state = match entry.player_state {
        CastPlayerState::Playing => PlayerState::Playing,
        CastPlayerState::Paused => PlayerState::Paused,
        CastPlayerState::Buffering => PlayerState::Buffering,
        CastPlayerState::Idle => PlayerState::Idle,
    };
    Ok(Some(state))
}

fn stop_blocking(host: &str, port: u16, session: &Mutex<SessionState>) -> Result<()> {
    let (destination_id, media_session_id) = {
        let state = session
            .lock()
            .map_err(|e| anyhow!("Failed to acquire session state lock: {}", e))?;

        match (state.destination_id.as_ref(), state.media_session_id) {
            (Some(destination_id), Some(media_session_id)) => {
                (destination_id.clone(), media_session_id)
            }
            _ => {
                debug!("stop() with no media session, nothing to do");
                return Ok(());
            }
        }
    };

    let device = connect(host, port)?;

    device
        .media
        .stop(&destination_id, media_session_id)
        .map_err(|e| anyhow!("Failed to stop: {}", e))?;

    let mut state = session
        .lock()
        .map_err(|e| anyhow!("Failed to acquire session state lock: {}", e))?;
    state.clear();

    Ok(())
}

/// Converts a [`MediaItem`] to rust_cast Media format.
fn build_media(item: &MediaItem) -> Media {
    let images = item
        .artwork_url
        .clone()
        .map(|url| {
            vec![Image {
                url,
                dimensions: None,
            }]
        })
        .unwrap_or_default();

    let music_metadata = MusicTrackMediaMetadata {
        title: item.title.clone(),
        artist: item.artist.clone(),
        album_name: item.album.clone(),
        images,
        ..Default::default()
    };

    Media {
        content_id: item.url.clone(),
        content_type: item.content_type.clone(),
        stream_type: StreamType::Buffered,
        metadata: Some(Metadata::MusicTrack(music_metadata)),
        duration: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_media_carries_metadata() {
        let item = MediaItem {
            url: "http://192.168.1.10:3123/stream/abc".to_string(),
            content_type: "audio/mpeg".to_string(),
            title: Some("Song".to_string()),
            artist: Some("Artist".to_string()),
            album: Some("Album".to_string()),
            artwork_url: Some("http://example.com/cover.jpg".to_string()),
        };

        let media = build_media(&item);
        assert_eq!(media.content_id, item.url);
        assert_eq!(media.content_type, "audio/mpeg");

        let Some(Metadata::MusicTrack(meta)) = media.metadata else {
            panic!("expected music track metadata");
        };
        assert_eq!(meta.title.as_deref(), Some("Song"));
        assert_eq!(meta.images.len(), 1);
    }

    #[tokio::test]
    async fn stop_without_a_session_is_a_noop() {
        // No connection is attempted when nothing was loaded.
        let target = ChromecastTarget::new("203.0.113.1", DEFAULT_CHROMECAST_PORT);
        target.stop().await.unwrap();
    }
}
