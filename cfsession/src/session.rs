//! Playback session state machine.

use std::sync::Arc;
use std::time::Instant;

use cfbuffer::{CursorReader, SharedBuffer};
use cfcontrol::{MediaItem, MediaTarget, PlayerState};
use cfmp3::{FrameParser, find_offset};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::deps::{StreamFetcher, TargetConnector};
use crate::error::{Result, SessionError};
use crate::model::{NowPlaying, Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Stopped,
    Playing,
}

/// One user's playback session: a resolved track queue, the buffered feed
/// of the current track, and the cast device playing it.
///
/// The session never serves bytes itself; each load records the sink
/// offset, and the HTTP sink mints a [`CursorReader`] over the captured
/// buffer whenever the device comes fetching.
pub struct PlaySession {
    uuid: String,
    queue: Vec<Track>,
    current: usize,
    status: SessionStatus,

    catalog: Arc<dyn Catalog>,
    fetcher: Arc<dyn StreamFetcher>,
    /// Externally reachable base URL of our HTTP sink.
    stream_base_url: String,

    target: Option<Arc<dyn MediaTarget>>,
    buffer: Option<SharedBuffer>,
    /// Byte offset the current load starts at: zero for a fresh track,
    /// the resolved offset after a handoff.
    sink_offset: u64,

    /// When the device last transitioned into Playing; the elapsed-time
    /// anchor for the presence handoff.
    started_at: Option<Instant>,
    /// Last state the device reported, for the Playing→Idle advance edge.
    last_state: Option<PlayerState>,
}

impl PlaySession {
    pub(crate) fn new(
        uuid: impl Into<String>,
        queue: Vec<Track>,
        catalog: Arc<dyn Catalog>,
        fetcher: Arc<dyn StreamFetcher>,
        stream_base_url: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            queue,
            current: 0,
            status: SessionStatus::Stopped,
            catalog,
            fetcher,
            stream_base_url: stream_base_url.into(),
            target: None,
            buffer: None,
            sink_offset: 0,
            started_at: None,
            last_state: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        let track = self.queue.get(self.current)?;
        Some(NowPlaying {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            queue_position: self.current,
            queue_len: self.queue.len(),
        })
    }

    pub(crate) fn target(&self) -> Option<Arc<dyn MediaTarget>> {
        self.target.clone()
    }

    /// Mints a reader for the HTTP sink, positioned where the current load
    /// starts. Some cast firmwares request the stream URL more than once
    /// per load, so every request gets its own reader.
    pub(crate) fn sink_reader(&self) -> Option<CursorReader> {
        let buffer = self.buffer.as_ref()?;
        let mut reader = buffer.reader();
        reader.seek(self.sink_offset).ok()?;
        Some(reader)
    }

    /// Starts playback of the first queue entry on `target`.
    pub(crate) async fn start(&mut self, target: Arc<dyn MediaTarget>) -> Result<()> {
        self.target = Some(target);
        self.status = SessionStatus::Playing;
        self.begin_current().await
    }

    /// Folds a polled device state into the session.
    ///
    /// Returns true when the queue should advance: the device went Idle
    /// immediately after a remembered Playing, which is how the default
    /// receiver signals end of track. The transition into Playing records
    /// the elapsed-time anchor.
    pub(crate) fn observe_state(&mut self, state: Option<PlayerState>) -> bool {
        let advance = self.last_state == Some(PlayerState::Playing)
            && state == Some(PlayerState::Idle);

        if state == Some(PlayerState::Playing) && self.last_state != Some(PlayerState::Playing) {
            self.started_at = Some(Instant::now());
        }
        self.last_state = state;
        advance
    }

    /// Moves to the next queue entry after the device reported end of
    /// track. At the end of the queue the session stops.
    pub(crate) async fn advance(&mut self) -> Result<()> {
        self.clear_device_state();
        self.current += 1;
        if self.current >= self.queue.len() {
            info!("Queue finished for {}", self.uuid);
            self.stop().await;
            return Ok(());
        }
        self.begin_current().await
    }

    /// Explicit skip to the next track. Same motion as [`advance`], and
    /// clearing the remembered device state first doubles as the guard
    /// against the Idle the device reports while switching tracks.
    ///
    /// [`advance`]: Self::advance
    pub(crate) async fn next(&mut self) -> Result<()> {
        self.advance().await
    }

    /// Explicit skip to the previous track (or restart of the first).
    pub(crate) async fn previous(&mut self) -> Result<()> {
        self.clear_device_state();
        self.current = self.current.saturating_sub(1);
        self.begin_current().await
    }

    /// Stops the device and releases all playback state. Always succeeds;
    /// a device that cannot be reached anymore is only worth a warning.
    pub(crate) async fn stop(&mut self) {
        if let Some(target) = self.target.take() {
            if let Err(e) = target.stop().await {
                warn!("Failed to stop device: {}", e);
            }
        }
        self.status = SessionStatus::Stopped;
        self.started_at = None;
        self.last_state = None;
        self.sink_offset = 0;
        self.buffer = None;
    }

    /// Moves playback to another device, preserving elapsed-time
    /// continuity.
    ///
    /// The elapsed time since the device went Playing is resolved to a
    /// byte offset by scanning a fresh reader over the already-captured
    /// buffer, and the sink serves the new device from that offset.
    /// Nothing is re-fetched from the network. Without a recorded playback
    /// start there is no elapsed time to preserve and the handoff is
    /// skipped.
    pub(crate) async fn handoff(
        &mut self,
        connector: &dyn TargetConnector,
        device_name: &str,
        parser: &mut (dyn FrameParser + Send),
    ) -> Result<()> {
        let Some(started_at) = self.started_at else {
            warn!("No playback start recorded for {}, skipping handoff", self.uuid);
            return Ok(());
        };
        let elapsed = started_at.elapsed();
        info!(
            "Handing off {} to '{}' after {:.1}s",
            self.uuid,
            device_name,
            elapsed.as_secs_f64()
        );

        if let Some(target) = self.target.take() {
            if let Err(e) = target.stop().await {
                warn!("Failed to stop previous device: {}", e);
            }
        }
        self.clear_device_state();

        let buffer = self.buffer.as_ref().ok_or(SessionError::NotPlaying)?;
        // The resolving reader is dropped as soon as the offset is known.
        let offset = find_offset(buffer.reader(), parser, elapsed).await?;

        let target = connector.connect(device_name).await?;

        self.sink_offset = offset;
        self.target = Some(target);

        self.load_current().await
    }

    /// Captures the current track's upstream stream and loads it on the
    /// device.
    async fn begin_current(&mut self) -> Result<()> {
        let track = self
            .queue
            .get(self.current)
            .cloned()
            .ok_or(SessionError::NotPlaying)?;

        let url = self
            .catalog
            .stream_url(&track.id)
            .await
            .map_err(|e| SessionError::Catalog(e.to_string()))?;
        debug!("Got stream url for '{}'", track.title);

        self.buffer = Some(self.fetcher.fetch(&url));
        self.sink_offset = 0;

        self.load_current().await
    }

    /// Points the device at our HTTP sink for the current track.
    async fn load_current(&mut self) -> Result<()> {
        let track = self.queue.get(self.current).ok_or(SessionError::NotPlaying)?;

        let item = MediaItem {
            url: format!("{}/stream/{}", self.stream_base_url, self.uuid),
            content_type: "audio/mpeg".to_string(),
            title: Some(track.title.clone()),
            artist: track.artist.clone(),
            album: track.album.clone(),
            artwork_url: track.artwork_url.clone(),
        };

        let target = self.target.clone().ok_or(SessionError::NotPlaying)?;
        target.load(&item).await?;

        info!("Playing '{}' ({}/{})", track.title, self.current + 1, self.queue.len());
        Ok(())
    }

    fn clear_device_state(&mut self) {
        self.started_at = None;
        self.last_state = None;
    }

    #[cfg(test)]
    pub(crate) fn set_started_at(&mut self, at: Instant) {
        self.started_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::Result;
    use async_trait::async_trait;
    use cfmp3::FrameInfo;

    struct NoCatalog;

    #[async_trait]
    impl Catalog for NoCatalog {
        async fn search(&self, _: &str, _: usize) -> Result<Vec<crate::model::SearchHit>> {
            unreachable!()
        }
        async fn album_tracks(&self, _: &str) -> Result<Vec<Track>> {
            unreachable!()
        }
        async fn stream_url(&self, _: &str) -> Result<String> {
            unreachable!()
        }
    }

    struct NoFetcher;

    impl StreamFetcher for NoFetcher {
        fn fetch(&self, _: &str) -> SharedBuffer {
            unreachable!()
        }
    }

    struct PanickyConnector;

    #[async_trait]
    impl TargetConnector for PanickyConnector {
        async fn connect(&self, _: &str) -> Result<Arc<dyn MediaTarget>> {
            panic!("connect must not be called");
        }
    }

    struct NoFrames;

    impl FrameParser for NoFrames {
        fn push(&mut self, _: &[u8]) -> Vec<FrameInfo> {
            Vec::new()
        }
    }

    fn session() -> PlaySession {
        PlaySession::new(
            "u1",
            vec![Track {
                id: "t1".to_string(),
                title: "Song".to_string(),
                artist: None,
                album: None,
                artwork_url: None,
            }],
            Arc::new(NoCatalog),
            Arc::new(NoFetcher),
            "http://127.0.0.1:3123",
        )
    }

    #[test]
    fn idle_right_after_playing_advances() {
        let mut s = session();
        assert!(!s.observe_state(Some(PlayerState::Playing)));
        assert!(s.observe_state(Some(PlayerState::Idle)));
    }

    #[test]
    fn idle_without_prior_playing_does_not_advance() {
        let mut s = session();
        assert!(!s.observe_state(Some(PlayerState::Idle)));
        assert!(!s.observe_state(Some(PlayerState::Buffering)));
        assert!(!s.observe_state(None));
    }

    #[test]
    fn buffering_between_playing_and_idle_does_not_advance() {
        let mut s = session();
        s.observe_state(Some(PlayerState::Playing));
        assert!(!s.observe_state(Some(PlayerState::Buffering)));
        assert!(!s.observe_state(Some(PlayerState::Idle)));
    }

    #[test]
    fn transition_into_playing_records_the_start() {
        let mut s = session();
        assert!(s.started_at.is_none());
        s.observe_state(Some(PlayerState::Playing));
        let first = s.started_at.expect("start should be recorded");

        // A repeated Playing poll must not move the anchor.
        s.observe_state(Some(PlayerState::Playing));
        assert_eq!(s.started_at, Some(first));
    }

    #[test]
    fn clearing_device_state_guards_against_false_idle() {
        let mut s = session();
        s.observe_state(Some(PlayerState::Playing));
        s.clear_device_state();
        // The idle caused by an explicit skip is not an end-of-track edge.
        assert!(!s.observe_state(Some(PlayerState::Idle)));
    }

    #[tokio::test]
    async fn handoff_without_a_start_anchor_is_skipped() {
        let mut s = session();
        let mut parser = NoFrames;
        // No started_at: the handoff returns without touching the connector.
        s.handoff(&PanickyConnector, "Kitchen", &mut parser)
            .await
            .unwrap();
        assert!(s.target.is_none());
    }
}
