//! Shared session context.
//!
//! All cross-session state lives here and is passed explicitly to every
//! operation: the presence map (uuid → room), the device map (room → cast
//! device name) and the registry of active sessions. There is no ambient
//! global state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cfbuffer::CursorReader;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::deps::{ParserFactory, StreamFetcher, TargetConnector};
use crate::error::{Result, SessionError};
use crate::model::NowPlaying;
use crate::queue::resolve_queue;
use crate::session::PlaySession;

struct SessionHandle {
    session: Arc<Mutex<PlaySession>>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct ContextState {
    /// uuid → room the user is currently in.
    presence: HashMap<String, String>,
    /// room → cast device friendly name.
    devices: HashMap<String, String>,
    sessions: HashMap<String, SessionHandle>,
}

struct Inner {
    catalog: Arc<dyn Catalog>,
    connector: Arc<dyn TargetConnector>,
    fetcher: Arc<dyn StreamFetcher>,
    parsers: Arc<dyn ParserFactory>,
    stream_base_url: String,
    poll_interval: Duration,
    state: RwLock<ContextState>,
}

/// Shared handle over the whole session layer. Cheap to clone; all clones
/// see the same state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl SessionContext {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        connector: Arc<dyn TargetConnector>,
        fetcher: Arc<dyn StreamFetcher>,
        parsers: Arc<dyn ParserFactory>,
        stream_base_url: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                connector,
                fetcher,
                parsers,
                stream_base_url: stream_base_url.into(),
                poll_interval,
                state: RwLock::new(ContextState::default()),
            }),
        }
    }

    /// Replaces the room → device map.
    pub async fn update_devices(&self, devices: HashMap<String, String>) {
        info!("Updated device map: {} rooms", devices.len());
        self.inner.state.write().await.devices = devices;
    }

    /// Records that `uuid` is now in `room` and, when that user has an
    /// active session, moves playback to the room's device.
    ///
    /// A room without a device, or a failed handoff, leaves the session
    /// as it is; both are logged, not propagated.
    pub async fn update_presence(&self, uuid: &str, room: &str) {
        debug!("Got presence: {} is in {}", uuid, room);

        let (session, device_name) = {
            let mut state = self.inner.state.write().await;
            state.presence.insert(uuid.to_string(), room.to_string());
            (
                state.sessions.get(uuid).map(|h| Arc::clone(&h.session)),
                state.devices.get(room).cloned(),
            )
        };

        let Some(session) = session else {
            return;
        };
        let Some(device_name) = device_name else {
            warn!("No cast device for room {}", room);
            return;
        };

        let mut parser = self.inner.parsers.new_parser();
        let mut session = session.lock().await;
        if let Err(e) = session
            .handoff(self.inner.connector.as_ref(), &device_name, parser.as_mut())
            .await
        {
            warn!("Handoff for {} failed: {}", uuid, e);
        }
    }

    /// Starts playing `query` for `uuid` on the device of the room the
    /// user is currently in. Supersedes any session `uuid` already has.
    pub async fn play(&self, uuid: &str, query: &str) -> Result<()> {
        let device_name = {
            let state = self.inner.state.read().await;
            let room = state
                .presence
                .get(uuid)
                .ok_or_else(|| SessionError::UnknownUuid(uuid.to_string()))?;
            state
                .devices
                .get(room)
                .cloned()
                .ok_or_else(|| SessionError::NoDeviceForRoom(room.clone()))?
        };

        if let Some(handle) = self.remove_session(uuid).await {
            info!("Stopping current play for uuid {}", uuid);
            handle.cancel.cancel();
            handle.session.lock().await.stop().await;
        }

        let queue = resolve_queue(self.inner.catalog.as_ref(), query).await?;
        let target = self.inner.connector.connect(&device_name).await?;

        let mut session = PlaySession::new(
            uuid,
            queue,
            Arc::clone(&self.inner.catalog),
            Arc::clone(&self.inner.fetcher),
            self.inner.stream_base_url.clone(),
        );
        session.start(target).await?;

        let session = Arc::new(Mutex::new(session));
        let cancel = CancellationToken::new();
        spawn_poll_task(
            uuid.to_string(),
            Arc::clone(&session),
            cancel.clone(),
            self.inner.poll_interval,
        );

        self.inner
            .state
            .write()
            .await
            .sessions
            .insert(uuid.to_string(), SessionHandle { session, cancel });
        Ok(())
    }

    /// Stops and discards `uuid`'s session.
    pub async fn stop(&self, uuid: &str) -> Result<()> {
        let handle = self
            .remove_session(uuid)
            .await
            .ok_or_else(|| SessionError::NoSession(uuid.to_string()))?;
        handle.cancel.cancel();
        handle.session.lock().await.stop().await;
        Ok(())
    }

    pub async fn next(&self, uuid: &str) -> Result<()> {
        let session = self.session(uuid).await?;
        session.lock().await.next().await
    }

    pub async fn previous(&self, uuid: &str) -> Result<()> {
        let session = self.session(uuid).await?;
        session.lock().await.previous().await
    }

    /// What `uuid`'s session is currently playing.
    pub async fn now_playing(&self, uuid: &str) -> Result<Option<NowPlaying>> {
        let session = self.session(uuid).await?;
        let session = session.lock().await;
        Ok(session.now_playing())
    }

    /// Mints a reader serving `uuid`'s current load, positioned at the
    /// load's start offset. Every stream request gets its own reader.
    pub async fn sink_reader(&self, uuid: &str) -> Option<CursorReader> {
        let session = self.session(uuid).await.ok()?;
        let session = session.lock().await;
        session.sink_reader()
    }

    async fn session(&self, uuid: &str) -> Result<Arc<Mutex<PlaySession>>> {
        let state = self.inner.state.read().await;
        state
            .sessions
            .get(uuid)
            .map(|h| Arc::clone(&h.session))
            .ok_or_else(|| SessionError::NoSession(uuid.to_string()))
    }

    async fn remove_session(&self, uuid: &str) -> Option<SessionHandle> {
        self.inner.state.write().await.sessions.remove(uuid)
    }
}

/// One sequential polling task per session: watches the device state and
/// advances the queue on the Playing→Idle edge. Ends when cancelled
/// (session stopped or superseded) or when the session has no device left
/// to poll (queue finished).
fn spawn_poll_task(
    uuid: String,
    session: Arc<Mutex<PlaySession>>,
    cancel: CancellationToken,
    interval: Duration,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let target = session.lock().await.target();
            let Some(target) = target else {
                debug!("Session for {} has no device anymore, ending poll", uuid);
                break;
            };

            match target.player_state().await {
                Ok(state) => {
                    let mut session = session.lock().await;
                    if session.observe_state(state) {
                        debug!("Device for {} went idle after playing, advancing", uuid);
                        if let Err(e) = session.advance().await {
                            warn!("Failed to advance queue for {}: {}", uuid, e);
                        }
                    }
                }
                Err(e) => warn!("Status poll for {} failed: {}", uuid, e),
            }
        }
        debug!("Status poll task for {} exiting", uuid);
    });
}
