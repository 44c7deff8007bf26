//! The append-only shared chunk buffer.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, warn};

use crate::error::BufferError;
use crate::reader::CursorReader;

/// État interne du buffer, partagé entre le fetch et les lecteurs.
#[derive(Debug, Default)]
pub(crate) struct BufferState {
    /// Ordered, immutable chunks. Append-only, never truncated or
    /// compacted: memory grows with the total bytes fetched. That is an
    /// explicit scaling limitation of the design, not an oversight.
    pub(crate) chunks: Vec<Bytes>,
    /// Running sum of chunk lengths.
    pub(crate) total_bytes: u64,
    /// Advertised upstream size, when the response carried one.
    pub(crate) expected_bytes: Option<u64>,
    /// Monotonic false→true, set when the upstream signalled completion.
    pub(crate) done: bool,
    /// Terminal upstream failure, delivered to every reader after the
    /// already-buffered chunks have been drained.
    pub(crate) error: Option<BufferError>,
}

impl BufferState {
    pub(crate) fn is_terminal(&self) -> bool {
        self.done || self.error.is_some()
    }
}

#[derive(Debug)]
pub(crate) struct BufferInner {
    pub(crate) state: RwLock<BufferState>,
    /// Wakes every parked reader after an append or a terminal transition.
    pub(crate) notify: Notify,
    /// Live reader count. Readers register on creation and deregister on
    /// drop, so an abandoned reader stops costing anything immediately.
    pub(crate) readers: AtomicUsize,
}

/// Shared, append-only byte buffer fed by a single upstream fetch.
///
/// Cloning a `SharedBuffer` clones the handle, not the data; all handles
/// and all readers observe the same chunk sequence. See [`CursorReader`]
/// for the consumer side.
#[derive(Debug, Clone)]
pub struct SharedBuffer {
    inner: Arc<BufferInner>,
}

impl SharedBuffer {
    /// Creates an empty buffer with no readers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BufferInner {
                state: RwLock::new(BufferState::default()),
                notify: Notify::new(),
                readers: AtomicUsize::new(0),
            }),
        }
    }

    /// Appends a chunk and wakes every parked reader.
    ///
    /// Only the fetch path appends. Appending after the buffer reached a
    /// terminal state is a caller bug; the chunk is dropped with a warning
    /// so readers never observe bytes past the terminal signal.
    pub async fn append(&self, chunk: Bytes) {
        {
            let mut state = self.inner.state.write().await;
            if state.is_terminal() {
                warn!(
                    len = chunk.len(),
                    "append after terminal state, dropping chunk"
                );
                return;
            }
            state.total_bytes += chunk.len() as u64;
            state.chunks.push(chunk);
        }
        self.inner.notify.notify_waiters();
    }

    /// Marks the upstream as finished and wakes every parked reader.
    ///
    /// Idempotent: a second call is a caller bug but only logs a warning,
    /// it never un-finishes or re-notifies differently.
    pub async fn complete(&self) {
        {
            let mut state = self.inner.state.write().await;
            if state.done {
                warn!("complete called twice on shared buffer");
                return;
            }
            if state.error.is_some() {
                warn!("complete called on a failed buffer, keeping the error");
                return;
            }
            state.done = true;
            debug!(
                chunks = state.chunks.len(),
                total_bytes = state.total_bytes,
                "shared buffer complete"
            );
        }
        self.inner.notify.notify_waiters();
    }

    /// Records a terminal upstream failure and wakes every parked reader.
    ///
    /// Readers drain the chunks buffered so far, then observe the error.
    pub async fn fail(&self, error: BufferError) {
        {
            let mut state = self.inner.state.write().await;
            if state.is_terminal() {
                warn!(%error, "fail called on a terminal buffer, ignoring");
                return;
            }
            debug!(%error, buffered = state.total_bytes, "shared buffer failed");
            state.error = Some(error);
        }
        self.inner.notify.notify_waiters();
    }

    /// Records the advertised upstream size, for observability only.
    pub async fn set_expected_bytes(&self, len: u64) {
        self.inner.state.write().await.expected_bytes = Some(len);
    }

    /// Creates a new reader positioned at byte zero.
    pub fn reader(&self) -> CursorReader {
        CursorReader::new(Arc::clone(&self.inner))
    }

    /// Number of chunks appended so far.
    pub async fn chunk_count(&self) -> usize {
        self.inner.state.read().await.chunks.len()
    }

    /// Total bytes appended so far.
    pub async fn total_bytes(&self) -> u64 {
        self.inner.state.read().await.total_bytes
    }

    /// Advertised upstream size, when known.
    pub async fn expected_bytes(&self) -> Option<u64> {
        self.inner.state.read().await.expected_bytes
    }

    /// Whether the upstream signalled completion.
    pub async fn is_done(&self) -> bool {
        self.inner.state.read().await.done
    }

    /// The terminal failure, if the upstream failed.
    pub async fn error(&self) -> Option<BufferError> {
        self.inner.state.read().await.error.clone()
    }

    /// Number of live readers subscribed to this buffer.
    pub fn reader_count(&self) -> usize {
        self.inner.readers.load(Ordering::Relaxed)
    }
}

impl Default for SharedBuffer {
    fn default() -> Self {
        Self::new()
    }
}
