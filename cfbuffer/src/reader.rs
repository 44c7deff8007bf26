//! Pull-based cursor readers over a [`SharedBuffer`].

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use futures_util::Stream;
use tracing::{debug, trace};

use crate::buffer::{BufferInner, BufferState};
use crate::error::{BufferError, Result};

/// Outcome of one state inspection, decided under the buffer lock.
enum Step {
    Emit(Bytes),
    End,
    Fail(BufferError),
    Wait,
}

/// A consumer-facing view over a [`SharedBuffer`] with its own read
/// position.
///
/// Readers pull chunks with [`next_chunk`](Self::next_chunk); a reader that
/// has caught up with the buffer suspends until the next append or the
/// terminal signal. Before its first read a reader may be repositioned with
/// [`seek`](Self::seek).
///
/// Cloning produces a new reader over the *same* buffer with fresh state,
/// positioned back at byte zero. The clone is a live view, not a snapshot:
/// it observes every chunk, including ones appended after the clone. This
/// is how the offset resolver inspects an in-progress download without
/// perturbing the reader feeding the playback sink.
///
/// Dropping a reader unsubscribes it from the buffer.
///
/// [`SharedBuffer`]: crate::SharedBuffer
#[derive(Debug)]
pub struct CursorReader {
    shared: Arc<BufferInner>,
    /// Chunk index of the next chunk to emit. Monotonically non-decreasing
    /// once emission starts.
    position: usize,
    /// Absolute byte offset requested but not yet mapped to a chunk index.
    pending_seek: Option<u64>,
    started: bool,
    finished: bool,
}

impl CursorReader {
    pub(crate) fn new(shared: Arc<BufferInner>) -> Self {
        shared.readers.fetch_add(1, Ordering::Relaxed);
        Self {
            shared,
            position: 0,
            pending_seek: None,
            started: false,
            finished: false,
        }
    }

    /// Requests that emission start at the chunk containing `byte_offset`.
    ///
    /// Delivery stays chunk-aligned: the first emitted chunk is the one
    /// containing the requested byte, never a partial chunk. The offset is
    /// resolved lazily on the next read, so an offset beyond the bytes
    /// buffered so far simply waits for more data; if the buffer finishes
    /// before the offset is covered the reader reports end-of-stream
    /// instead of hanging.
    ///
    /// `seek(0)` is a valid seek-to-start. It resolves to the first chunk,
    /// which makes it observably identical to never seeking.
    ///
    /// # Errors
    ///
    /// [`BufferError::SeekAfterRead`] once the reader has emitted anything.
    pub fn seek(&mut self, byte_offset: u64) -> Result<()> {
        if self.started {
            return Err(BufferError::SeekAfterRead);
        }
        debug!(byte_offset, "seek requested");
        self.pending_seek = Some(byte_offset);
        Ok(())
    }

    /// Pulls the next chunk.
    ///
    /// Returns `Ok(Some(chunk))` while data is available, suspending when
    /// the reader has caught up with a live buffer. Returns `Ok(None)`
    /// exactly once when the buffer is done and fully consumed; subsequent
    /// calls keep returning `Ok(None)`. A terminal upstream failure is
    /// reported after all buffered chunks have been drained.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            // Borrow the buffer through a local handle so the wakeup
            // registration and the read guard stay independent of `self`.
            let shared = Arc::clone(&self.shared);

            // Register for the wakeup before inspecting state, otherwise a
            // notify between the inspection and the await is lost.
            let mut notified = pin!(shared.notify.notified());
            notified.as_mut().enable();

            let step = {
                let state = shared.state.read().await;
                self.advance(&state)
            };

            match step {
                Step::Emit(chunk) => {
                    self.started = true;
                    self.position += 1;
                    trace!(position = self.position, len = chunk.len(), "chunk emitted");
                    return Ok(Some(chunk));
                }
                Step::End => {
                    self.finished = true;
                    return Ok(None);
                }
                Step::Fail(error) => {
                    self.finished = true;
                    return Err(error);
                }
                Step::Wait => notified.await,
            }
        }
    }

    /// Decides the next step under the buffer lock. Never blocks.
    fn advance(&mut self, state: &BufferState) -> Step {
        if let Some(offset) = self.pending_seek {
            // Scan cumulative chunk lengths from the start until the
            // running total passes the requested offset.
            let mut bytes = 0u64;
            let mut resolved = None;
            for (index, chunk) in state.chunks.iter().enumerate() {
                bytes += chunk.len() as u64;
                if bytes > offset {
                    resolved = Some(index);
                    break;
                }
            }
            match resolved {
                Some(index) => {
                    debug!(offset, index, "seek resolved to chunk");
                    self.position = index;
                    self.pending_seek = None;
                }
                None if state.is_terminal() => {
                    // The buffer finished below the requested offset; the
                    // reader is exhausted rather than stuck.
                    return match &state.error {
                        Some(error) => Step::Fail(error.clone()),
                        None => Step::End,
                    };
                }
                None => return Step::Wait,
            }
        }

        if self.position < state.chunks.len() {
            return Step::Emit(state.chunks[self.position].clone());
        }
        match &state.error {
            Some(error) => Step::Fail(error.clone()),
            None if state.done => Step::End,
            None => Step::Wait,
        }
    }

    /// Adapts the reader into a chunk stream, e.g. for an HTTP body.
    ///
    /// The stream ends after the end-of-stream signal, or after yielding a
    /// single terminal error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> + Send {
        futures_util::stream::unfold(self, |mut reader| async move {
            match reader.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), reader)),
                Ok(None) => None,
                Err(error) => Some((Err(error), reader)),
            }
        })
    }
}

impl Clone for CursorReader {
    /// A fresh reader over the same buffer, starting back at byte zero.
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.shared))
    }
}

impl Drop for CursorReader {
    fn drop(&mut self) {
        self.shared.readers.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::SharedBuffer;

    const TICK: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_secs(2);

    async fn collect(reader: &mut CursorReader) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    #[tokio::test]
    async fn emits_exact_concatenation_in_order() {
        let buffer = SharedBuffer::new();
        buffer.append(Bytes::from_static(b"hello ")).await;
        buffer.append(Bytes::from_static(b"buffered ")).await;
        buffer.append(Bytes::from_static(b"world")).await;
        buffer.complete().await;

        let mut reader = buffer.reader();
        assert_eq!(collect(&mut reader).await, b"hello buffered world");

        // End-of-stream stays terminal.
        assert_eq!(reader.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reader_waits_for_chunks_appended_later() {
        let buffer = SharedBuffer::new();
        let mut reader = buffer.reader();

        let feeder = buffer.clone();
        tokio::spawn(async move {
            for part in [&b"one "[..], b"two ", b"three"] {
                sleep(TICK).await;
                feeder.append(Bytes::copy_from_slice(part)).await;
            }
            feeder.complete().await;
        });

        let bytes = timeout(WAIT, collect(&mut reader)).await.unwrap();
        assert_eq!(bytes, b"one two three");
    }

    #[tokio::test]
    async fn clone_is_a_live_view_not_a_snapshot() {
        let buffer = SharedBuffer::new();
        buffer.append(Bytes::from_static(b"aa")).await;
        buffer.append(Bytes::from_static(b"bb")).await;

        let mut original = buffer.reader();
        assert_eq!(original.next_chunk().await.unwrap().unwrap().as_ref(), b"aa");

        let mut clone = original.clone();

        // Appended after the clone; both readers must observe it.
        buffer.append(Bytes::from_static(b"cc")).await;
        buffer.complete().await;

        assert_eq!(collect(&mut clone).await, b"aabbcc");
        assert_eq!(collect(&mut original).await, b"bbcc");
    }

    #[tokio::test]
    async fn seek_emits_the_whole_chunk_containing_the_offset() {
        let buffer = SharedBuffer::new();
        buffer.append(Bytes::from(vec![1u8; 100])).await;
        buffer.append(Bytes::from(vec![2u8; 150])).await;
        buffer.append(Bytes::from(vec![3u8; 200])).await;
        buffer.complete().await;

        // Byte 120 lives in the second chunk; delivery is chunk-aligned.
        let mut reader = buffer.reader();
        reader.seek(120).unwrap();

        let first = reader.next_chunk().await.unwrap().unwrap();
        assert_eq!(first.len(), 150);
        assert!(first.iter().all(|b| *b == 2));

        let rest = collect(&mut reader).await;
        assert_eq!(rest.len(), 200);
    }

    #[tokio::test]
    async fn seek_zero_is_equivalent_to_no_seek() {
        let buffer = SharedBuffer::new();
        buffer.append(Bytes::from_static(b"first")).await;
        buffer.append(Bytes::from_static(b"second")).await;
        buffer.complete().await;

        let mut plain = buffer.reader();
        let mut seeked = buffer.reader();
        seeked.seek(0).unwrap();

        assert_eq!(collect(&mut plain).await, collect(&mut seeked).await);
    }

    #[tokio::test]
    async fn seek_after_first_read_is_rejected() {
        let buffer = SharedBuffer::new();
        buffer.append(Bytes::from_static(b"data")).await;

        let mut reader = buffer.reader();
        reader.next_chunk().await.unwrap();

        assert_eq!(reader.seek(2), Err(BufferError::SeekAfterRead));
    }

    #[tokio::test]
    async fn completion_without_pending_read_still_reaches_the_reader() {
        let buffer = SharedBuffer::new();
        buffer.append(Bytes::from_static(b"only")).await;

        let mut reader = buffer.reader();
        assert_eq!(reader.next_chunk().await.unwrap().unwrap().as_ref(), b"only");

        // Reader is idle, nothing pending, when completion arrives.
        buffer.complete().await;

        // A later pull must still observe end-of-stream without another
        // append.
        let end = timeout(WAIT, reader.next_chunk()).await.unwrap().unwrap();
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn unsatisfiable_seek_on_a_done_buffer_ends_immediately() {
        let buffer = SharedBuffer::new();
        buffer.append(Bytes::from(vec![0u8; 100])).await;
        buffer.complete().await;

        let mut reader = buffer.reader();
        reader.seek(500).unwrap();

        let end = timeout(WAIT, reader.next_chunk()).await.unwrap().unwrap();
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn unsatisfiable_seek_waits_while_the_buffer_is_live() {
        let buffer = SharedBuffer::new();
        buffer.append(Bytes::from(vec![1u8; 100])).await;

        let mut reader = buffer.reader();
        reader.seek(500).unwrap();

        let feeder = buffer.clone();
        tokio::spawn(async move {
            sleep(TICK).await;
            // Total is now 550, which covers offset 500 inside this chunk.
            feeder.append(Bytes::from(vec![2u8; 450])).await;
            feeder.complete().await;
        });

        let chunk = timeout(WAIT, reader.next_chunk())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(chunk.len(), 450);
        assert!(chunk.iter().all(|b| *b == 2));
    }

    #[tokio::test]
    async fn upstream_failure_is_reported_after_draining_buffered_chunks() {
        let buffer = SharedBuffer::new();
        buffer.append(Bytes::from_static(b"partial")).await;
        buffer.fail(BufferError::Upstream("connection reset".into())).await;

        let mut reader = buffer.reader();
        assert_eq!(
            reader.next_chunk().await.unwrap().unwrap().as_ref(),
            b"partial"
        );
        assert_eq!(
            reader.next_chunk().await,
            Err(BufferError::Upstream("connection reset".into()))
        );

        // A failed reader is finished, not stuck on the error.
        assert_eq!(reader.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn failure_wakes_a_parked_reader() {
        let buffer = SharedBuffer::new();
        let mut reader = buffer.reader();

        let feeder = buffer.clone();
        tokio::spawn(async move {
            sleep(TICK).await;
            feeder.fail(BufferError::HttpStatus(502)).await;
        });

        let result = timeout(WAIT, reader.next_chunk()).await.unwrap();
        assert_eq!(result, Err(BufferError::HttpStatus(502)));
    }

    #[tokio::test]
    async fn stream_adapter_yields_chunks_then_ends() {
        let buffer = SharedBuffer::new();
        buffer.append(Bytes::from_static(b"ab")).await;
        buffer.append(Bytes::from_static(b"cd")).await;
        buffer.complete().await;

        let chunks: Vec<_> = buffer.reader().into_stream().collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.is_ok()));
    }
}
