//! # cfbuffer
//!
//! Buffered, multicast byte-stream distribution for CastFollow.
//!
//! A single upstream download is captured once into an append-only,
//! in-memory [`SharedBuffer`]; any number of independent [`CursorReader`]s
//! consume that buffer at their own pace. Readers can be cloned at any time
//! (the clone is a live view over the same buffer, not a snapshot) and can
//! be repositioned to an arbitrary byte offset before their first read.
//!
//! ## Architecture
//!
//! ```text
//! upstream fetch ──append──▶ SharedBuffer ──▶ CursorReader₁ ──▶ playback sink
//!                                chunks  └──▶ CursorReader₂ ──▶ offset resolver
//! ```
//!
//! The buffer is the single point of truth: chunks are only ever appended by
//! the fetch path, every reader observes the identical chunk sequence, and
//! completion (or failure) of the fetch is a terminal state that every
//! reader eventually observes exactly once.
//!
//! Readers pull. A reader that has caught up with the buffer parks on a
//! notification and resumes when the next chunk arrives, which gives each
//! downstream consumer its own natural backpressure without ever blocking
//! the fetch path.
//!
//! ## Example
//!
//! ```no_run
//! use cfbuffer::stream_url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let buffer = stream_url("http://example.com/track.mp3");
//!
//!     let mut reader = buffer.reader();
//!     while let Some(chunk) = reader.next_chunk().await? {
//!         // feed the sink
//!         let _ = chunk;
//!     }
//!     Ok(())
//! }
//! ```

mod buffer;
mod download;
mod error;
mod reader;

pub use buffer::SharedBuffer;
pub use download::{stream_url, stream_url_with_client};
pub use error::{BufferError, Result};
pub use reader::CursorReader;
