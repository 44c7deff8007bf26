//! # cfmp3
//!
//! MPEG audio frame scanning for CastFollow, and the offset resolver built
//! on top of it.
//!
//! Nothing here decodes audio. The scanner only reads frame *headers*, which
//! is enough to know where every frame starts in the byte stream and how
//! many seconds of playback it carries. That mapping is what
//! [`find_offset`] uses to answer the one question the presence handoff
//! needs: "we are N seconds into this track — at which byte offset does the
//! not-yet-played remainder begin?"
//!
//! The resolver runs against a cloned [`cfbuffer::CursorReader`], so it can
//! inspect an in-progress download in parallel with normal playback and is
//! dropped (unsubscribed) the moment the offset is known.

mod error;
mod frame;
mod offset;
mod scan;

pub use error::{OffsetError, Result};
pub use frame::{FrameHeader, Layer, MpegVersion};
pub use offset::find_offset;
pub use scan::{FrameInfo, FrameParser, Mp3FrameScanner};
