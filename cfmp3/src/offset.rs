//! Elapsed-time to byte-offset resolution.

use std::time::Duration;

use cfbuffer::CursorReader;
use tracing::{debug, trace};

use crate::error::{OffsetError, Result};
use crate::scan::FrameParser;

/// Resolves an elapsed playback time to the byte offset of the frame that
/// was playing at that instant.
///
/// Reads `reader` from byte zero, feeding every chunk to `parser`. The
/// answer is the offset of the first frame whose start time reaches
/// `elapsed`; playback resumed from that offset replays at most one partial
/// frame. With frame durations `[1.0, 1.2, 0.9]` seconds, an elapsed time
/// of 2.0 s resolves to the third frame's offset (the first two cover only
/// 2.2 s *ending* there, but the third is the first to *start* at ≥ 2.0 s).
///
/// An elapsed time inside the final frame resolves to that frame's offset.
/// The reader is consumed; dropping it on return releases its subscription
/// to the shared buffer. If the stream's total duration is below `elapsed`
/// the result is [`OffsetError::NotFound`], and a buffer failure is
/// forwarded as [`OffsetError::Buffer`].
pub async fn find_offset<P: FrameParser + ?Sized>(
    mut reader: CursorReader,
    parser: &mut P,
    elapsed: Duration,
) -> Result<u64> {
    let target = elapsed.as_secs_f64();
    let mut covered = 0.0_f64;
    let mut last_offset = None;

    while let Some(chunk) = reader.next_chunk().await? {
        for frame in parser.push(&chunk) {
            if covered >= target {
                debug!(
                    offset = frame.offset,
                    target_secs = target,
                    "resolved elapsed time to frame offset"
                );
                return Ok(frame.offset);
            }
            trace!(offset = frame.offset, secs = frame.seconds, "frame");
            covered += frame.seconds;
            last_offset = Some(frame.offset);
        }
    }

    // The target sits inside the final frame when the accumulated duration
    // reaches it only after that frame was counted.
    if covered >= target {
        if let Some(offset) = last_offset {
            debug!(offset, target_secs = target, "resolved inside the final frame");
            return Ok(offset);
        }
    }

    debug!(target_secs = target, covered_secs = covered, "stream ended before target");
    Err(OffsetError::NotFound)
}
