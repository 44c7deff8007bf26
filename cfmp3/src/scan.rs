//! Incremental frame scanning over arbitrary chunk boundaries.

use tracing::trace;

use crate::frame::FrameHeader;

/// One frame located in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Absolute byte offset of the frame's first header byte.
    pub offset: u64,
    /// Frame length in bytes, header included.
    pub len: usize,
    /// Playback duration of the frame in seconds.
    pub seconds: f64,
}

/// Incremental push parser locating frames in a byte stream.
///
/// Implementations receive the stream as arbitrarily-sized chunks and
/// report every frame found so far. Frames may straddle chunk boundaries;
/// a frame is reported as soon as its header is available.
pub trait FrameParser {
    fn push(&mut self, data: &[u8]) -> Vec<FrameInfo>;
}

/// [`FrameParser`] for MPEG audio (MP3) streams.
///
/// Skips a leading ID3v2 tag, resynchronizes over junk bytes, and carries
/// partial headers across chunk boundaries.
#[derive(Debug, Default)]
pub struct Mp3FrameScanner {
    /// Unconsumed bytes carried over between pushes.
    pending: Vec<u8>,
    /// Absolute stream offset of `pending[0]`.
    base: u64,
    /// Bytes of the current frame (or ID3 tag) still to swallow.
    skip: usize,
    id3_checked: bool,
}

impl Mp3FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameParser for Mp3FrameScanner {
    fn push(&mut self, data: &[u8]) -> Vec<FrameInfo> {
        self.pending.extend_from_slice(data);

        let mut frames = Vec::new();
        let mut pos = 0usize;

        loop {
            if self.skip > 0 {
                let take = self.skip.min(self.pending.len() - pos);
                pos += take;
                self.skip -= take;
                if self.skip > 0 {
                    break;
                }
            }

            let avail = &self.pending[pos..];

            if !self.id3_checked {
                if avail.len() < 10 {
                    break;
                }
                if &avail[..3] == b"ID3" {
                    // Syncsafe 28-bit size, plus the 10-byte header and an
                    // optional 10-byte footer.
                    let size = (usize::from(avail[6] & 0x7F) << 21)
                        | (usize::from(avail[7] & 0x7F) << 14)
                        | (usize::from(avail[8] & 0x7F) << 7)
                        | usize::from(avail[9] & 0x7F);
                    let footer = if avail[5] & 0x10 != 0 { 10 } else { 0 };
                    self.skip = 10 + size + footer;
                    self.id3_checked = true;
                    trace!(tag_len = self.skip, "skipping leading ID3v2 tag");
                    continue;
                }
                self.id3_checked = true;
            }

            if avail.len() < 4 {
                break;
            }
            match FrameHeader::parse(&avail[..4]) {
                Some(header) => {
                    frames.push(FrameInfo {
                        offset: self.base + pos as u64,
                        len: header.frame_len,
                        seconds: header.duration(),
                    });
                    self.skip = header.frame_len;
                }
                // Not a frame boundary; resync one byte at a time.
                None => pos += 1,
            }
        }

        self.base += pos as u64;
        self.pending.drain(..pos);
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_LEN: usize = 417;

    /// MPEG1 Layer III, 128 kbps, 44.1 kHz: 417 bytes, ~26.12 ms.
    fn frame() -> Vec<u8> {
        let mut bytes = vec![0u8; FRAME_LEN];
        bytes[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        bytes
    }

    fn id3_tag(body_len: usize) -> Vec<u8> {
        let mut tag = vec![0u8; 10 + body_len];
        tag[..3].copy_from_slice(b"ID3");
        tag[3] = 4; // version
        tag[6] = ((body_len >> 21) & 0x7F) as u8;
        tag[7] = ((body_len >> 14) & 0x7F) as u8;
        tag[8] = ((body_len >> 7) & 0x7F) as u8;
        tag[9] = (body_len & 0x7F) as u8;
        tag
    }

    #[test]
    fn locates_consecutive_frames() {
        let mut stream = Vec::new();
        for _ in 0..3 {
            stream.extend_from_slice(&frame());
        }

        let mut scanner = Mp3FrameScanner::new();
        let frames = scanner.push(&stream);

        let offsets: Vec<u64> = frames.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 417, 834]);
        assert!(frames.iter().all(|f| f.len == FRAME_LEN));
        assert!(frames.iter().all(|f| (f.seconds - 1152.0 / 44_100.0).abs() < 1e-12));
    }

    #[test]
    fn frames_straddling_chunk_boundaries_are_found() {
        let mut stream = Vec::new();
        for _ in 0..4 {
            stream.extend_from_slice(&frame());
        }

        let mut scanner = Mp3FrameScanner::new();
        let mut frames = Vec::new();
        // Push in chunks misaligned with the frame size.
        for chunk in stream.chunks(100) {
            frames.extend(scanner.push(chunk));
        }

        let offsets: Vec<u64> = frames.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 417, 834, 1251]);
    }

    #[test]
    fn skips_a_leading_id3_tag() {
        let mut stream = id3_tag(200);
        stream.extend_from_slice(&frame());
        stream.extend_from_slice(&frame());

        let mut scanner = Mp3FrameScanner::new();
        let frames = scanner.push(&stream);

        let offsets: Vec<u64> = frames.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![210, 210 + 417]);
    }

    #[test]
    fn resyncs_over_junk_between_frames() {
        let mut stream = frame();
        stream.extend_from_slice(b"not a frame");
        stream.extend_from_slice(&frame());

        let mut scanner = Mp3FrameScanner::new();
        let frames = scanner.push(&stream);

        let offsets: Vec<u64> = frames.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 417 + 11]);
    }

    #[test]
    fn partial_header_waits_for_more_data() {
        let full = frame();

        let mut scanner = Mp3FrameScanner::new();
        assert!(scanner.push(&full[..2]).is_empty());

        let frames = scanner.push(&full[2..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].offset, 0);
    }
}
