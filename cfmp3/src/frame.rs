//! MPEG audio frame header parsing.
//!
//! A frame header is four bytes: an 11-bit sync word followed by version,
//! layer, bitrate, sample-rate and padding fields. From those alone the
//! frame's byte length and playback duration are fully determined, which is
//! all the offset resolver needs.

/// MPEG version carried in a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V2_5,
}

/// MPEG layer carried in a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    I,
    II,
    III,
}

/// Bitrates in kbps, indexed by the 4-bit bitrate field.
///
/// Index 0 ("free format") and index 15 are rejected: a free-format frame
/// has no deterministic length without decoding, which this crate does not
/// do.
const BITRATES_V1_L1: [u16; 16] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0,
];
const BITRATES_V1_L2: [u16; 16] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0,
];
const BITRATES_V1_L3: [u16; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const BITRATES_V2_L1: [u16; 16] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0,
];
const BITRATES_V2_L23: [u16; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];

/// Sample rates in Hz, indexed by the 2-bit sample-rate field.
const SAMPLE_RATES_V1: [u32; 3] = [44_100, 48_000, 32_000];
const SAMPLE_RATES_V2: [u32; 3] = [22_050, 24_000, 16_000];
const SAMPLE_RATES_V2_5: [u32; 3] = [11_025, 12_000, 8_000];

/// A validated MPEG audio frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    /// Bitrate in bits per second.
    pub bitrate_bps: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    pub padding: bool,
    /// PCM samples carried by this frame.
    pub samples_per_frame: u32,
    /// Total frame length in bytes, header included.
    pub frame_len: usize,
}

impl FrameHeader {
    /// Parses the first four bytes of `data` as a frame header.
    ///
    /// Returns `None` when the bytes are not a valid, fixed-length frame
    /// header (bad sync word, reserved fields, free-format bitrate).
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        // 11-bit sync word: 0xFF followed by three more set bits.
        if data[0] != 0xFF || data[1] & 0xE0 != 0xE0 {
            return None;
        }

        let version = match (data[1] >> 3) & 0x03 {
            0b00 => MpegVersion::V2_5,
            0b10 => MpegVersion::V2,
            0b11 => MpegVersion::V1,
            _ => return None,
        };
        let layer = match (data[1] >> 1) & 0x03 {
            0b01 => Layer::III,
            0b10 => Layer::II,
            0b11 => Layer::I,
            _ => return None,
        };

        let bitrate_index = (data[2] >> 4) as usize;
        let table = match (version, layer) {
            (MpegVersion::V1, Layer::I) => &BITRATES_V1_L1,
            (MpegVersion::V1, Layer::II) => &BITRATES_V1_L2,
            (MpegVersion::V1, Layer::III) => &BITRATES_V1_L3,
            (_, Layer::I) => &BITRATES_V2_L1,
            (_, _) => &BITRATES_V2_L23,
        };
        let bitrate_kbps = table[bitrate_index];
        if bitrate_kbps == 0 {
            return None;
        }
        let bitrate_bps = u32::from(bitrate_kbps) * 1000;

        let rate_index = ((data[2] >> 2) & 0x03) as usize;
        if rate_index == 3 {
            return None;
        }
        let sample_rate = match version {
            MpegVersion::V1 => SAMPLE_RATES_V1[rate_index],
            MpegVersion::V2 => SAMPLE_RATES_V2[rate_index],
            MpegVersion::V2_5 => SAMPLE_RATES_V2_5[rate_index],
        };

        let padding = data[2] & 0x02 != 0;

        let samples_per_frame = match (version, layer) {
            (_, Layer::I) => 384,
            (_, Layer::II) => 1152,
            (MpegVersion::V1, Layer::III) => 1152,
            (_, Layer::III) => 576,
        };

        let frame_len = match layer {
            Layer::I => {
                (12 * bitrate_bps / sample_rate + u32::from(padding)) as usize * 4
            }
            Layer::II | Layer::III => {
                (samples_per_frame / 8 * bitrate_bps / sample_rate + u32::from(padding)) as usize
            }
        };
        if frame_len < 4 {
            return None;
        }

        Some(Self {
            version,
            layer,
            bitrate_bps,
            sample_rate,
            padding,
            samples_per_frame,
            frame_len,
        })
    }

    /// Playback duration of this frame in seconds.
    pub fn duration(&self) -> f64 {
        f64::from(self.samples_per_frame) / f64::from(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // MPEG1 Layer III, 128 kbps, 44.1 kHz, no padding, stereo.
    const HEADER_V1_L3_128: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];

    #[test]
    fn parses_a_canonical_layer3_header() {
        let header = FrameHeader::parse(&HEADER_V1_L3_128).unwrap();

        assert_eq!(header.version, MpegVersion::V1);
        assert_eq!(header.layer, Layer::III);
        assert_eq!(header.bitrate_bps, 128_000);
        assert_eq!(header.sample_rate, 44_100);
        assert!(!header.padding);
        assert_eq!(header.samples_per_frame, 1152);
        // 144 * 128000 / 44100 = 417 (truncated).
        assert_eq!(header.frame_len, 417);
        assert!((header.duration() - 1152.0 / 44_100.0).abs() < 1e-12);
    }

    #[test]
    fn padding_extends_the_frame_by_one_byte() {
        let padded = [0xFF, 0xFB, 0x92, 0x00];
        let header = FrameHeader::parse(&padded).unwrap();
        assert!(header.padding);
        assert_eq!(header.frame_len, 418);
    }

    #[test]
    fn parses_an_mpeg2_layer3_header() {
        // MPEG2 Layer III, 64 kbps, 22.05 kHz.
        let header = FrameHeader::parse(&[0xFF, 0xF3, 0x80, 0x00]).unwrap();
        assert_eq!(header.version, MpegVersion::V2);
        assert_eq!(header.sample_rate, 22_050);
        assert_eq!(header.samples_per_frame, 576);
        // 72 * 64000 / 22050 = 208 (truncated).
        assert_eq!(header.frame_len, 208);
    }

    #[test]
    fn rejects_bad_sync_and_reserved_fields() {
        // No sync word.
        assert!(FrameHeader::parse(&[0x00, 0xFB, 0x90, 0x00]).is_none());
        assert!(FrameHeader::parse(&[0xFF, 0x1B, 0x90, 0x00]).is_none());
        // Reserved version (01).
        assert!(FrameHeader::parse(&[0xFF, 0xEB, 0x90, 0x00]).is_none());
        // Reserved layer (00).
        assert!(FrameHeader::parse(&[0xFF, 0xF9, 0x90, 0x00]).is_none());
        // Free-format bitrate.
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0x00, 0x00]).is_none());
        // Invalid bitrate index (15).
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0xF0, 0x00]).is_none());
        // Reserved sample rate (11).
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0x9C, 0x00]).is_none());
        // Truncated input.
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0x90]).is_none());
    }
}
