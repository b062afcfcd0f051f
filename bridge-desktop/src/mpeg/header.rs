//! MPEG audio frame sync and header parsing.

/// Size of an MPEG audio frame header.
pub const HEADER_LEN: usize = 4;

/// Longest possible fixed-bitrate frame (MPEG-2.5 Layer II, 160 kbps, 8 kHz,
/// padded). A stream never leaves more than this queued between frames.
pub const MAX_FRAME_LEN: usize = 2881;

const ID3V2_HEADER_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    I,
    II,
    III,
}

/// Decoded fields of a 4-byte MPEG audio frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub channels: u16,
    /// Total frame length including the header.
    pub frame_len: usize,
}

#[rustfmt::skip]
const BITRATES_V1: [[u32; 15]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];

#[rustfmt::skip]
const BITRATES_V2: [[u32; 15]; 2] = [
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];

impl FrameHeader {
    /// Parse a frame header. Returns `None` for anything that is not a valid
    /// fixed-bitrate header (free-format streams are not supported).
    pub fn parse(bytes: [u8; HEADER_LEN]) -> Option<Self> {
        if bytes[0] != 0xFF || bytes[1] & 0xE0 != 0xE0 {
            return None;
        }

        let version = match (bytes[1] >> 3) & 0b11 {
            0b00 => MpegVersion::Mpeg25,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return None,
        };

        let layer = match (bytes[1] >> 1) & 0b11 {
            0b01 => Layer::III,
            0b10 => Layer::II,
            0b11 => Layer::I,
            _ => return None,
        };

        let bitrate_index = (bytes[2] >> 4) as usize;
        if bitrate_index == 0 || bitrate_index == 0b1111 {
            return None;
        }

        let bitrate_kbps = match (version, layer) {
            (MpegVersion::Mpeg1, Layer::I) => BITRATES_V1[0][bitrate_index],
            (MpegVersion::Mpeg1, Layer::II) => BITRATES_V1[1][bitrate_index],
            (MpegVersion::Mpeg1, Layer::III) => BITRATES_V1[2][bitrate_index],
            (_, Layer::I) => BITRATES_V2[0][bitrate_index],
            (_, _) => BITRATES_V2[1][bitrate_index],
        };

        let base_rate = match (bytes[2] >> 2) & 0b11 {
            0b00 => 44_100,
            0b01 => 48_000,
            0b10 => 32_000,
            _ => return None,
        };
        let sample_rate = match version {
            MpegVersion::Mpeg1 => base_rate,
            MpegVersion::Mpeg2 => base_rate / 2,
            MpegVersion::Mpeg25 => base_rate / 4,
        };

        let padding = (bytes[2] >> 1) & 1 == 1;
        let channels = if (bytes[3] >> 6) & 0b11 == 0b11 { 1 } else { 2 };

        let bitrate = bitrate_kbps * 1000;
        let frame_len = match layer {
            Layer::I => ((12 * bitrate / sample_rate) + padding as u32) * 4,
            Layer::II => 144 * bitrate / sample_rate + padding as u32,
            Layer::III if version == MpegVersion::Mpeg1 => {
                144 * bitrate / sample_rate + padding as u32
            }
            Layer::III => 72 * bitrate / sample_rate + padding as u32,
        } as usize;

        if frame_len <= HEADER_LEN {
            return None;
        }

        Some(Self {
            version,
            layer,
            bitrate_kbps,
            sample_rate,
            padding,
            channels,
            frame_len,
        })
    }

    /// Decoded samples per channel carried by one frame.
    pub fn samples_per_frame(&self) -> usize {
        match (self.layer, self.version) {
            (Layer::I, _) => 384,
            (Layer::II, _) => 1152,
            (Layer::III, MpegVersion::Mpeg1) => 1152,
            (Layer::III, _) => 576,
        }
    }
}

/// Outcome of scanning the unread queue for the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan {
    /// Leading bytes that can be dropped (junk or metadata tags).
    pub discard: usize,
    /// Bytes of a metadata tag that lie beyond the scanned buffer and must be
    /// dropped as they arrive.
    pub skip: usize,
    /// Header of a frame that is completely present right after `discard`.
    pub frame: Option<FrameHeader>,
}

/// Find the next complete frame in `buf`, skipping ID3v2 tags and junk.
///
/// A tag that extends past the end of `buf` is discarded in full and the
/// missing part reported as [`Scan::skip`], so tags larger than any queue
/// never have to be buffered.
pub fn scan(buf: &[u8]) -> Scan {
    let mut pos = 0;

    while buf.len() - pos >= HEADER_LEN {
        let rest = &buf[pos..];

        if rest.starts_with(b"ID3") {
            if rest.len() < ID3V2_HEADER_LEN {
                return Scan::pending(pos);
            }
            if let Some(tag_len) = id3v2_len(rest) {
                if rest.len() < tag_len {
                    return Scan {
                        discard: buf.len(),
                        skip: tag_len - rest.len(),
                        frame: None,
                    };
                }
                pos += tag_len;
                continue;
            }
        }

        let header = FrameHeader::parse([rest[0], rest[1], rest[2], rest[3]]);
        match header {
            Some(header) if rest.len() >= header.frame_len => {
                return Scan {
                    discard: pos,
                    skip: 0,
                    frame: Some(header),
                };
            }
            Some(_) => return Scan::pending(pos),
            None => pos += 1,
        }
    }

    Scan::pending(pos)
}

impl Scan {
    fn pending(discard: usize) -> Self {
        Self {
            discard,
            skip: 0,
            frame: None,
        }
    }
}

/// Length of an ID3v2 tag (header, body and optional footer) from its 10-byte
/// header. `None` if the header is malformed.
fn id3v2_len(buf: &[u8]) -> Option<usize> {
    let header = buf.get(..ID3V2_HEADER_LEN)?;

    // Version bytes are never 0xFF and the size is syncsafe
    if header[3] == 0xFF || header[4] == 0xFF || header[6..].iter().any(|b| b & 0x80 != 0) {
        return None;
    }

    let size = header[6..]
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | b as usize);
    let footer = if header[5] & 0x10 != 0 { ID3V2_HEADER_LEN } else { 0 };

    Some(ID3V2_HEADER_LEN + size + footer)
}
