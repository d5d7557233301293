//! Downstream wire protocol (float32 I/Q relay streams)
//!
//! Every connection starts with one 16-byte stream header, followed by any
//! number of data frames:
//!
//! ```text
//! header:  magic "FT32" | sample_rate | reserved1 = 0 | reserved2 = 0
//! frame:   magic "DATA" | sequence    | num_samples   | reserved = 0
//!          num_samples × (I: f32, Q: f32)
//! ```
//!
//! All fields are 32 bits wide and written in the sender's native byte order.
//! The collector is expected to share that byte order; nothing is negotiated.

use crate::Sample;
use crate::error::{Error, Result};

/// "FT32": float32 stream header
pub const MAGIC_FT32: u32 = 0x4654_3332;
/// "DATA": float32 data frame
pub const MAGIC_DATA: u32 = 0x4441_5441;

/// Size of the stream header and of a data frame header, in bytes.
pub const HEADER_LEN: usize = 16;
/// Bytes per I/Q pair in a data frame payload.
pub const BYTES_PER_PAIR: usize = 8;
/// Largest number of samples carried by one data frame.
pub const MAX_FRAME_SAMPLES: usize = 2048;

/// Sent once when a relay connection is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub sample_rate: u32,
}

impl StreamHeader {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        words_to_bytes([MAGIC_FT32, self.sample_rate, 0, 0])
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let [magic, sample_rate, _, _] = bytes_to_words(bytes)?;
        if magic != MAGIC_FT32 {
            return Err(Error::protocol(format!(
                "invalid stream header magic: 0x{magic:08X}"
            )));
        }
        Ok(Self { sample_rate })
    }
}

/// Header of one data frame; `num_samples` pairs follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub sequence: u32,
    pub num_samples: u32,
}

impl FrameHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        words_to_bytes([MAGIC_DATA, self.sequence, self.num_samples, 0])
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let [magic, sequence, num_samples, _] = bytes_to_words(bytes)?;
        if magic != MAGIC_DATA {
            return Err(Error::protocol(format!(
                "invalid data frame magic: 0x{magic:08X}"
            )));
        }
        if num_samples as usize > MAX_FRAME_SAMPLES {
            return Err(Error::protocol(format!(
                "data frame of {num_samples} samples exceeds {MAX_FRAME_SAMPLES}"
            )));
        }
        Ok(Self {
            sequence,
            num_samples,
        })
    }

    /// Payload length in bytes.
    pub fn payload_len(&self) -> usize {
        self.num_samples as usize * BYTES_PER_PAIR
    }
}

/// Serialize one complete data frame (header and payload) into `out`.
///
/// `out` is cleared first so the same buffer can be reused for every frame.
pub fn encode_data_frame(sequence: u32, samples: &[Sample], out: &mut Vec<u8>) {
    debug_assert!(samples.len() <= MAX_FRAME_SAMPLES);
    out.clear();
    out.reserve(HEADER_LEN + samples.len() * BYTES_PER_PAIR);

    let header = FrameHeader {
        sequence,
        num_samples: samples.len() as u32,
    };
    out.extend_from_slice(&header.encode());
    for s in samples {
        out.extend_from_slice(&s.re.to_ne_bytes());
        out.extend_from_slice(&s.im.to_ne_bytes());
    }
}

/// Decode a frame payload back into samples.
pub fn decode_payload(bytes: &[u8]) -> Result<Vec<Sample>> {
    if bytes.len() % BYTES_PER_PAIR != 0 {
        return Err(Error::protocol(format!(
            "payload of {} bytes is not a whole number of pairs",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_PAIR)
        .map(|c| {
            Sample::new(
                f32::from_ne_bytes([c[0], c[1], c[2], c[3]]),
                f32::from_ne_bytes([c[4], c[5], c[6], c[7]]),
            )
        })
        .collect())
}

/// Decode one complete data frame from the start of `bytes`.
///
/// Returns the header, the samples and the number of bytes consumed, or
/// `Ok(None)` if `bytes` does not yet hold the whole frame.
pub fn decode_data_frame(bytes: &[u8]) -> Result<Option<(FrameHeader, Vec<Sample>, usize)>> {
    if bytes.len() < HEADER_LEN {
        return Ok(None);
    }
    let header = FrameHeader::decode(&bytes[..HEADER_LEN])?;
    let end = HEADER_LEN + header.payload_len();
    if bytes.len() < end {
        return Ok(None);
    }
    let samples = decode_payload(&bytes[HEADER_LEN..end])?;
    Ok(Some((header, samples, end)))
}

fn words_to_bytes(words: [u32; 4]) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    for (chunk, w) in out.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&w.to_ne_bytes());
    }
    out
}

fn bytes_to_words(bytes: &[u8]) -> Result<[u32; 4]> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::protocol(format!(
            "truncated header: {} of {HEADER_LEN} bytes",
            bytes.len()
        )));
    }
    let mut words = [0u32; 4];
    for (w, chunk) in words.iter_mut().zip(bytes[..HEADER_LEN].chunks_exact(4)) {
        *w = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(words)
}
