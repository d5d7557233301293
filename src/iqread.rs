//! I/Q Data Reading Module
//!
//! The SDR server streams raw interleaved signed 16-bit little-endian I/Q
//! pairs with no framing. A socket read may end anywhere, including in the
//! middle of a pair, so [`Cs16Decoder`] carries the incomplete tail over to
//! the next read instead of dropping it. [`IqAsyncRead`] wraps any
//! [`AsyncRead`] into a [`Stream`] of normalized sample blocks.
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::io::{AsyncRead, ReadBuf};

use crate::Sample;
use crate::dsp::divergence::normalize;

/// Bytes per Cs16 I/Q pair.
pub const BYTES_PER_SAMPLE: usize = 4;

/// Default number of I/Q pairs requested per socket read.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/**
 * Incremental Cs16 decoder
 */
#[derive(Debug, Default)]
pub struct Cs16Decoder {
    pending: [u8; BYTES_PER_SAMPLE],
    pending_len: usize,
}

impl Cs16Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as many complete pairs as `bytes` (plus any carried tail) holds.
    pub fn decode(&mut self, mut bytes: &[u8], out: &mut Vec<Sample>) {
        if self.pending_len > 0 {
            let need = BYTES_PER_SAMPLE - self.pending_len;
            let take = need.min(bytes.len());
            self.pending[self.pending_len..self.pending_len + take]
                .copy_from_slice(&bytes[..take]);
            self.pending_len += take;
            bytes = &bytes[take..];
            if self.pending_len < BYTES_PER_SAMPLE {
                return;
            }
            out.push(pair_to_complex(&self.pending));
            self.pending_len = 0;
        }

        let mut chunks = bytes.chunks_exact(BYTES_PER_SAMPLE);
        out.extend(chunks.by_ref().map(pair_to_complex));

        let rest = chunks.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    /// Bytes of an incomplete pair waiting for the next read.
    pub fn pending(&self) -> usize {
        self.pending_len
    }

    /// Drop any incomplete pair. Returns how many bytes were discarded.
    pub fn reset(&mut self) -> usize {
        std::mem::take(&mut self.pending_len)
    }
}

fn pair_to_complex(c: &[u8]) -> Sample {
    Sample::new(
        normalize(i16::from_le_bytes([c[0], c[1]])),
        normalize(i16::from_le_bytes([c[2], c[3]])),
    )
}

/**
 * Asynchronous I/Q Reader
 */
pub struct IqAsyncRead<R: AsyncRead + Unpin> {
    reader: R,
    decoder: Cs16Decoder,
    buffer: Vec<u8>,
    bytes_read: u64,
    discarded: usize,
}

impl<R: AsyncRead + Unpin> IqAsyncRead<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            decoder: Cs16Decoder::new(),
            buffer: vec![0u8; chunk_size.max(1) * BYTES_PER_SAMPLE],
            bytes_read: 0,
            discarded: 0,
        }
    }

    /// Total bytes pulled from the underlying reader.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Trailing bytes of an incomplete pair dropped when the stream ended.
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl<R: AsyncRead + Unpin> Stream for IqAsyncRead<R> {
    type Item = Result<Vec<Sample>, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let mut read_buf = ReadBuf::new(&mut this.buffer);
            match Pin::new(&mut this.reader).poll_read(cx, &mut read_buf) {
                Poll::Ready(Ok(())) => {
                    let filled = read_buf.filled().len();
                    if filled == 0 {
                        // EOF: an incomplete trailing pair cannot be completed.
                        this.discarded += this.decoder.reset();
                        return Poll::Ready(None);
                    }
                    this.bytes_read += filled as u64;

                    let mut samples = Vec::with_capacity(filled / BYTES_PER_SAMPLE + 1);
                    this.decoder.decode(&this.buffer[..filled], &mut samples);
                    if !samples.is_empty() {
                        return Poll::Ready(Some(Ok(samples)));
                    }
                    // Only part of a pair arrived; read again.
                }
                Poll::Ready(Err(e)) => {
                    this.discarded += this.decoder.reset();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
