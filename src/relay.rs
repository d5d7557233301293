//! Relay sender: drains one ring buffer into a framed downstream TCP stream.
//!
//! On every new connection the sender writes a [`StreamHeader`] announcing
//! its output rate and restarts the frame sequence at 0. Samples are read in
//! two phases (peek, write, consume) so a failed write leaves them in the
//! ring for the next connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::Result;
use crate::link::{LinkSession, LinkStats, supervise};
use crate::protocol::{MAX_FRAME_SAMPLES, StreamHeader, encode_data_frame};
use crate::ring::SharedRing;

/// Advertised rate of the detector stream (2 MHz / 40).
pub const DETECTOR_SAMPLE_RATE: u32 = 50_000;
/// Advertised rate of the display stream (2 MHz / 166, nominal).
pub const DISPLAY_SAMPLE_RATE: u32 = 12_000;

/// One downstream float32 stream fed from a [`SharedRing`].
pub struct RelaySender {
    addr: String,
    sample_rate: u32,
    ring: Arc<SharedRing>,
    stats: Arc<LinkStats>,
    sequence: u32,
    frame: Vec<u8>,
}

impl RelaySender {
    pub fn new(
        addr: impl Into<String>,
        sample_rate: u32,
        ring: Arc<SharedRing>,
        stats: Arc<LinkStats>,
    ) -> Self {
        Self {
            addr: addr.into(),
            sample_rate,
            ring,
            stats,
            sequence: 0,
            frame: Vec::new(),
        }
    }

    /// Sequence number the next data frame will carry.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Run the reconnect loop until `shutdown` is cancelled.
    pub async fn run(mut self, retry_interval: Duration, shutdown: CancellationToken) {
        let stats = self.stats.clone();
        supervise(&mut self, &stats, retry_interval, shutdown).await;
    }

    async fn send_batch(&mut self, conn: &mut TcpStream) -> Result<bool> {
        let (pos, batch) = self.ring.peek_batch(MAX_FRAME_SAMPLES);
        if batch.is_empty() {
            return Ok(false);
        }

        encode_data_frame(self.sequence, &batch, &mut self.frame);
        conn.write_all(&self.frame).await?;

        // Only now are the samples gone from the ring.
        self.ring.consume(pos, batch.len());
        self.stats.add_samples(batch.len() as u64);
        self.stats.add_frames(1);
        self.stats.add_bytes_out(self.frame.len() as u64);
        trace!(
            link = self.stats.name(),
            seq = self.sequence,
            samples = batch.len(),
            "frame sent"
        );
        self.sequence = self.sequence.wrapping_add(1);
        Ok(true)
    }
}

impl LinkSession for RelaySender {
    type Conn = TcpStream;

    async fn open(&mut self) -> Result<TcpStream> {
        let mut conn = TcpStream::connect(&self.addr).await?;
        conn.set_nodelay(true)?;

        let header = StreamHeader::new(self.sample_rate).encode();
        conn.write_all(&header).await?;
        self.stats.add_bytes_out(header.len() as u64);
        self.sequence = 0;

        debug!(
            link = self.stats.name(),
            addr = %self.addr,
            sample_rate = self.sample_rate,
            backlog = self.ring.occupancy(),
            "stream header sent"
        );
        Ok(conn)
    }

    async fn run(&mut self, mut conn: TcpStream, shutdown: &CancellationToken) -> Result<()> {
        let mut probe = [0u8; 64];
        // Set once the collector shuts down its write half. It may still be
        // reading, so only a failed write ends the session.
        let mut peer_half_closed = false;
        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }
            if self.send_batch(&mut conn).await? {
                continue;
            }

            // Ring is empty. The collector never talks back, so watching the
            // socket catches a reset without waiting for the next write.
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = self.ring.readable() => {}
                read = conn.read(&mut probe), if !peer_half_closed => match read {
                    Ok(0) => {
                        debug!(link = self.stats.name(), "collector half-closed the connection");
                        peer_half_closed = true;
                    }
                    Ok(_) => {}
                    Err(e) => return Err(e.into()),
                },
            }
        }
    }
}
