//! Control relay: byte-transparent bridge between the SDR server's control
//! port and the collector's control port.
//!
//! Both sockets form one session. Either side closing or failing tears the
//! whole session down, and both are reconnected together on the next
//! attempt. Bytes are never inspected.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::Result;
use crate::link::{LinkSession, LinkStats, supervise};

const COPY_BUFFER_SIZE: usize = 4096;

pub struct ControlRelay {
    upstream: String,
    downstream: String,
    stats: Arc<LinkStats>,
}

impl ControlRelay {
    pub fn new(
        upstream: impl Into<String>,
        downstream: impl Into<String>,
        stats: Arc<LinkStats>,
    ) -> Self {
        Self {
            upstream: upstream.into(),
            downstream: downstream.into(),
            stats,
        }
    }

    pub async fn run(mut self, retry_interval: Duration, shutdown: CancellationToken) {
        let stats = self.stats.clone();
        supervise(&mut self, &stats, retry_interval, shutdown).await;
    }
}

impl LinkSession for ControlRelay {
    /// (SDR server side, collector side)
    type Conn = (TcpStream, TcpStream);

    async fn open(&mut self) -> Result<Self::Conn> {
        let sdr = TcpStream::connect(&self.upstream).await?;
        // If this fails the SDR side is dropped and closed with it.
        let collector = TcpStream::connect(&self.downstream).await?;
        sdr.set_nodelay(true)?;
        collector.set_nodelay(true)?;
        debug!(
            link = self.stats.name(),
            upstream = %self.upstream,
            downstream = %self.downstream,
            "control session open"
        );
        Ok((sdr, collector))
    }

    async fn run(&mut self, conn: Self::Conn, shutdown: &CancellationToken) -> Result<()> {
        let (mut sdr, mut collector) = conn;
        let (mut sdr_rx, mut sdr_tx) = sdr.split();
        let (mut col_rx, mut col_tx) = collector.split();
        let stats = &self.stats;

        tokio::select! {
            _ = shutdown.cancelled() => Ok(()),
            r = pump(&mut sdr_rx, &mut col_tx, "sdr", |n| stats.add_bytes_in(n)) => r,
            r = pump(&mut col_rx, &mut sdr_tx, "collector", |n| stats.add_bytes_out(n)) => r,
        }
    }
}

/// Copy bytes from `reader` to `writer` until one of them fails.
///
/// Never returns `Ok`: end of stream on `reader` is reported as an
/// `UnexpectedEof` error naming the side that closed.
async fn pump<R, W, F>(reader: &mut R, writer: &mut W, from: &'static str, count: F) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Fn(u64),
{
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{from} closed the control connection"),
            )
            .into());
        }
        writer.write_all(&buf[..n]).await?;
        count(n as u64);
        trace!(from, bytes = n, "control bytes forwarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pump_copies_until_eof() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let mut out = Vec::new();
        a.write_all(b"SET_FREQ 10000000\n").await.unwrap();
        drop(a);

        let total = std::cell::Cell::new(0u64);
        let err = pump(&mut b, &mut out, "sdr", |n| total.set(total.get() + n))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sdr closed"));
        assert_eq!(out, b"SET_FREQ 10000000\n");
        assert_eq!(total.get(), 18);
    }
}
