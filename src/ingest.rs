//! Ingest link: upstream I/Q socket into the divergence stage.
//!
//! Every (re)connect resets both DSP chains before the first new sample, so
//! filter memory from the previous session never bleeds into the new one.
//! The rings and the relay senders are not touched by an upstream outage.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::dsp::divergence::DivergenceStage;
use crate::error::Result;
use crate::iqread::{DEFAULT_CHUNK_SIZE, IqAsyncRead};
use crate::link::{LinkSession, LinkStats, supervise};

pub struct IngestLink {
    addr: String,
    stage: DivergenceStage,
    stats: Arc<LinkStats>,
}

impl IngestLink {
    pub fn new(addr: impl Into<String>, stage: DivergenceStage, stats: Arc<LinkStats>) -> Self {
        Self {
            addr: addr.into(),
            stage,
            stats,
        }
    }

    pub async fn run(mut self, retry_interval: Duration, shutdown: CancellationToken) {
        let stats = self.stats.clone();
        supervise(&mut self, &stats, retry_interval, shutdown).await;
    }
}

impl LinkSession for IngestLink {
    type Conn = TcpStream;

    async fn open(&mut self) -> Result<TcpStream> {
        let conn = TcpStream::connect(&self.addr).await?;
        conn.set_nodelay(true)?;
        self.stage.reset();
        debug!(link = self.stats.name(), addr = %self.addr, "DSP state reset");
        Ok(conn)
    }

    async fn run(&mut self, conn: TcpStream, shutdown: &CancellationToken) -> Result<()> {
        let mut reader = IqAsyncRead::new(conn, DEFAULT_CHUNK_SIZE);
        let mut counted = 0u64;

        let result: Result<()> = loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                next = reader.next() => next,
            };

            self.stats.add_bytes_in(reader.bytes_read() - counted);
            counted = reader.bytes_read();

            match next {
                Some(Ok(block)) => {
                    trace!(link = self.stats.name(), samples = block.len(), "block");
                    self.stage.process(&block);
                }
                Some(Err(e)) => break Err(e.into()),
                None => {
                    break Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "SDR server closed the connection",
                    )
                    .into());
                }
            }
        };

        if reader.discarded() > 0 {
            debug!(
                link = self.stats.name(),
                bytes = reader.discarded(),
                "discarded incomplete trailing pair"
            );
            self.stats.add_discarded(reader.discarded() as u64);
        }
        result
    }
}
