//! Connection supervision shared by every socket-owning task.
//!
//! Each link runs the same three-state machine:
//!
//! ```text
//!            retry timer expires             open() ok
//! DISCONNECTED ───────────────► CONNECTING ───────────► CONNECTED
//!      ▲                            │                       │
//!      └──────── open() failed ─────┴──── run() returned ───┘
//! ```
//!
//! The retry interval is constant (no exponential backoff) and retries never
//! give up. Every wait is raced against the shutdown token, so a link parked
//! in DISCONNECTED reacts to shutdown immediately.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Fixed delay between a link failure and the next connection attempt.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Connection status of one logical link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkStatus {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl LinkStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => LinkStatus::Connecting,
            2 => LinkStatus::Connected,
            _ => LinkStatus::Disconnected,
        }
    }

    /// Short label used in the status line.
    pub fn label(self) -> &'static str {
        match self {
            LinkStatus::Disconnected => "DOWN",
            LinkStatus::Connecting => "CONN",
            LinkStatus::Connected => "UP",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status and counters of one link.
///
/// Only the task that owns the link writes these; everyone else reads a
/// [`LinkSnapshot`].
#[derive(Debug)]
pub struct LinkStats {
    name: &'static str,
    status: AtomicU8,
    connects: AtomicU64,
    failures: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    samples: AtomicU64,
    frames: AtomicU64,
    discarded: AtomicU64,
}

impl LinkStats {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            status: AtomicU8::new(LinkStatus::Disconnected as u8),
            connects: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            samples: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    pub fn set_status(&self, status: LinkStatus) {
        self.status.store(status as u8, Ordering::Relaxed);
    }

    pub fn add_bytes_in(&self, n: u64) {
        self.bytes_in.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_bytes_out(&self, n: u64) {
        self.bytes_out.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_samples(&self, n: u64) {
        self.samples.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_frames(&self, n: u64) {
        self.frames.fetch_add(n, Ordering::Relaxed);
    }

    /// Bytes dropped because they did not form a whole sample.
    pub fn add_discarded(&self, n: u64) {
        self.discarded.fetch_add(n, Ordering::Relaxed);
    }

    fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            name: self.name,
            status: self.status(),
            connects: self.connects.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub name: &'static str,
    pub status: LinkStatus,
    /// Successful connections since startup
    pub connects: u64,
    /// Failed attempts plus dropped sessions
    pub failures: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub samples: u64,
    pub frames: u64,
    pub discarded: u64,
}

impl LinkSnapshot {
    /// Connections made after the first one.
    pub fn reconnects(&self) -> u64 {
        self.connects.saturating_sub(1)
    }
}

/// Deadline for the next connection attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryTimer {
    interval: Duration,
    deadline: Instant,
}

impl RetryTimer {
    /// A timer that is already expired, so the first attempt is immediate.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now(),
        }
    }

    /// Push the deadline one interval into the future.
    pub fn arm(&mut self) {
        self.deadline = Instant::now() + self.interval;
    }

    /// Wait for the deadline. Returns `false` if shutdown came first.
    pub async fn wait(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep_until(self.deadline) => true,
        }
    }
}

/// A connection-owning component driven by [`supervise`].
///
/// `open` performs everything that has to happen on entering CONNECTED
/// (connect, send a header, reset state). `run` moves data until the session
/// fails or shutdown is requested; it returns `Ok(())` only on shutdown.
pub trait LinkSession {
    type Conn: Send;

    fn open(&mut self) -> impl Future<Output = Result<Self::Conn>> + Send;

    fn run(
        &mut self,
        conn: Self::Conn,
        shutdown: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Drive `session` through the link state machine until shutdown.
pub async fn supervise<S: LinkSession>(
    session: &mut S,
    stats: &LinkStats,
    retry_interval: Duration,
    shutdown: CancellationToken,
) {
    let name = stats.name();
    let mut timer = RetryTimer::new(retry_interval);

    loop {
        // DISCONNECTED
        stats.set_status(LinkStatus::Disconnected);
        if !timer.wait(&shutdown).await {
            break;
        }

        // CONNECTING
        stats.set_status(LinkStatus::Connecting);
        debug!(link = name, "connecting");
        let opened = tokio::select! {
            _ = shutdown.cancelled() => break,
            opened = session.open() => opened,
        };
        let conn = match opened {
            Ok(conn) => conn,
            Err(e) => {
                stats.record_failure();
                warn!(link = name, "connection failed: {}, retrying in {:?}", e, retry_interval);
                timer.arm();
                continue;
            }
        };

        // CONNECTED
        stats.record_connect();
        stats.set_status(LinkStatus::Connected);
        info!(link = name, "connected");

        match session.run(conn, &shutdown).await {
            Ok(()) => break,
            Err(e) => {
                stats.record_failure();
                warn!(link = name, "connection lost: {}, retrying in {:?}", e, retry_interval);
                timer.arm();
            }
        }
        if shutdown.is_cancelled() {
            break;
        }
    }

    stats.set_status(LinkStatus::Disconnected);
    info!(link = name, "stopped");
}
