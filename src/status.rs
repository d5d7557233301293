//! Periodic health report.
//!
//! The reporter only reads atomics; it never takes a ring lock and never
//! waits on a link, so a stalled socket cannot delay the report.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::link::LinkSnapshot;
use crate::pipeline::Shared;
use crate::ring::RingSnapshot;

/// Everything the status line shows, captured at one instant.
#[derive(Debug, Clone, Copy)]
pub struct StatusReport {
    pub sdr: LinkSnapshot,
    pub det: LinkSnapshot,
    pub disp: LinkSnapshot,
    /// `None` when the control relay is disabled
    pub ctrl: Option<LinkSnapshot>,
    pub samples_rx: u64,
    pub det_ring: RingSnapshot,
    pub disp_ring: RingSnapshot,
}

impl StatusReport {
    pub fn capture(shared: &Shared) -> Self {
        Self {
            sdr: shared.sdr.snapshot(),
            det: shared.det.snapshot(),
            disp: shared.disp.snapshot(),
            ctrl: shared.ctrl.as_ref().map(|s| s.snapshot()),
            samples_rx: shared.samples_in(),
            det_ring: shared.detector_ring.snapshot(),
            disp_ring: shared.display_ring.snapshot(),
        }
    }

    /// Emit the same figures as a structured tracing event.
    pub fn trace(&self) {
        debug!(
            sdr = %self.sdr.status,
            det = %self.det.status,
            disp = %self.disp.status,
            rx = self.samples_rx,
            det_tx = self.det.samples,
            disp_tx = self.disp.samples,
            det_buffered = self.det_ring.occupancy,
            disp_buffered = self.disp_ring.occupancy,
            det_overflows = self.det_ring.dropped,
            disp_overflows = self.disp_ring.dropped,
            sdr_discarded = self.sdr.discarded,
            "status"
        );
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[STATUS] Connections: SDR={} DET={} DISP={}",
            self.sdr.status, self.det.status, self.disp.status
        )?;
        if let Some(ctrl) = &self.ctrl {
            write!(f, " CTRL={}", ctrl.status)?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "[STATUS] Samples: RX={} DET_TX={} DISP_TX={}",
            self.samples_rx, self.det.samples, self.disp.samples
        )?;
        writeln!(
            f,
            "[STATUS] Buffers: DET={}/{} ({:.1}%) DISP={}/{} ({:.1}%)",
            self.det_ring.occupancy,
            self.det_ring.capacity,
            self.det_ring.percent(),
            self.disp_ring.occupancy,
            self.disp_ring.capacity,
            self.disp_ring.percent()
        )?;
        write!(
            f,
            "[STATUS] Overflows: DET={} DISP={}",
            self.det_ring.dropped, self.disp_ring.dropped
        )?;
        write!(f, "\n[STATUS] Discarded: SDR={}B", self.sdr.discarded)?;

        write!(
            f,
            "\n[STATUS] Reconnects: SDR={} DET={} DISP={}",
            self.sdr.reconnects(),
            self.det.reconnects(),
            self.disp.reconnects()
        )?;
        if let Some(ctrl) = &self.ctrl {
            write!(
                f,
                " CTRL={}\n[STATUS] Control: SDR->RELAY={}B RELAY->SDR={}B",
                ctrl.reconnects(),
                ctrl.bytes_in,
                ctrl.bytes_out
            )?;
        }
        Ok(())
    }
}

/// Write one report to `sink`. Write errors are ignored.
pub fn report<W: Write>(shared: &Shared, sink: &mut W) {
    let status = StatusReport::capture(shared);
    status.trace();
    let _ = writeln!(sink, "\n{status}");
    let _ = sink.flush();
}

/// Ticks at most once per `interval`, even after a stalled write.
fn ticker(interval: Duration) -> Interval {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Report to stderr every `interval` until shutdown.
pub async fn run(shared: &Shared, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = ticker(interval);
    // The first tick completes immediately; skip it so the first report
    // comes one interval after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => report(shared, &mut std::io::stderr()),
        }
    }
}
