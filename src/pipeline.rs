//! The pipeline context: owns the rings and link counters, starts one task
//! per link plus the status reporter, and stops them on shutdown.
//!
//! ```text
//!              ┌──────────────┐   det ring   ┌─────────────┐
//! SDR :4536 ──►│ IngestLink   ├─────────────►│ RelaySender ├──► collector :4410
//!              │  (DSP stage) ├─────────────►│ RelaySender ├──► collector :4411
//!              └──────────────┘  disp ring   └─────────────┘
//! SDR :4535 ◄────────────── ControlRelay ─────────────────────► collector :4409
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{DETECTOR_RING_CAPACITY, DISPLAY_RING_CAPACITY, SplitterConfig, Timing};
use crate::control::ControlRelay;
use crate::dsp::divergence::DivergenceStage;
use crate::error::{Error, Result};
use crate::ingest::IngestLink;
use crate::link::LinkStats;
use crate::relay::{DETECTOR_SAMPLE_RATE, DISPLAY_SAMPLE_RATE, RelaySender};
use crate::ring::SharedRing;
use crate::status;

/// State shared between the tasks and the status reporter.
#[derive(Debug)]
pub struct Shared {
    pub detector_ring: Arc<SharedRing>,
    pub display_ring: Arc<SharedRing>,
    pub sdr: Arc<LinkStats>,
    pub det: Arc<LinkStats>,
    pub disp: Arc<LinkStats>,
    pub ctrl: Option<Arc<LinkStats>>,
    samples_in: Arc<AtomicU64>,
}

impl Shared {
    /// Allocate both rings. Fails if either cannot be reserved.
    pub fn new(detector_capacity: usize, display_capacity: usize, control: bool) -> Result<Self> {
        Ok(Self {
            detector_ring: Arc::new(SharedRing::new("det", detector_capacity)?),
            display_ring: Arc::new(SharedRing::new("disp", display_capacity)?),
            sdr: Arc::new(LinkStats::new("sdr")),
            det: Arc::new(LinkStats::new("det")),
            disp: Arc::new(LinkStats::new("disp")),
            ctrl: control.then(|| Arc::new(LinkStats::new("ctrl"))),
            samples_in: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Samples received from the SDR server since startup.
    pub fn samples_in(&self) -> u64 {
        self.samples_in.load(Ordering::Relaxed)
    }
}

pub struct Pipeline {
    config: SplitterConfig,
    timing: Timing,
    shared: Arc<Shared>,
}

impl Pipeline {
    /// Validate `config` and allocate the 30 s rings.
    pub fn new(config: SplitterConfig) -> Result<Self> {
        Self::with_capacities(config, DETECTOR_RING_CAPACITY, DISPLAY_RING_CAPACITY)
    }

    pub fn with_capacities(
        config: SplitterConfig,
        detector_capacity: usize,
        display_capacity: usize,
    ) -> Result<Self> {
        config.validate()?;
        let shared = Shared::new(detector_capacity, display_capacity, config.control)?;
        Ok(Self {
            config,
            timing: Timing::default(),
            shared: Arc::new(shared),
        })
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn shared(&self) -> Arc<Shared> {
        self.shared.clone()
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Run every task until `shutdown` is cancelled, then give them the
    /// grace period to finish before aborting the rest.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let Self {
            config,
            timing,
            shared,
        } = self;
        let retry = timing.retry_interval;
        let mut tasks = JoinSet::new();

        let stage = DivergenceStage::new(
            shared.detector_ring.clone(),
            shared.display_ring.clone(),
            shared.samples_in.clone(),
        );
        let ingest = IngestLink::new(config.sdr_addr(), stage, shared.sdr.clone());
        tasks.spawn(ingest.run(retry, shutdown.clone()));

        let det = RelaySender::new(
            config.relay_det_addr(),
            DETECTOR_SAMPLE_RATE,
            shared.detector_ring.clone(),
            shared.det.clone(),
        );
        tasks.spawn(det.run(retry, shutdown.clone()));

        let disp = RelaySender::new(
            config.relay_disp_addr(),
            DISPLAY_SAMPLE_RATE,
            shared.display_ring.clone(),
            shared.disp.clone(),
        );
        tasks.spawn(disp.run(retry, shutdown.clone()));

        if let Some(stats) = &shared.ctrl {
            let control = ControlRelay::new(
                config.sdr_control_addr(),
                config.relay_control_addr(),
                stats.clone(),
            );
            tasks.spawn(control.run(retry, shutdown.clone()));
        }

        {
            let shared = shared.clone();
            let shutdown = shutdown.clone();
            tasks.spawn(async move {
                status::run(&shared, timing.status_interval, shutdown).await;
            });
        }

        info!(tasks = tasks.len(), "pipeline running");
        let outcome = watch(&mut tasks, &shutdown).await;

        info!("shutting down, waiting up to {:?} for tasks", timing.shutdown_grace);
        let drained = tokio::time::timeout(timing.shutdown_grace, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!("pipeline task failed during shutdown: {}", e);
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!("{} task(s) still running after grace period, aborting", tasks.len());
            tasks.shutdown().await;
        }

        // Unsent samples are dropped with the rings.
        status::report(&shared, &mut std::io::stderr());
        outcome
    }
}

/// Wait for shutdown. A task that dies before then leaves its link dead for
/// good, so it cancels `shutdown` and the whole pipeline stops with an error.
async fn watch(tasks: &mut JoinSet<()>, shutdown: &CancellationToken) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            Some(joined) = tasks.join_next() => {
                // Tasks only return on shutdown.
                if let Err(e) = joined {
                    error!("pipeline task failed: {}", e);
                    shutdown.cancel();
                    return Err(Error::other(format!("pipeline task failed: {e}")));
                }
            }
        }
    }
}
