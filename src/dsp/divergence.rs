//! Signal divergence: one 2 MHz stream in, two decimated streams out.
//!
//! ```text
//!                      ┌─ LowPass 5 kHz ─ ↓40  ─► detector ring (50 kHz)
//! Cs16 I/Q ─ /32768 ───┤
//!                      └─ LowPass 5 kHz ─ ↓166 ─► display ring  (~12 kHz)
//! ```
//!
//! Both paths see the same normalized input and keep their own filter memory
//! and decimation phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::Sample;
use crate::dsp::decimator::Decimator;
use crate::ring::SharedRing;

/// Input rate of the SDR server stream, in samples per second.
pub const INPUT_SAMPLE_RATE: u32 = 2_000_000;
/// Low-pass -3 dB point shared by both paths.
pub const FILTER_CUTOFF_HZ: f32 = 5_000.0;
/// 2 MHz / 40 = 50 kHz
pub const DETECTOR_DECIMATION: usize = 40;
/// 2 MHz / 166 ≈ 12.048 kHz, advertised as 12 kHz
pub const DISPLAY_DECIMATION: usize = 166;

/// Normalize one signed 16-bit component to [-1, 1).
#[inline]
pub fn normalize(v: i16) -> f32 {
    v as f32 / 32768.0
}

/// Two independent low-pass + decimate chains feeding two rings.
pub struct DivergenceStage {
    detector: Decimator,
    display: Decimator,
    detector_ring: Arc<SharedRing>,
    display_ring: Arc<SharedRing>,
    samples_in: Arc<AtomicU64>,
    // Scratch buffers reused between blocks.
    det_out: Vec<Sample>,
    disp_out: Vec<Sample>,
}

impl DivergenceStage {
    pub fn new(
        detector_ring: Arc<SharedRing>,
        display_ring: Arc<SharedRing>,
        samples_in: Arc<AtomicU64>,
    ) -> Self {
        let fs = INPUT_SAMPLE_RATE as f32;
        Self {
            detector: Decimator::new(DETECTOR_DECIMATION, FILTER_CUTOFF_HZ, fs),
            display: Decimator::new(DISPLAY_DECIMATION, FILTER_CUTOFF_HZ, fs),
            detector_ring,
            display_ring,
            samples_in,
            det_out: Vec::new(),
            disp_out: Vec::new(),
        }
    }

    /// Run a block of already-normalized samples through both paths and push
    /// the decimated results into the rings.
    pub fn process(&mut self, block: &[Sample]) {
        self.det_out.clear();
        self.disp_out.clear();

        for &x in block {
            if let Some(y) = self.detector.push(x) {
                self.det_out.push(y);
            }
            if let Some(y) = self.display.push(x) {
                self.disp_out.push(y);
            }
        }

        self.samples_in
            .fetch_add(block.len() as u64, Ordering::Relaxed);
        self.detector_ring.push_slice(&self.det_out);
        self.display_ring.push_slice(&self.disp_out);
    }

    /// Return both chains to their construction state.
    ///
    /// Called whenever the upstream connection is (re)established, since the
    /// input stream is discontinuous there.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.display.reset();
    }

    pub fn detector(&self) -> &Decimator {
        &self.detector
    }

    pub fn display(&self) -> &Decimator {
        &self.display
    }
}
