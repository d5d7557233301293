/// Digital Signal Processing (DSP) module.
///
/// This module provides the DSP building blocks of the splitter: a low-pass
/// biquad, a stateful decimator built on it, and the divergence stage that
/// turns the 2 MHz SDR stream into the detector and display streams.
///
/// ```text
/// I/Q (Cs16) → Normalize ─┬─ LowPass → Decimate 40:1  → detector ring
///                         └─ LowPass → Decimate 166:1 → display ring
/// ```
///
/// # Modules
/// - [`filters`]: Second-order IIR low-pass filter
/// - [`decimator`]: Sample rate reduction with anti-aliasing filtering
/// - [`divergence`]: The two-path split feeding the ring buffers
///
/// # Thread Safety
///
/// DSP blocks maintain internal state and are **not** thread-safe. The
/// divergence stage is owned by the ingest task and only ever called from it.
use num_complex::Complex;

pub mod decimator;
pub mod divergence;
pub mod filters;

/// Trait for DSP blocks that process complex-valued signals.
///
/// # Examples
///
/// ```
/// use iqsplit::dsp::{DspBlock, decimator::Decimator};
/// use num_complex::Complex;
///
/// let mut decimator = Decimator::new(4, 5_000.0, 2_000_000.0);
/// let input = vec![Complex::new(1.0, 0.0); 10];
/// let output = decimator.process(&input);
/// assert_eq!(output.len(), 2);
/// ```
pub trait DspBlock {
    /// Process a block of complex samples.
    ///
    /// The output length may differ from the input length depending on the
    /// operation (e.g., decimation reduces the length).
    fn process(&mut self, data: &[Complex<f32>]) -> Vec<Complex<f32>>;
}
