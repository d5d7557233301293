/// Decimator with anti-aliasing filter.
///
/// This module provides a decimator that reduces the sample rate by an integer
/// factor, running every input sample through a low-pass biquad and keeping
/// one filtered sample out of every `factor`.
///
/// The decimation phase is carried across calls, so feeding `factor * m`
/// samples from a reset state yields exactly `m` outputs however the input is
/// chunked.
///
/// # Example
///
/// ```rust
/// use iqsplit::dsp::decimator::Decimator;
/// use iqsplit::dsp::DspBlock;
/// use num_complex::Complex;
///
/// // 2 MHz to 50 kHz through a 5 kHz low-pass
/// let mut decimator = Decimator::new(40, 5_000.0, 2_000_000.0);
///
/// let input = vec![Complex::new(0.5, 0.0); 4000];
/// let output = decimator.process(&input);
/// assert_eq!(output.len(), 100);
/// ```
use num_complex::Complex;

use super::DspBlock;
use super::filters::{BiquadState, LowPassBiquad};

/// A decimator that reduces the sample rate by an integer factor.
///
/// # Fields
/// - `factor`: The decimation factor (output rate = input rate / factor)
/// - `filter`: The anti-aliasing low-pass filter
/// - `phase`: Input samples seen since the last output
#[derive(Debug, Clone)]
pub struct Decimator {
    factor: usize,
    filter: LowPassBiquad,
    phase: usize,
}

impl Decimator {
    /// Creates a new decimator.
    ///
    /// # Arguments
    /// * `factor` - The decimation factor (must be > 0)
    /// * `cutoff` - Low-pass -3 dB frequency in Hz
    /// * `sample_rate` - Input sample rate in Hz
    ///
    /// # Panics
    /// Panics if `factor` is 0, or on an invalid filter design (see
    /// [`LowPassBiquad::new`]).
    pub fn new(factor: usize, cutoff: f32, sample_rate: f32) -> Self {
        assert!(factor > 0, "Decimation factor must be greater than 0");
        Self {
            factor,
            filter: LowPassBiquad::new(cutoff, sample_rate),
            phase: 0,
        }
    }

    /// Returns the decimation factor.
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Input samples consumed since the last emitted output.
    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn filter_state(&self) -> &BiquadState {
        self.filter.state()
    }

    /// Filter one input sample; returns an output on every `factor`-th call.
    #[inline]
    pub fn push(&mut self, x: Complex<f32>) -> Option<Complex<f32>> {
        let y = self.filter.process_sample(x);
        self.phase += 1;
        if self.phase >= self.factor {
            self.phase = 0;
            Some(y)
        } else {
            None
        }
    }

    /// Zero the filter memory and the decimation phase.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.phase = 0;
    }
}

impl DspBlock for Decimator {
    /// Processes input samples, applying the anti-aliasing filter and decimation.
    ///
    /// # Returns
    /// Decimated output samples
    fn process(&mut self, data: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let mut output = Vec::with_capacity(data.len() / self.factor + 1);
        for &x in data {
            if let Some(y) = self.push(x) {
                output.push(y);
            }
        }
        output
    }
}
