//! Digital filter implementations.
//!
//! - [`LowPassBiquad`]: second-order IIR low-pass (Butterworth by default)
//!
//! The biquad runs directly on complex samples. Its coefficients are real, so
//! I and Q are filtered independently with the same response.
//!
//! # Example
//!
//! ```
//! use iqsplit::dsp::filters::LowPassBiquad;
//! use num_complex::Complex;
//!
//! // 5 kHz cutoff at a 2 MHz input rate
//! let mut filter = LowPassBiquad::new(5_000.0, 2_000_000.0);
//!
//! let y = filter.process_sample(Complex::new(1.0, 0.0));
//! assert!(y.re > 0.0 && y.re < 1.0);
//! ```

use std::f32::consts::{FRAC_1_SQRT_2, PI};

use num_complex::Complex;

/// Delay line of a direct-form I biquad.
///
/// Exposed so that callers can check a filter was fully reset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    pub x1: Complex<f32>,
    pub x2: Complex<f32>,
    pub y1: Complex<f32>,
    pub y2: Complex<f32>,
}

impl BiquadState {
    /// Bitwise equality, so that `-0.0` and `0.0` are told apart.
    pub fn bits_eq(&self, other: &Self) -> bool {
        let bits = |s: &Self| {
            [s.x1, s.x2, s.y1, s.y2].map(|c| (c.re.to_bits(), c.im.to_bits()))
        };
        bits(self) == bits(other)
    }
}

/// Second-order low-pass IIR filter (RBJ cookbook design).
///
/// # Design Method
///
/// ```text
/// w0    = 2π fc / fs
/// alpha = sin(w0) / (2 Q)
/// b0 = b2 = (1 - cos w0) / 2 / a0,   b1 = (1 - cos w0) / a0
/// a1 = -2 cos w0 / a0,               a2 = (1 - alpha) / a0
/// ```
///
/// With `Q = 1/√2` the response is maximally flat (Butterworth) and the
/// -3 dB point sits at `fc`.
#[derive(Debug, Clone)]
pub struct LowPassBiquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    state: BiquadState,
}

impl LowPassBiquad {
    /// Create a Butterworth low-pass filter.
    ///
    /// # Arguments
    ///
    /// * `cutoff_freq` - -3 dB frequency in Hz
    /// * `sample_rate` - Input sample rate in Hz
    ///
    /// # Panics
    ///
    /// Panics if `sample_rate` is not positive or `cutoff_freq` is not in
    /// `(0, sample_rate / 2)`.
    pub fn new(cutoff_freq: f32, sample_rate: f32) -> Self {
        Self::with_q(cutoff_freq, sample_rate, FRAC_1_SQRT_2)
    }

    /// Create a low-pass filter with an explicit quality factor.
    pub fn with_q(cutoff_freq: f32, sample_rate: f32, q: f32) -> Self {
        assert!(sample_rate > 0.0, "Sample rate must be greater than 0");
        assert!(
            cutoff_freq > 0.0 && cutoff_freq < sample_rate / 2.0,
            "Cutoff must be in range (0, sample_rate / 2)"
        );
        assert!(q > 0.0, "Q must be greater than 0");

        let w0 = 2.0 * PI * cutoff_freq / sample_rate;
        let alpha = w0.sin() / (2.0 * q);
        let cos_w0 = w0.cos();

        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_w0) / 2.0 / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: (1.0 - cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            state: BiquadState::default(),
        }
    }

    /// Filter one sample.
    #[inline]
    pub fn process_sample(&mut self, x: Complex<f32>) -> Complex<f32> {
        let s = &mut self.state;
        let y = x * self.b0 + s.x1 * self.b1 + s.x2 * self.b2 - s.y1 * self.a1 - s.y2 * self.a2;
        s.x2 = s.x1;
        s.x1 = x;
        s.y2 = s.y1;
        s.y1 = y;
        y
    }

    /// Clear the delay line.
    pub fn reset(&mut self) {
        self.state = BiquadState::default();
    }

    pub fn state(&self) -> &BiquadState {
        &self.state
    }

    /// Magnitude response at `freq` Hz for a filter running at `sample_rate`.
    pub fn gain_at(&self, freq: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = z1 * self.b1 + z2 * self.b2 + self.b0;
        let den = z1 * self.a1 + z2 * self.a2 + 1.0;
        (num / den).norm()
    }
}
