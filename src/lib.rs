#![doc = include_str!("../readme.md")]

use num_complex::Complex;

pub mod config;
pub mod control;
pub mod dsp;
pub mod error;
pub mod ingest;
pub mod iqread;
pub mod link;
pub mod pipeline;
pub mod protocol;
pub mod relay;
pub mod ring;
pub mod shutdown;
pub mod status;

pub use config::{SplitterConfig, Timing};
pub use error::{Error, Result};
pub use pipeline::Pipeline;

/// One normalized I/Q sample (I = `re`, Q = `im`).
pub type Sample = Complex<f32>;
