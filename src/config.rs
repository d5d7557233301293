//! Runtime configuration.
//!
//! Only endpoints are configurable. Ratios, ring capacities, batch size and
//! the retry interval are fixed.

use std::fmt::Write as _;
use std::time::Duration;

use crate::dsp::divergence::{DETECTOR_DECIMATION, DISPLAY_DECIMATION, INPUT_SAMPLE_RATE};
use crate::error::{Error, Result};
use crate::link::RETRY_INTERVAL;
use crate::protocol::MAX_FRAME_SAMPLES;
use crate::relay::{DETECTOR_SAMPLE_RATE, DISPLAY_SAMPLE_RATE};

pub const DEFAULT_SDR_HOST: &str = "localhost";
pub const DEFAULT_SDR_PORT: u16 = 4536;
pub const DEFAULT_SDR_CONTROL_PORT: u16 = 4535;
pub const DEFAULT_RELAY_DET_PORT: u16 = 4410;
pub const DEFAULT_RELAY_DISP_PORT: u16 = 4411;
pub const DEFAULT_RELAY_CONTROL_PORT: u16 = 4409;

/// 50,000 samples/s × 30 s
pub const DETECTOR_RING_CAPACITY: usize = 1_500_000;
/// 12,000 samples/s × 30 s
pub const DISPLAY_RING_CAPACITY: usize = 360_000;

/// Endpoints of every link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    pub sdr_host: String,
    pub sdr_port: u16,
    pub sdr_control_port: u16,
    pub relay_host: String,
    pub relay_det_port: u16,
    pub relay_disp_port: u16,
    pub relay_control_port: u16,
    /// Run the control relay
    pub control: bool,
}

impl SplitterConfig {
    /// Default ports for everything; only the collector host is required.
    pub fn new(relay_host: impl Into<String>) -> Self {
        Self {
            sdr_host: DEFAULT_SDR_HOST.to_string(),
            sdr_port: DEFAULT_SDR_PORT,
            sdr_control_port: DEFAULT_SDR_CONTROL_PORT,
            relay_host: relay_host.into(),
            relay_det_port: DEFAULT_RELAY_DET_PORT,
            relay_disp_port: DEFAULT_RELAY_DISP_PORT,
            relay_control_port: DEFAULT_RELAY_CONTROL_PORT,
            control: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sdr_host.trim().is_empty() {
            return Err(Error::config("SDR host must not be empty"));
        }
        if self.relay_host.trim().is_empty() {
            return Err(Error::config("relay host is required"));
        }
        let ports = [
            ("sdr-port", self.sdr_port),
            ("sdr-control-port", self.sdr_control_port),
            ("relay-det", self.relay_det_port),
            ("relay-disp", self.relay_disp_port),
            ("relay-control", self.relay_control_port),
        ];
        if let Some((name, _)) = ports.iter().find(|(_, p)| *p == 0) {
            return Err(Error::config(format!("{name} must be a non-zero port")));
        }
        Ok(())
    }

    pub fn sdr_addr(&self) -> String {
        endpoint(&self.sdr_host, self.sdr_port)
    }

    pub fn sdr_control_addr(&self) -> String {
        endpoint(&self.sdr_host, self.sdr_control_port)
    }

    pub fn relay_det_addr(&self) -> String {
        endpoint(&self.relay_host, self.relay_det_port)
    }

    pub fn relay_disp_addr(&self) -> String {
        endpoint(&self.relay_host, self.relay_disp_port)
    }

    pub fn relay_control_addr(&self) -> String {
        endpoint(&self.relay_host, self.relay_control_port)
    }

    /// Multi-line description printed at startup.
    pub fn summary(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "SDR server:   {} (I/Q), {} (control)", self.sdr_addr(), self.sdr_control_addr());
        let _ = writeln!(
            s,
            "Detector:     {} Hz / {} = {} Hz -> {}",
            INPUT_SAMPLE_RATE,
            DETECTOR_DECIMATION,
            DETECTOR_SAMPLE_RATE,
            self.relay_det_addr()
        );
        let _ = writeln!(
            s,
            "Display:      {} Hz / {} = {} Hz -> {}",
            INPUT_SAMPLE_RATE,
            DISPLAY_DECIMATION,
            DISPLAY_SAMPLE_RATE,
            self.relay_disp_addr()
        );
        if self.control {
            let _ = writeln!(s, "Control:      {} <-> {}", self.sdr_control_addr(), self.relay_control_addr());
        } else {
            let _ = writeln!(s, "Control:      disabled");
        }
        let _ = write!(
            s,
            "Buffers:      {} / {} samples (30 s), frames of up to {} samples, retry every {:?}",
            DETECTOR_RING_CAPACITY, DISPLAY_RING_CAPACITY, MAX_FRAME_SAMPLES, RETRY_INTERVAL
        );
        s
    }
}

fn endpoint(host: &str, port: u16) -> String {
    // Bare IPv6 literals need brackets to carry a port.
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Time constants of the pipeline.
///
/// The binary always uses [`Timing::default`]; tests shorten the intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Delay between a link failure and the next attempt
    pub retry_interval: Duration,
    /// Period of the status report
    pub status_interval: Duration,
    /// How long tasks get to finish after shutdown is requested
    pub shutdown_grace: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            retry_interval: RETRY_INTERVAL,
            status_interval: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SplitterConfig::new("10.0.0.5");
        assert!(config.validate().is_ok());
        assert_eq!(config.sdr_addr(), "localhost:4536");
        assert_eq!(config.sdr_control_addr(), "localhost:4535");
        assert_eq!(config.relay_det_addr(), "10.0.0.5:4410");
        assert_eq!(config.relay_disp_addr(), "10.0.0.5:4411");
        assert_eq!(config.relay_control_addr(), "10.0.0.5:4409");
        assert_eq!(Timing::default().retry_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_relay_host() {
        let err = SplitterConfig::new("  ").validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("relay host"));
    }

    #[test]
    fn test_zero_port() {
        let mut config = SplitterConfig::new("collector");
        config.relay_disp_port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("relay-disp"));
    }

    #[test]
    fn test_ipv6_endpoint() {
        assert_eq!(endpoint("::1", 4410), "[::1]:4410");
        assert_eq!(endpoint("[::1]", 4410), "[::1]:4410");
    }

    #[test]
    fn test_summary_mentions_rates() {
        let mut config = SplitterConfig::new("collector");
        config.control = false;
        let summary = config.summary();
        assert!(summary.contains("50000 Hz -> collector:4410"));
        assert!(summary.contains("12000 Hz -> collector:4411"));
        assert!(summary.contains("Control:      disabled"));
    }
}
