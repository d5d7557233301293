//! Test helper utilities: synthetic Cs16 signals and a minimal collector
#![allow(dead_code)]

use std::f32::consts::PI;
use std::time::Duration;

use iqsplit::Sample;
use iqsplit::protocol::{FrameHeader, HEADER_LEN, StreamHeader, decode_payload};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

/// Generate a complex sine wave at a specific frequency
///
/// # Arguments
/// * `frequency` - Frequency in Hz
/// * `sample_rate` - Sample rate in Hz
/// * `num_samples` - Number of samples to generate
///
/// # Returns
/// Vector of complex samples as interleaved I/Q bytes (format: Cs16, little-endian)
pub fn generate_sine_wave_cs16(frequency: f32, sample_rate: u32, num_samples: usize) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(num_samples * 4);
    let angular_freq = 2.0 * PI * frequency / sample_rate as f32;

    for n in 0..num_samples {
        let phase = angular_freq * n as f32;
        let i = phase.cos();
        let q = phase.sin();

        // Convert from [-1, 1] to [-32768, 32767] for Cs16 format
        let i_sample = (i * 32767.0) as i16;
        let q_sample = (q * 32767.0) as i16;

        buffer.extend_from_slice(&i_sample.to_le_bytes());
        buffer.extend_from_slice(&q_sample.to_le_bytes());
    }

    buffer
}

/// Generate a DC signal (constant raw I/Q values, Cs16 little-endian)
pub fn generate_dc_signal_cs16(num_samples: usize, i_value: i16, q_value: i16) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(num_samples * 4);
    for _ in 0..num_samples {
        buffer.extend_from_slice(&i_value.to_le_bytes());
        buffer.extend_from_slice(&q_value.to_le_bytes());
    }
    buffer
}

/// Samples whose value encodes their index, for ordering checks.
pub fn indexed_samples(start: usize, count: usize) -> Vec<Sample> {
    (start..start + count)
        .map(|i| Sample::new(i as f32, -(i as f32)))
        .collect()
}

/// Bind an ephemeral loopback port.
pub async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Accept one connection, failing the test after `TIMEOUT`.
pub async fn accept(listener: &TcpListener) -> TcpStream {
    tokio::time::timeout(TIMEOUT, listener.accept())
        .await
        .expect("no connection within timeout")
        .unwrap()
        .0
}

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub async fn read_stream_header(stream: &mut TcpStream) -> StreamHeader {
    let mut buf = [0u8; HEADER_LEN];
    stream.read_exact(&mut buf).await.unwrap();
    StreamHeader::decode(&buf).unwrap()
}

pub async fn read_frame(stream: &mut TcpStream) -> (FrameHeader, Vec<Sample>) {
    let mut buf = [0u8; HEADER_LEN];
    stream.read_exact(&mut buf).await.unwrap();
    let header = FrameHeader::decode(&buf).unwrap();
    let mut payload = vec![0u8; header.payload_len()];
    stream.read_exact(&mut payload).await.unwrap();
    (header, decode_payload(&payload).unwrap())
}

/// Read frames until `total` samples have arrived. Returns every frame.
pub async fn read_samples(stream: &mut TcpStream, total: usize) -> Vec<(FrameHeader, Vec<Sample>)> {
    tokio::time::timeout(TIMEOUT, async {
        let mut frames = Vec::new();
        let mut received = 0;
        while received < total {
            let frame = read_frame(stream).await;
            received += frame.1.len();
            frames.push(frame);
        }
        assert_eq!(received, total, "more samples than expected");
        frames
    })
    .await
    .expect("samples did not arrive within timeout")
}

/// Poll `cond` until it holds, failing the test after `TIMEOUT`.
pub async fn wait_until<F: Fn() -> bool>(cond: F) {
    tokio::time::timeout(TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within timeout");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sine_wave_cs16_length() {
        let samples = generate_sine_wave_cs16(1000.0, 2_000_000, 100);
        assert_eq!(samples.len(), 400); // 100 samples * 4 bytes per sample
    }

    #[test]
    fn test_generate_dc_signal_cs16() {
        let samples = generate_dc_signal_cs16(3, 16384, -1);
        assert_eq!(samples, vec![0x00, 0x40, 0xFF, 0xFF].repeat(3));
    }
}
