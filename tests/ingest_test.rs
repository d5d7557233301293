//! Ingest link against a loopback SDR server

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use approx::assert_abs_diff_eq;
use iqsplit::Sample;
use iqsplit::dsp::decimator::Decimator;
use iqsplit::dsp::divergence::{DETECTOR_DECIMATION, DivergenceStage, FILTER_CUTOFF_HZ, INPUT_SAMPLE_RATE};
use iqsplit::ingest::IngestLink;
use iqsplit::link::LinkStats;
use iqsplit::ring::SharedRing;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

mod helpers;
use helpers::*;

struct Harness {
    det: Arc<SharedRing>,
    disp: Arc<SharedRing>,
    samples_in: Arc<AtomicU64>,
    stats: Arc<LinkStats>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

fn start(port: u16) -> Harness {
    let det = Arc::new(SharedRing::new("det", 100_000).unwrap());
    let disp = Arc::new(SharedRing::new("disp", 20_000).unwrap());
    let samples_in = Arc::new(AtomicU64::new(0));
    let stats = Arc::new(LinkStats::new("sdr"));
    let shutdown = CancellationToken::new();

    let stage = DivergenceStage::new(det.clone(), disp.clone(), samples_in.clone());
    let link = IngestLink::new(format!("127.0.0.1:{port}"), stage, stats.clone());
    let task = tokio::spawn(link.run(Duration::from_millis(50), shutdown.clone()));

    Harness {
        det,
        disp,
        samples_in,
        stats,
        shutdown,
        task,
    }
}

#[tokio::test]
async fn test_reconnect_resets_decimation_and_filter() {
    let (listener, port) = listener().await;
    let h = start(port);

    // First session: 39 pairs and a stray half pair, then EOF.
    let mut sdr = accept(&listener).await;
    let mut bytes = generate_dc_signal_cs16(39, 16384, 16384);
    bytes.extend_from_slice(&[0x12, 0x34, 0x56]);
    sdr.write_all(&bytes).await.unwrap();
    drop(sdr);

    wait_until(|| h.stats.snapshot().failures >= 1).await;
    assert_eq!(h.samples_in.load(Ordering::Relaxed), 39);
    assert_eq!(h.stats.snapshot().discarded, 3);
    assert_eq!(h.det.occupancy(), 0);

    // Second session: without a reset, 39 + 41 inputs would give two outputs.
    let mut sdr = accept(&listener).await;
    sdr.write_all(&generate_dc_signal_cs16(41, 16384, 16384)).await.unwrap();
    wait_until(|| h.samples_in.load(Ordering::Relaxed) == 80).await;

    let out = h.det.pop_batch(usize::MAX);
    assert_eq!(out.len(), 1);
    assert_eq!(h.disp.occupancy(), 0);

    // The output equals the 40th output of a freshly built chain.
    let mut fresh = Decimator::new(DETECTOR_DECIMATION, FILTER_CUTOFF_HZ, INPUT_SAMPLE_RATE as f32);
    let expected = (0..DETECTOR_DECIMATION)
        .filter_map(|_| fresh.push(Sample::new(0.5, 0.5)))
        .last()
        .unwrap();
    assert_eq!(out[0].re.to_bits(), expected.re.to_bits());
    assert_eq!(out[0].im.to_bits(), expected.im.to_bits());

    h.shutdown.cancel();
    h.task.await.unwrap();
}

#[tokio::test]
async fn test_one_second_of_input() {
    let (listener, port) = listener().await;
    let h = start(port);

    let mut sdr = accept(&listener).await;
    let second = generate_dc_signal_cs16(INPUT_SAMPLE_RATE as usize, 16384, -16384);
    sdr.write_all(&second).await.unwrap();

    wait_until(|| h.samples_in.load(Ordering::Relaxed) == INPUT_SAMPLE_RATE as u64).await;
    assert_eq!(h.det.occupancy(), 50_000);
    assert_eq!(h.disp.occupancy(), 12_048);
    assert_eq!(h.stats.snapshot().bytes_in, 8_000_000);

    // DC passes the low-pass with unit gain once settled.
    let det = h.det.pop_batch(usize::MAX);
    let last = det[det.len() - 1];
    assert_abs_diff_eq!(last.re, 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(last.im, -0.5, epsilon = 1e-3);

    h.shutdown.cancel();
    h.task.await.unwrap();
}

#[tokio::test]
async fn test_stopband_tone_is_attenuated() {
    let (listener, port) = listener().await;
    let h = start(port);

    let mut sdr = accept(&listener).await;
    sdr.write_all(&generate_sine_wave_cs16(100_000.0, INPUT_SAMPLE_RATE, 400_000))
        .await
        .unwrap();
    wait_until(|| h.samples_in.load(Ordering::Relaxed) == 400_000).await;

    let det = h.det.pop_batch(usize::MAX);
    let settled = &det[100..];
    let rms = (settled.iter().map(|s| s.norm_sqr()).sum::<f32>() / settled.len() as f32).sqrt();
    assert!(rms < 0.02, "100 kHz tone leaked through with rms {rms}");

    h.shutdown.cancel();
    h.task.await.unwrap();
}
