//! Whole pipeline: SDR server and collector on loopback

use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use iqsplit::link::LinkStatus;
use iqsplit::{Pipeline, Sample, SplitterConfig, Timing};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

mod helpers;
use helpers::*;

fn timing() -> Timing {
    Timing {
        retry_interval: Duration::from_millis(50),
        status_interval: Duration::from_secs(3600),
        shutdown_grace: Duration::from_millis(500),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_rates_and_control() {
    let (sdr_l, sdr_port) = listener().await;
    let (sdr_ctrl_l, sdr_ctrl_port) = listener().await;
    let (det_l, det_port) = listener().await;
    let (disp_l, disp_port) = listener().await;
    let (ctrl_l, ctrl_port) = listener().await;

    let config = SplitterConfig {
        sdr_host: "127.0.0.1".into(),
        sdr_port,
        sdr_control_port: sdr_ctrl_port,
        relay_host: "127.0.0.1".into(),
        relay_det_port: det_port,
        relay_disp_port: disp_port,
        relay_control_port: ctrl_port,
        control: true,
    };
    let pipeline = Pipeline::new(config).unwrap().with_timing(timing());
    let shared = pipeline.shared();
    let shutdown = CancellationToken::new();
    let run = tokio::spawn(pipeline.run(shutdown.clone()));

    let mut det = accept(&det_l).await;
    let mut disp = accept(&disp_l).await;
    assert_eq!(read_stream_header(&mut det).await.sample_rate, 50_000);
    assert_eq!(read_stream_header(&mut disp).await.sample_rate, 12_000);

    let mut sdr_ctrl = accept(&sdr_ctrl_l).await;
    let mut ctrl = accept(&ctrl_l).await;

    // One second of input.
    let mut sdr = accept(&sdr_l).await;
    let feeder = tokio::spawn(async move {
        sdr.write_all(&generate_dc_signal_cs16(2_000_000, 8192, 8192))
            .await
            .unwrap();
        sdr
    });

    let det_frames = read_samples(&mut det, 50_000).await;
    let disp_frames = read_samples(&mut disp, 12_048).await;
    let _sdr = feeder.await.unwrap();

    for frames in [&det_frames, &disp_frames] {
        for (i, (header, samples)) in frames.iter().enumerate() {
            assert_eq!(header.sequence as usize, i);
            assert!(!samples.is_empty() && samples.len() <= 2048);
        }
    }
    let last: Sample = *det_frames.last().unwrap().1.last().unwrap();
    assert_abs_diff_eq!(last.re, 0.25, epsilon = 1e-3);
    assert_abs_diff_eq!(last.im, 0.25, epsilon = 1e-3);

    assert_eq!(shared.samples_in(), 2_000_000);
    wait_until(|| {
        shared.det.snapshot().samples == 50_000 && shared.disp.snapshot().samples == 12_048
    })
    .await;
    assert_eq!(shared.sdr.status(), LinkStatus::Connected);

    // Control passthrough runs alongside.
    ctrl.write_all(b"PING\n").await.unwrap();
    let mut buf = [0u8; 5];
    sdr_ctrl.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"PING\n");

    shutdown.cancel();
    let started = Instant::now();
    tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    // Sockets are closed on the way out.
    let mut rest = Vec::new();
    let n = det.read_to_end(&mut rest).await.unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_shutdown_while_every_link_is_down() {
    let port = {
        let (l, port) = listener().await;
        drop(l);
        port
    };
    let config = SplitterConfig {
        sdr_host: "127.0.0.1".into(),
        sdr_port: port,
        sdr_control_port: port,
        relay_host: "127.0.0.1".into(),
        relay_det_port: port,
        relay_disp_port: port,
        relay_control_port: port,
        control: true,
    };
    let pipeline = Pipeline::with_capacities(config, 1000, 1000)
        .unwrap()
        .with_timing(Timing {
            retry_interval: Duration::from_secs(5),
            ..timing()
        });
    let shared = pipeline.shared();
    let shutdown = CancellationToken::new();
    let run = tokio::spawn(pipeline.run(shutdown.clone()));

    wait_until(|| shared.sdr.snapshot().failures >= 1 && shared.det.snapshot().failures >= 1).await;
    shutdown.cancel();

    // Parked in the 5 s retry wait, yet stops at once.
    let started = Instant::now();
    tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(shared.det.status(), LinkStatus::Disconnected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_is_bounded_by_grace_period() {
    let (det_l, det_port) = listener().await;
    let down = {
        let (l, port) = listener().await;
        drop(l);
        port
    };
    let config = SplitterConfig {
        sdr_host: "127.0.0.1".into(),
        sdr_port: down,
        sdr_control_port: down,
        relay_host: "127.0.0.1".into(),
        relay_det_port: det_port,
        relay_disp_port: down,
        relay_control_port: down,
        control: false,
    };
    let pipeline = Pipeline::new(config).unwrap().with_timing(timing());
    let shared = pipeline.shared();

    // A full detector ring and a collector that never reads: the sender
    // ends up blocked in a write.
    shared
        .detector_ring
        .push_slice(&vec![Sample::new(0.1, 0.1); shared.detector_ring.capacity()]);

    let shutdown = CancellationToken::new();
    let run = tokio::spawn(pipeline.run(shutdown.clone()));
    let _stalled = accept(&det_l).await;
    wait_until(|| shared.det.snapshot().frames > 0).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    shutdown.cancel();
    let started = Instant::now();
    tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_millis(500) + Duration::from_secs(1));
}
