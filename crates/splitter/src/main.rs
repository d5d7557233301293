//! Signal splitter daemon
//!
//! Connects to a local SDR server, splits its 2 MS/s I/Q stream into a
//! 50 kHz detector stream and a 12 kHz display stream, and relays both plus
//! the control channel to a remote collector.
//!
//! # Usage Examples
//!
//! ```bash
//! signal_splitter --relay-host collector.local
//! signal_splitter --sdr-host 192.168.1.20 --relay-host 10.0.0.5 --relay-det 5410 -vv
//! ```

use clap::{ArgAction, Parser};
use iqsplit::config::{
    DEFAULT_RELAY_CONTROL_PORT, DEFAULT_RELAY_DET_PORT, DEFAULT_RELAY_DISP_PORT,
    DEFAULT_SDR_CONTROL_PORT, DEFAULT_SDR_HOST, DEFAULT_SDR_PORT,
};
use iqsplit::{Pipeline, SplitterConfig, shutdown};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Split SDR I/Q into detector and display streams and relay them", long_about = None)]
struct Args {
    /// SDR server host
    #[arg(long, default_value = DEFAULT_SDR_HOST)]
    sdr_host: String,

    /// SDR server I/Q port
    #[arg(long, default_value_t = DEFAULT_SDR_PORT)]
    sdr_port: u16,

    /// SDR server control port
    #[arg(long, default_value_t = DEFAULT_SDR_CONTROL_PORT)]
    sdr_control_port: u16,

    /// Collector host (required)
    #[arg(long)]
    relay_host: String,

    /// Collector port for the 50 kHz detector stream
    #[arg(long, default_value_t = DEFAULT_RELAY_DET_PORT)]
    relay_det: u16,

    /// Collector port for the 12 kHz display stream
    #[arg(long, default_value_t = DEFAULT_RELAY_DISP_PORT)]
    relay_disp: u16,

    /// Collector port for the control channel
    #[arg(long, default_value_t = DEFAULT_RELAY_CONTROL_PORT)]
    relay_control: u16,

    /// Do not relay the control channel
    #[arg(long, default_value_t = false)]
    no_control: bool,

    /// Verbosity level (-v=info, -vv=debug, -vvv=trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl From<Args> for SplitterConfig {
    fn from(args: Args) -> Self {
        SplitterConfig {
            sdr_host: args.sdr_host,
            sdr_port: args.sdr_port,
            sdr_control_port: args.sdr_control_port,
            relay_host: args.relay_host,
            relay_det_port: args.relay_det,
            relay_disp_port: args.relay_disp,
            relay_control_port: args.relay_control,
            control: !args.no_control,
        }
    }
}

#[tokio::main]
async fn main() -> iqsplit::Result<()> {
    let args = Args::parse();

    // Initialize tracing with verbosity level
    // 0 = WARN (quiet), 1 = INFO, 2 = DEBUG, 3+ = TRACE
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .try_init();

    let config = SplitterConfig::from(args);
    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("signal_splitter {}", env!("CARGO_PKG_VERSION"));
    eprintln!("{}", pipeline.config().summary());
    info!("starting pipeline");

    let token = CancellationToken::new();
    let signals = tokio::spawn(shutdown::cancel_on_signal(token.clone()));

    pipeline.run(token.clone()).await?;

    // The signal task only fails if handlers could not be installed.
    token.cancel();
    if let Ok(Err(e)) = signals.await {
        error!("signal handling failed: {}", e);
    }
    eprintln!("signal_splitter stopped");
    Ok(())
}
