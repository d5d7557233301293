//! Termination signal handling.
//!
//! The first SIGINT or SIGTERM cancels the pipeline's token. The pipeline
//! then gives its tasks a bounded grace period to finish an in-flight frame
//! and drop their sockets.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::Result;

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM. Returns the signal name.
pub async fn wait_for_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => {
                r?;
                Ok("SIGINT")
            }
            _ = term.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl-C")
    }
}

/// Cancel `token` on the first termination signal.
///
/// Returns early without cancelling if the token is cancelled by someone
/// else first.
pub async fn cancel_on_signal(token: CancellationToken) -> Result<()> {
    let signal = tokio::select! {
        _ = token.cancelled() => return Ok(()),
        signal = wait_for_signal() => signal?,
    };
    info!(signal, "shutdown requested");
    token.cancel();
    Ok(())
}
