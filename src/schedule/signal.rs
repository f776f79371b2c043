//! OS shutdown signals -> [`StopHandle`].

use std::thread;

use crate::error::AppError;
use crate::schedule::StopHandle;

/// Spawn a background thread that calls `stop.stop()` on SIGINT/SIGTERM
/// (Ctrl-C elsewhere). The scheduler finishes any in-flight cycle first.
pub fn stop_on_shutdown_signal(stop: StopHandle) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::io("failed to start signal listener", e))?;

    thread::Builder::new()
        .name("shutdown-signals".to_string())
        .spawn(move || match runtime.block_on(wait_for_shutdown_signal()) {
            Ok(signal) => {
                tracing::info!("received {signal}, stopping after the current cycle");
                stop.stop();
            }
            Err(e) => tracing::warn!("cannot listen for shutdown signals: {e}"),
        })
        .map_err(|e| AppError::io("failed to spawn signal listener", e))?;

    Ok(())
}

async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => Ok("SIGTERM"),
            _ = sigint.recv() => Ok("SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("CTRL+C")
    }
}
