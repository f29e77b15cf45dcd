//! # OS signal handling.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives a termination
//! signal. The supervisor turns that into a cancellation of its runtime token; no
//! other component installs signal handlers.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT`. **Other platforms:** Ctrl-C.

/// Waits for a termination signal.
///
/// Returns `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => tracing::info!(signal = "SIGINT", "received"),
        _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "received"),
        _ = sigquit.recv() => tracing::info!(signal = "SIGQUIT", "received"),
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Err` if signal registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "received");
    Ok(())
}
