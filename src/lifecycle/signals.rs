//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGTERM/SIGINT handlers and translate them into `Shutdown::trigger`
//! - SIGHUP is handled separately by `config::watcher` as a reload trigger,
//!   not plumbed through here
//!
//! # Design Decisions
//! - Uses `tokio::signal` (async-safe, no signal-handler-context restrictions)
//! - A second Ctrl-C after shutdown has already started is logged but not
//!   specially handled; the drain deadline bounds worst-case exit time anyway

use super::shutdown::Shutdown;

/// Wait for SIGTERM or SIGINT and trigger shutdown. Runs until the process
/// is asked to exit; intended to be spawned as its own task.
pub async fn wait_for_shutdown_signal(shutdown: Shutdown) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            _ = sigint.recv() => tracing::info!("received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c");
    }

    shutdown.trigger();
}
