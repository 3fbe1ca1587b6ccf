//! OS signal handling.
//!
//! # Responsibilities
//! - Ctrl-C (and SIGTERM on Unix) trigger graceful shutdown
//! - SIGHUP triggers an on-demand refresh
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP never shuts the locator down

use crate::lifecycle::shutdown::Shutdown;
use crate::refresh::RefreshHandle;

/// Translate OS signals until shutdown is requested.
pub async fn handle_signals(refresh: RefreshHandle, shutdown: Shutdown) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut stop = shutdown.subscribe();

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    tracing::info!("Received Ctrl-C, shutting down");
                    break;
                }
                _ = terminate.recv() => {
                    tracing::info!("Received SIGTERM, shutting down");
                    break;
                }
                _ = hangup.recv() => {
                    tracing::info!("Received SIGHUP, triggering refresh");
                    refresh.trigger();
                }
                _ = stop.recv() => return Ok(()),
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = &refresh;
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl-C, shutting down");
    }

    shutdown.trigger();
    Ok(())
}
