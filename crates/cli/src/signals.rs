//! Cancels in-flight lookups on SIGTERM, SIGINT or Ctrl+C.

use identmatch_core::CancelHandle;
use tracing::{info, warn};

/// Wait for a termination signal in the background and fire `handle` when
/// one arrives.
pub fn cancel_on_shutdown(handle: CancelHandle) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (Ctrl+C), canceling lookup");
            }
            _ = terminate => {
                info!("received SIGTERM, canceling lookup");
            }
        }

        handle.cancel();
    });
}
