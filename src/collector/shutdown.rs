use tracing::warn;

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => warn!("Terminating on SIGINT"),
                    _ = sigterm.recv() => warn!("Terminating on SIGTERM"),
                }
                return;
            }
            Err(e) => warn!(error = ?e, "Unable to watch SIGTERM; only Ctrl-C will stop the collector"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("Terminating on SIGINT"),
        Err(e) => {
            warn!(error = ?e, "Unable to watch Ctrl-C; collector will run until killed");
            std::future::pending::<()>().await;
        }
    }
}
