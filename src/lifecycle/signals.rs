//! OS signal handling for the standalone binaries.

/// Wait for Ctrl+C. Installation failure is logged and treated as a signal.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
    }
    tracing::info!("Interrupt received, shutting down");
}
