//! Periodic expiry of detection sessions.
//!
//! Finished sessions are dropped once they outlive the store's TTL. Sessions
//! still processing past the processing limit are cancelled and dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lifeguard_pipeline::SessionStore;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(sessions: Arc<SessionStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        ttl_secs = sessions.config().ttl.as_secs(),
        "Session sweeper started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                let removed = sessions.sweep_expired(Utc::now()).await;
                if removed > 0 {
                    let remaining = sessions.len().await;
                    tracing::info!(removed, remaining, "Expired sessions removed");
                } else {
                    tracing::debug!("Session sweep: nothing expired");
                }
            }
        }
    }
}
