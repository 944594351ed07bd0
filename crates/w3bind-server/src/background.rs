//! Background tasks for the w3bind server.

use crate::AppState;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Starts the session sweep task.
///
/// Runs indefinitely: every `interval_seconds` it expires overdue pending
/// sessions and deletes terminal ones older than `retention`.
pub async fn start_sweep_task(state: Arc<AppState>, interval_seconds: u64, retention: Duration) {
    if interval_seconds == 0 {
        tracing::warn!("session sweep disabled (interval=0)");
        return;
    }
    let interval = Duration::from_secs(interval_seconds);

    tracing::info!(
        interval_seconds,
        retention_seconds = retention.as_secs(),
        "starting session sweep task"
    );

    loop {
        sleep(interval).await;

        match state.sessions.sweep(retention).await {
            Ok(report) => {
                if report.expired > 0 || report.pruned > 0 {
                    tracing::info!(
                        expired = report.expired,
                        pruned = report.pruned,
                        "swept signing sessions"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to sweep signing sessions");
            }
        }
    }
}
