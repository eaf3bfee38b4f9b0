use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::services::finalize::{self, FinalizeReason};

/// Worker entrypoint. The API discovers expiry lazily on its own; this loop
/// only bounds how stale an abandoned session can stay before its grade
/// exists for analytics.
pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep = tokio::spawn(sweep_loop(state.clone(), shutdown_rx));

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to sweeper");
    }

    if let Err(err) = sweep.await {
        tracing::error!(error = %err, "Sweeper task join failed");
    }

    Ok(())
}

async fn sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(state.settings().exam().sweeper_interval_seconds));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                match sweep_once(&state).await {
                    Ok(0) => {}
                    Ok(finalized) => tracing::info!(finalized, "sweeper finalized expired sessions"),
                    Err(err) => tracing::error!(error = %err, "sweeper pass failed"),
                }
            }
        }
    }
}

/// One batch of overdue sessions. Finalizing one at a time keeps each failure
/// isolated; the finalizer is idempotent, so racing the lazy API path is fine.
pub(crate) async fn sweep_once(state: &AppState) -> Result<usize> {
    let now = primitive_now_utc();
    let batch = state.settings().exam().sweeper_batch_size as i64;

    let expired =
        crate::repositories::sessions::list_expired_active(state.db(), now, batch).await?;

    let mut finalized = 0;
    for session_id in expired {
        match finalize::finalize_session(state.db(), &session_id, FinalizeReason::TimerExpired)
            .await
        {
            Ok(_) => finalized += 1,
            Err(err) => {
                tracing::error!(error = %err, session_id, "Failed to finalize expired session");
            }
        }
    }

    Ok(finalized)
}
