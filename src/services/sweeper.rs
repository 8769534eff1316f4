//! Background session sweeper.
//!
//! Runs [`SessionService::sweep_expired`] on a fixed interval, independent of
//! request traffic, until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::services::session::SessionService;

/// Spawn the sweeper loop.
///
/// The first sweep runs immediately. A failed sweep is logged and retried on
/// the next tick.
pub fn spawn_session_sweeper(
    sessions: Arc<SessionService>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run(sessions, every, cancel))
}

async fn run(sessions: Arc<SessionService>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Session sweeper started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match sessions.sweep_expired().await {
                    Ok(0) => tracing::debug!("Session sweep: nothing to deactivate"),
                    Ok(deactivated) => match sessions.active_count().await {
                        Ok(active) => tracing::info!(
                            deactivated,
                            active,
                            "Session sweep: deactivated stale sessions"
                        ),
                        Err(e) => tracing::info!(
                            deactivated,
                            error = %e,
                            "Session sweep: deactivated stale sessions; active count unavailable"
                        ),
                    },
                    Err(e) => tracing::error!(error = %e, "Session sweep failed"),
                }
            }
        }
    }
}
