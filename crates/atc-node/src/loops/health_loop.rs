//! Periodic health summary.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use atc_core::{TickOutcome, TimerKind};

use crate::state::NodeState;

pub async fn run_health_loop(
    state: Arc<NodeState>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Health loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let (conflicts, balance) = match state.tick(TimerKind::HealthCheck) {
                    Ok(TickOutcome::Health { conflicts, balance }) => (conflicts, balance),
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::error!("Health pass failed: {}", e);
                        continue;
                    }
                };

                tracing::info!(
                    flights = conflicts.total_flights,
                    conflicts = conflicts.total_conflicts,
                    balanced = balance.is_system_balanced(),
                    "{}",
                    balance.summary()
                );
                for sector in balance.overloaded_sectors() {
                    tracing::warn!("Overloaded {}", sector);
                }
            }
        }
    }
}
