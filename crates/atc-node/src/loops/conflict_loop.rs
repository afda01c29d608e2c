//! Conflict detection loop.
//!
//! Fires the conflict pass on its cadence and surfaces the results in the
//! log. Subscribers receive the full list through the event channel.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use atc_core::{ConflictUrgency, TickOutcome, TimerKind};

use crate::state::NodeState;

pub async fn run_conflict_loop(
    state: Arc<NodeState>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_count = 0usize;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Conflict loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let conflicts = match state.tick(TimerKind::ConflictDetection) {
                    Ok(TickOutcome::Conflicts(conflicts)) => conflicts,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::error!("Conflict pass failed: {}", e);
                        continue;
                    }
                };

                if conflicts.len() != last_count {
                    tracing::warn!("Detected {} conflict(s)", conflicts.len());
                    last_count = conflicts.len();
                }
                for conflict in conflicts
                    .iter()
                    .filter(|c| c.urgency() == ConflictUrgency::Immediate)
                {
                    tracing::warn!("  [IMMEDIATE] {}", conflict);
                }
            }
        }
    }
}
