//! Sector rebalancing loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use atc_core::{TickOutcome, TimerKind};

use crate::state::NodeState;

pub async fn run_rebalance_loop(
    state: Arc<NodeState>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Rebalance loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                match state.tick(TimerKind::Rebalancing) {
                    Ok(TickOutcome::Rebalanced(moves)) if !moves.is_empty() => {
                        for assignment in &moves {
                            tracing::info!("{}", assignment.description());
                        }
                    }
                    Ok(_) => {}
                    // Registry and balancer disagree
                    Err(e) => tracing::error!("Rebalancing pass failed: {}", e),
                }
            }
        }
    }
}
