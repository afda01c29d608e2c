//! Simulated traffic loop.
//!
//! Keeps a fixed number of synthetic flights airborne: each step advances
//! every flight along its velocity and re-upserts it, and flights that leave
//! the airspace are removed and replaced.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::NodeResult;
use crate::sim::TrafficGenerator;
use crate::state::NodeState;

pub async fn run_traffic_loop(
    state: Arc<NodeState>,
    mut generator: TrafficGenerator,
    target: usize,
    step: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(step);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let step_ms = i64::try_from(step.as_millis()).unwrap_or(i64::MAX);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Traffic loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = step_traffic(&state, &mut generator, target, step_ms) {
                    tracing::error!("Traffic step failed: {}", e);
                }
            }
        }
    }
}

/// One simulation step of `step_ms` milliseconds. Returns how many flights
/// were replaced.
pub fn step_traffic(
    state: &NodeState,
    generator: &mut TrafficGenerator,
    target: usize,
    step_ms: i64,
) -> NodeResult<usize> {
    let mut airborne = 0usize;
    let mut departed = 0usize;

    for mut flight in state.flights()? {
        flight.state_mut().advance_millis(step_ms);
        if generator.contains(&flight) {
            state.upsert_flight(flight)?;
            airborne += 1;
        } else {
            state.remove_flight(flight.flight_id())?;
            departed += 1;
        }
    }

    while airborne < target {
        let flight = generator.spawn()?;
        tracing::debug!("Spawned {}", flight);
        state.upsert_flight(flight)?;
        airborne += 1;
    }

    if departed > 0 {
        tracing::debug!(departed, airborne, "Flights left the airspace");
    }
    Ok(departed)
}
