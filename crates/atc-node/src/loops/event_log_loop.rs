//! Logs every engine event published on the node's channel.

use tokio::sync::broadcast::{self, error::RecvError};

use atc_core::EngineEvent;

use crate::state::EventEnvelope;

pub async fn run_event_log_loop(
    mut events: broadcast::Receiver<EventEnvelope>,
    mut shutdown: broadcast::Receiver<()>,
    json: bool,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Event log loop shutting down");
                break;
            }
            received = events.recv() => match received {
                Ok(envelope) => log_event(&envelope, json),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log lagged, skipped {} event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

fn log_event(envelope: &EventEnvelope, json: bool) {
    if json {
        match serde_json::to_string(envelope) {
            Ok(line) => tracing::debug!(target: "atc_node::events", "{}", line),
            Err(e) => tracing::warn!("Failed to encode event {}: {}", envelope.seq, e),
        }
        return;
    }

    match &envelope.event {
        EngineEvent::Conflicts { conflicts, .. } if conflicts.is_empty() => {}
        EngineEvent::Conflicts { conflicts, .. } => {
            for conflict in conflicts {
                tracing::debug!(seq = envelope.seq, "{}", conflict.description());
            }
        }
        EngineEvent::Assignment(assignment) => {
            tracing::debug!(seq = envelope.seq, "{}", assignment.rationale());
        }
        EngineEvent::FlightRemoved { flight_id, sector, .. } => {
            tracing::debug!(seq = envelope.seq, ?sector, "Flight {} removed", flight_id);
        }
        EngineEvent::ConflictStats { stats, .. } => {
            tracing::debug!(seq = envelope.seq, "{}", stats.summary());
        }
        EngineEvent::BalanceStats { stats, .. } => {
            tracing::debug!(
                seq = envelope.seq,
                distribution = %stats.workload_distribution(),
                "{}",
                stats.summary()
            );
        }
    }
}
