//! Shared node state.
//!
//! The engine lives behind one `Mutex`: every mutation and every read goes
//! through the same lock, so passes never interleave with upserts.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;

use atc_core::{
    AtcEngine, EngineConfig, EngineEvent, EventSink, Flight, Sector, SectorAssignment,
    TickOutcome, TimerKind,
};

use crate::error::{NodeError, NodeResult};

/// An engine event stamped for the outside world.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub seq: u64,
    /// Wall-clock metadata only; the engine never reads it
    pub emitted_at: DateTime<Utc>,
    pub event: EngineEvent,
}

/// Forwards engine events onto a broadcast channel.
pub struct BroadcastSink {
    tx: broadcast::Sender<EventEnvelope>,
    next_seq: u64,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<EventEnvelope>) -> Self {
        Self {
            tx,
            next_seq: 0,
        }
    }
}

impl EventSink for BroadcastSink {
    fn publish(&mut self, event: EngineEvent) {
        let envelope = EventEnvelope {
            seq: self.next_seq,
            emitted_at: Utc::now(),
            event,
        };
        self.next_seq += 1;
        // No subscribers is not an error
        let _ = self.tx.send(envelope);
    }
}

pub struct NodeState {
    engine: Mutex<AtcEngine<BroadcastSink>>,
    events: broadcast::Sender<EventEnvelope>,
    started: Instant,
}

impl NodeState {
    pub fn new(
        config: EngineConfig,
        sectors: Vec<Sector>,
        event_buffer: usize,
    ) -> NodeResult<Self> {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        let engine = AtcEngine::new(config, sectors, BroadcastSink::new(events.clone()))?;
        Ok(Self {
            engine: Mutex::new(engine),
            events,
            started: Instant::now(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    /// Nanoseconds since the node started; the logical time fed to ticks.
    pub fn logical_now(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    pub fn with_engine<R>(
        &self,
        f: impl FnOnce(&mut AtcEngine<BroadcastSink>) -> R,
    ) -> NodeResult<R> {
        let mut engine = self.engine.lock().map_err(|_| NodeError::Poisoned)?;
        Ok(f(&mut engine))
    }

    pub fn tick(&self, timer: TimerKind) -> NodeResult<TickOutcome> {
        let now = self.logical_now();
        let outcome = self.with_engine(|engine| engine.tick(now, timer.correlation_id()))??;
        Ok(outcome)
    }

    pub fn upsert_flight(&self, flight: Flight) -> NodeResult<SectorAssignment> {
        Ok(self.with_engine(|engine| engine.upsert_flight(flight))??)
    }

    pub fn remove_flight(&self, flight_id: &str) -> NodeResult<bool> {
        self.with_engine(|engine| engine.remove_flight(flight_id))
    }

    /// Copies of every registered flight, in id order.
    pub fn flights(&self) -> NodeResult<Vec<Flight>> {
        self.with_engine(|engine| engine.registry().flights().cloned().collect())
    }

    pub fn snapshot(&self) -> NodeResult<Vec<u8>> {
        Ok(self.with_engine(|engine| engine.snapshot())??)
    }
}
