//! Engine facade.
//!
//! `AtcEngine` owns the flight registry, the sector balancer and a logical
//! clock. It is driven one call at a time by a host: flight upserts and
//! removals from the transport, and ticks tagged with a correlation id that
//! selects the conflict, rebalancing or health pass. Everything the engine
//! produces goes out through an [`EventSink`].
//!
//! Hosts that share an engine across threads must wrap the whole engine in
//! one exclusive lock.

use serde::{Deserialize, Serialize};

use crate::balancer::{BalancerState, SectorBalanceStats, SectorBalancer};
use crate::complexity::ComplexityCalculator;
use crate::config::EngineConfig;
use crate::conflict::{Conflict, ConflictDetectionEngine, ConflictDetectionStats};
use crate::error::{AtcError, AtcResult};
use crate::models::Flight;
use crate::sector::{Sector, SectorAssignment, SectorId};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Periodic passes, keyed by the correlation id carried on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerKind {
    ConflictDetection = 1,
    Rebalancing = 2,
    HealthCheck = 3,
}

impl TimerKind {
    pub const ALL: [TimerKind; 3] = [Self::ConflictDetection, Self::Rebalancing, Self::HealthCheck];

    pub fn correlation_id(self) -> u64 {
        self as u64
    }
}

impl TryFrom<u64> for TimerKind {
    type Error = AtcError;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::ConflictDetection),
            2 => Ok(Self::Rebalancing),
            3 => Ok(Self::HealthCheck),
            other => Err(AtcError::UnknownTimer(other)),
        }
    }
}

/// Monotonic logical time in nanoseconds, advanced only by ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalClock {
    now_nanos: u64,
}

impl LogicalClock {
    pub fn at(now_nanos: u64) -> Self {
        Self { now_nanos }
    }

    pub fn now(&self) -> u64 {
        self.now_nanos
    }

    /// Returns false, leaving the clock unchanged, if `nanos` is in the past.
    pub fn advance_to(&mut self, nanos: u64) -> bool {
        if nanos < self.now_nanos {
            return false;
        }
        self.now_nanos = nanos;
        true
    }
}

/// Outbound content contract of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEvent {
    Conflicts {
        logical_time_nanos: u64,
        conflicts: Vec<Conflict>,
    },
    Assignment(SectorAssignment),
    FlightRemoved {
        logical_time_nanos: u64,
        flight_id: String,
        sector: Option<SectorId>,
    },
    ConflictStats {
        logical_time_nanos: u64,
        stats: ConflictDetectionStats,
    },
    BalanceStats {
        logical_time_nanos: u64,
        stats: SectorBalanceStats,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conflicts { .. } => "conflicts",
            Self::Assignment(_) => "assignment",
            Self::FlightRemoved { .. } => "flight_removed",
            Self::ConflictStats { .. } => "conflict_stats",
            Self::BalanceStats { .. } => "balance_stats",
        }
    }
}

/// Receives every event the engine produces, in production order.
pub trait EventSink {
    fn publish(&mut self, event: EngineEvent);
}

/// Collects events in memory.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    events: Vec<EngineEvent>,
}

impl VecSink {
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for VecSink {
    fn publish(&mut self, event: EngineEvent) {
        self.events.push(event);
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&mut self, _event: EngineEvent) {}
}

/// Result of one tick, mirroring what was published.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Conflicts(Vec<Conflict>),
    Rebalanced(Vec<SectorAssignment>),
    Health {
        conflicts: ConflictDetectionStats,
        balance: SectorBalanceStats,
    },
}

/// Serialized engine state for replica transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    pub clock: LogicalClock,
    pub flights: Vec<Flight>,
    pub balancer: BalancerState,
}

pub struct AtcEngine<S: EventSink> {
    config: EngineConfig,
    registry: ConflictDetectionEngine,
    balancer: SectorBalancer,
    clock: LogicalClock,
    sink: S,
}

impl<S: EventSink> AtcEngine<S> {
    pub fn new(config: EngineConfig, sectors: Vec<Sector>, sink: S) -> AtcResult<Self> {
        config.validate()?;
        let balancer = SectorBalancer::new(
            sectors,
            config.balancer.clone(),
            ComplexityCalculator::new(config.complexity.clone()),
        )?;
        Ok(Self {
            registry: ConflictDetectionEngine::new(config.separation.clone()),
            balancer,
            clock: LogicalClock::default(),
            sink,
            config,
        })
    }

    /// Rebuild an engine from [`AtcEngine::snapshot`] bytes. The snapshot's
    /// flights, workloads and assignments must agree with each other.
    pub fn restore(
        config: EngineConfig,
        sectors: Vec<Sector>,
        sink: S,
        bytes: &[u8],
    ) -> AtcResult<Self> {
        let snapshot: EngineSnapshot = serde_json::from_slice(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(AtcError::Invariant(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }

        let mut engine = Self::new(config, sectors, sink)?;
        engine.balancer.restore_state(snapshot.balancer)?;

        let flight_count = snapshot.flights.len();
        for flight in snapshot.flights {
            let assigned = engine.balancer.sector_of(flight.flight_id());
            if assigned.is_none() || assigned != flight.sector_id() {
                return Err(AtcError::Invariant(format!(
                    "flight {} carries sector {:?} but is assigned {:?}",
                    flight.flight_id(),
                    flight.sector_id(),
                    assigned
                )));
            }
            if engine.registry.upsert(flight).is_some() {
                return Err(AtcError::Invariant("snapshot repeats a flight id".to_string()));
            }
        }
        if flight_count != engine.balancer.aircraft_assignments().len() {
            return Err(AtcError::Invariant(format!(
                "snapshot has {flight_count} flights but {} assignments",
                engine.balancer.aircraft_assignments().len()
            )));
        }

        engine.clock = snapshot.clock;
        tracing::info!(
            flights = flight_count,
            logical_time_nanos = engine.clock.now(),
            "Engine restored from snapshot"
        );
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConflictDetectionEngine {
        &self.registry
    }

    pub fn balancer(&self) -> &SectorBalancer {
        &self.balancer
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Store the flight, assign it a sector and publish the assignment.
    pub fn upsert_flight(&mut self, flight: Flight) -> AtcResult<SectorAssignment> {
        let now = self.clock.now();
        let mut flight = flight.with_last_update(now);
        let assignment = self.balancer.assign(&flight, now)?;
        flight.state_mut().sector_id = Some(assignment.assigned_sector);
        self.registry.upsert(flight);
        self.sink.publish(EngineEvent::Assignment(assignment.clone()));
        Ok(assignment)
    }

    /// Returns false for an unknown id.
    pub fn remove_flight(&mut self, flight_id: &str) -> bool {
        let now = self.clock.now();
        if self.registry.remove(flight_id).is_none() {
            return false;
        }
        let sector = self.balancer.release(flight_id, now);
        self.sink.publish(EngineEvent::FlightRemoved {
            logical_time_nanos: now,
            flight_id: flight_id.to_string(),
            sector,
        });
        true
    }

    /// Drop every flight and reset workloads. The clock keeps its value.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.balancer.clear();
        tracing::info!("Engine state cleared");
    }

    pub fn tick(&mut self, time_nanos: u64, correlation_id: u64) -> AtcResult<TickOutcome> {
        let timer = TimerKind::try_from(correlation_id)?;
        if !self.clock.advance_to(time_nanos) {
            tracing::warn!(
                current = self.clock.now(),
                requested = time_nanos,
                ?timer,
                "Ignoring logical clock regression"
            );
        }

        match timer {
            TimerKind::ConflictDetection => {
                Ok(TickOutcome::Conflicts(self.run_conflict_detection()))
            }
            TimerKind::Rebalancing => self.run_rebalancing().map(TickOutcome::Rebalanced),
            TimerKind::HealthCheck => {
                let (conflicts, balance) = self.run_health_check();
                Ok(TickOutcome::Health { conflicts, balance })
            }
        }
    }

    pub fn snapshot(&self) -> AtcResult<Vec<u8>> {
        let snapshot = EngineSnapshot {
            version: SNAPSHOT_VERSION,
            clock: self.clock,
            flights: self.registry.flights().cloned().collect(),
            balancer: self.balancer.export_state(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    fn run_conflict_detection(&mut self) -> Vec<Conflict> {
        let conflicts = self.registry.detect_all();
        if !conflicts.is_empty() {
            tracing::debug!(count = conflicts.len(), "Conflicts detected");
        }
        self.sink.publish(EngineEvent::Conflicts {
            logical_time_nanos: self.clock.now(),
            conflicts: conflicts.clone(),
        });
        conflicts
    }

    fn run_rebalancing(&mut self) -> AtcResult<Vec<SectorAssignment>> {
        let moves = self.balancer.perform_rebalancing(self.clock.now());
        for assignment in &moves {
            if !self
                .registry
                .set_sector(&assignment.aircraft_id, assignment.assigned_sector)
            {
                return Err(AtcError::Invariant(format!(
                    "rebalanced aircraft {} is not in the flight registry",
                    assignment.aircraft_id
                )));
            }
            self.sink.publish(EngineEvent::Assignment(assignment.clone()));
        }
        Ok(moves)
    }

    fn run_health_check(&mut self) -> (ConflictDetectionStats, SectorBalanceStats) {
        let now = self.clock.now();
        let conflicts = self.registry.stats();
        let balance = self.balancer.balance_stats();
        tracing::debug!(
            conflicts = %conflicts.summary(),
            balance = %balance.summary(),
            "Health check"
        );
        self.sink.publish(EngineEvent::ConflictStats {
            logical_time_nanos: now,
            stats: conflicts.clone(),
        });
        self.sink.publish(EngineEvent::BalanceStats {
            logical_time_nanos: now,
            stats: balance.clone(),
        });
        (conflicts, balance)
    }
}
