//! Deterministic conflict detection and sector workload balancing.
//!
//! Coordinates are scaled integers (centimeters, see [`spatial::SCALE`]) and
//! all registries are ordered maps, so replicas fed the same inputs in the
//! same order hold identical state.

pub mod balancer;
pub mod complexity;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod models;
pub mod rules;
pub mod sector;
pub mod spatial;

pub use balancer::{
    BalancerState, SectorBalanceStats, SectorBalancer, SectorInfo, WorkloadDistribution,
};
pub use complexity::{ComplexityBreakdown, ComplexityCalculator, ComplexityWeights, MAX_COMPLEXITY};
pub use config::{BalancerConfig, EngineConfig, SectorScoreWeights};
pub use conflict::{
    Conflict, ConflictDetectionEngine, ConflictDetectionStats, ConflictSeverity, ConflictUrgency,
};
pub use engine::{
    AtcEngine, EngineEvent, EngineSnapshot, EventSink, LogicalClock, NullSink, TickOutcome,
    TimerKind, VecSink, SNAPSHOT_VERSION,
};
pub use error::{AtcError, AtcResult};
pub use models::{
    AircraftState, AltitudeConstraints, AltitudeUnit, Flight, FlightIntent, SpeedConstraints,
    SpeedUnit, Waypoint,
};
pub use rules::{AircraftPerformance, SeparationConfig, SeparationMinima, WakeCategory};
pub use sector::{
    AssignmentPriority, AssignmentReason, Sector, SectorAssignment, SectorCapacity, SectorHealth,
    SectorId, SectorWorkload,
};
pub use spatial::Position3;
