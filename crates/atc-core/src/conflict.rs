//! Conflict detection module.
//!
//! Keeps the registry of active flights and scans it for pairs that violate
//! wake-adjusted separation minima. Scans are exhaustive over unordered
//! pairs and iterate flights in id order, so two replicas holding the same
//! registry report the same conflicts in the same order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::models::Flight;
use crate::rules::SeparationConfig;
use crate::sector::SectorId;

/// Severity levels for detected conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// How soon a conflict needs attention, derived from time-to-conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictUrgency {
    /// 300 s or more, or no closing motion
    Normal,
    /// Under 300 s
    High,
    /// Under 120 s
    Urgent,
    /// Under 30 s
    Immediate,
}

impl ConflictUrgency {
    pub const ALL: [ConflictUrgency; 4] = [Self::Normal, Self::High, Self::Urgent, Self::Immediate];

    pub fn from_time_to_conflict(seconds: Option<f64>) -> Self {
        match seconds {
            Some(t) if t < 30.0 => Self::Immediate,
            Some(t) if t < 120.0 => Self::Urgent,
            Some(t) if t < 300.0 => Self::High,
            _ => Self::Normal,
        }
    }
}

/// Detected conflict between two flights.
///
/// Equality and hashing ignore the order of the two ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub flight_id_1: String,
    pub flight_id_2: String,
    pub severity: ConflictSeverity,
    /// Current horizontal distance (meters)
    pub distance_m: f64,
    /// Seconds until conflict; `None` when the pair is not closing
    pub time_to_conflict_s: Option<f64>,
}

impl Conflict {
    pub fn urgency(&self) -> ConflictUrgency {
        ConflictUrgency::from_time_to_conflict(self.time_to_conflict_s)
    }

    pub fn involves(&self, flight_id: &str) -> bool {
        self.flight_id_1 == flight_id || self.flight_id_2 == flight_id
    }

    pub fn other_flight(&self, flight_id: &str) -> Option<&str> {
        if self.flight_id_1 == flight_id {
            Some(&self.flight_id_2)
        } else if self.flight_id_2 == flight_id {
            Some(&self.flight_id_1)
        } else {
            None
        }
    }

    fn ordered_ids(&self) -> (&str, &str) {
        if self.flight_id_1 <= self.flight_id_2 {
            (&self.flight_id_1, &self.flight_id_2)
        } else {
            (&self.flight_id_2, &self.flight_id_1)
        }
    }

    pub fn description(&self) -> String {
        let ttc = match self.time_to_conflict_s {
            Some(t) => format!("{t:.1} seconds"),
            None => "not closing".to_string(),
        };
        format!(
            "Conflict between {} and {}: {:.1} meters, {}, {:?} severity",
            self.flight_id_1, self.flight_id_2, self.distance_m, ttc, self.severity
        )
    }
}

impl PartialEq for Conflict {
    fn eq(&self, other: &Self) -> bool {
        self.ordered_ids() == other.ordered_ids()
    }
}

impl Eq for Conflict {}

impl Hash for Conflict {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ordered_ids().hash(state);
    }
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}<->{} {:?} {:.1}m",
            self.flight_id_1, self.flight_id_2, self.severity, self.distance_m
        )?;
        match self.time_to_conflict_s {
            Some(t) => write!(f, " {t:.1}s"),
            None => write!(f, " not closing"),
        }
    }
}

/// Snapshot of detection results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictDetectionStats {
    pub total_flights: usize,
    pub total_conflicts: usize,
    pub conflicts: Vec<Conflict>,
}

impl ConflictDetectionStats {
    pub fn new(total_flights: usize, conflicts: Vec<Conflict>) -> Self {
        Self {
            total_flights,
            total_conflicts: conflicts.len(),
            conflicts,
        }
    }

    /// Conflicts per flight.
    pub fn conflict_rate(&self) -> f64 {
        if self.total_flights == 0 {
            return 0.0;
        }
        self.total_conflicts as f64 / self.total_flights as f64
    }

    pub fn count_by_severity(&self, severity: ConflictSeverity) -> usize {
        self.conflicts.iter().filter(|c| c.severity == severity).count()
    }

    pub fn count_by_urgency(&self, urgency: ConflictUrgency) -> usize {
        self.conflicts.iter().filter(|c| c.urgency() == urgency).count()
    }

    pub fn urgency_breakdown(&self) -> BTreeMap<ConflictUrgency, usize> {
        ConflictUrgency::ALL
            .into_iter()
            .map(|u| (u, self.count_by_urgency(u)))
            .collect()
    }

    /// Mean over conflicts that are closing; pairs with no closing motion
    /// have no finite time and are left out.
    pub fn average_time_to_conflict(&self) -> f64 {
        let times: Vec<f64> = self
            .conflicts
            .iter()
            .filter_map(|c| c.time_to_conflict_s)
            .collect();
        if times.is_empty() {
            return 0.0;
        }
        times.iter().sum::<f64>() / times.len() as f64
    }

    pub fn average_distance(&self) -> f64 {
        if self.conflicts.is_empty() {
            return 0.0;
        }
        self.conflicts.iter().map(|c| c.distance_m).sum::<f64>() / self.conflicts.len() as f64
    }

    pub fn has_immediate_conflicts(&self) -> bool {
        self.conflicts
            .iter()
            .any(|c| c.urgency() == ConflictUrgency::Immediate)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} flights, {} conflicts ({:.2} rate), {:.1}s avg time to conflict",
            self.total_flights,
            self.total_conflicts,
            self.conflict_rate(),
            self.average_time_to_conflict()
        )
    }
}

/// Registry of active flights and the pairwise conflict scan.
#[derive(Debug, Clone, Default)]
pub struct ConflictDetectionEngine {
    separation: SeparationConfig,
    flights: BTreeMap<String, Flight>,
}

impl ConflictDetectionEngine {
    pub fn new(separation: SeparationConfig) -> Self {
        Self {
            separation,
            flights: BTreeMap::new(),
        }
    }

    pub fn separation(&self) -> &SeparationConfig {
        &self.separation
    }

    /// Insert or replace a flight, returning the previous entry.
    pub fn upsert(&mut self, flight: Flight) -> Option<Flight> {
        self.flights.insert(flight.flight_id().to_string(), flight)
    }

    pub fn remove(&mut self, flight_id: &str) -> Option<Flight> {
        self.flights.remove(flight_id)
    }

    pub fn clear(&mut self) {
        self.flights.clear();
    }

    pub fn flight(&self, flight_id: &str) -> Option<&Flight> {
        self.flights.get(flight_id)
    }

    pub(crate) fn flight_mut(&mut self, flight_id: &str) -> Option<&mut Flight> {
        self.flights.get_mut(flight_id)
    }

    /// Flights in id order.
    pub fn flights(&self) -> impl Iterator<Item = &Flight> {
        self.flights.values()
    }

    pub fn flight_count(&self) -> usize {
        self.flights.len()
    }

    /// Record the balancer's sector on the stored flight. Returns false for
    /// an unknown id.
    pub fn set_sector(&mut self, flight_id: &str, sector_id: SectorId) -> bool {
        match self.flights.get_mut(flight_id) {
            Some(flight) => {
                flight.state_mut().sector_id = Some(sector_id);
                true
            }
            None => false,
        }
    }

    /// Every unordered pair, once.
    pub fn detect_all(&self) -> Vec<Conflict> {
        let flights: Vec<&Flight> = self.flights.values().collect();
        self.scan_pairs(&flights)
    }

    /// Conflicts between one flight and every other; empty for an unknown id.
    pub fn detect_for_flight(&self, flight_id: &str) -> Vec<Conflict> {
        let Some(flight) = self.flights.get(flight_id) else {
            return Vec::new();
        };
        self.flights
            .values()
            .filter(|other| *other != flight)
            .filter_map(|other| self.detect_pair(flight, other))
            .collect()
    }

    /// Pairs among flights whose stored sector matches.
    pub fn detect_in_sector(&self, sector_id: SectorId) -> Vec<Conflict> {
        let flights: Vec<&Flight> = self
            .flights
            .values()
            .filter(|f| f.is_in_sector(sector_id))
            .collect();
        self.scan_pairs(&flights)
    }

    pub fn stats(&self) -> ConflictDetectionStats {
        ConflictDetectionStats::new(self.flights.len(), self.detect_all())
    }

    fn scan_pairs(&self, flights: &[&Flight]) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for (i, first) in flights.iter().enumerate() {
            for second in &flights[i + 1..] {
                if let Some(conflict) = self.detect_pair(first, second) {
                    conflicts.push(conflict);
                }
            }
        }
        conflicts
    }

    fn detect_pair(&self, first: &Flight, second: &Flight) -> Option<Conflict> {
        let minima = self.separation.minima_for_pair(
            first.performance().wake_category(),
            second.performance().wake_category(),
        );
        if !first.has_conflict_with(second, &minima) {
            return None;
        }
        let distance_m = first.horizontal_distance_m(second);
        Some(Conflict {
            flight_id_1: first.flight_id().to_string(),
            flight_id_2: second.flight_id().to_string(),
            // Every violation is reported as HIGH; there is no graded
            // severity model yet.
            severity: ConflictSeverity::High,
            distance_m,
            time_to_conflict_s: self.time_to_conflict(first, second, distance_m),
        })
    }

    /// Current distance over the x component of relative velocity.
    fn time_to_conflict(&self, first: &Flight, second: &Flight, distance_m: f64) -> Option<f64> {
        let closing = (first.state().velocity_x_mps() - second.state().velocity_x_mps()).abs();
        if closing < self.separation.min_closing_speed_mps {
            return None;
        }
        Some(distance_m / closing)
    }
}
