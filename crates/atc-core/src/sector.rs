//! Sector geometry, workload accounting and assignment records.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, validation, AtcResult};
use crate::models::AircraftState;

pub type SectorId = u32;

/// An axis-aligned control volume in scaled units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    id: SectorId,
    min_x: i64,
    min_y: i64,
    max_x: i64,
    max_y: i64,
    min_altitude: i64,
    max_altitude: i64,
}

impl Sector {
    pub fn new(
        id: SectorId,
        min_x: i64,
        min_y: i64,
        max_x: i64,
        max_y: i64,
        min_altitude: i64,
        max_altitude: i64,
    ) -> AtcResult<Self> {
        for (axis, lo, hi) in [
            ("x", min_x, max_x),
            ("y", min_y, max_y),
            ("altitude", min_altitude, max_altitude),
        ] {
            if lo > hi {
                return Err(validation(format!(
                    "sector {id}: min {axis} ({lo}) exceeds max {axis} ({hi})"
                )));
            }
        }
        Ok(Self {
            id,
            min_x,
            min_y,
            max_x,
            max_y,
            min_altitude,
            max_altitude,
        })
    }

    pub fn id(&self) -> SectorId {
        self.id
    }

    pub fn bounds(&self) -> [(i64, i64); 3] {
        [
            (self.min_x, self.max_x),
            (self.min_y, self.max_y),
            (self.min_altitude, self.max_altitude),
        ]
    }

    /// Inclusive box test on all three axes.
    pub fn contains(&self, state: &AircraftState) -> bool {
        (self.min_x..=self.max_x).contains(&state.position_x)
            && (self.min_y..=self.max_y).contains(&state.position_y)
            && (self.min_altitude..=self.max_altitude).contains(&state.altitude)
    }

    /// Horizontal center of the box in scaled units.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x as f64 + self.max_x as f64) / 2.0,
            (self.min_y as f64 + self.max_y as f64) / 2.0,
        )
    }

    /// Distance from the aircraft to the box center (scaled units). This is
    /// a center distance, not a distance to the nearest boundary.
    pub fn distance_to_center_scaled(&self, state: &AircraftState) -> f64 {
        let (cx, cy) = self.center();
        crate::spatial::planar_distance(state.position_x as f64, state.position_y as f64, cx, cy)
    }
}

/// Workload health bucket; every boundary belongs to the higher bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectorHealth {
    Healthy,
    Moderate,
    High,
    Critical,
}

impl SectorHealth {
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization < 0.6 {
            Self::Healthy
        } else if utilization < 0.8 {
            Self::Moderate
        } else if utilization < 0.95 {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn is_overloaded(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// Preference weight used when scoring candidate sectors.
    pub fn score(self) -> f64 {
        match self {
            Self::Healthy => 1.0,
            Self::Moderate => 0.7,
            Self::High => 0.4,
            Self::Critical => 0.1,
        }
    }
}

/// Capacity limits for one sector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorCapacity {
    pub max_aircraft: usize,
    pub max_complexity: f64,
}

impl Default for SectorCapacity {
    fn default() -> Self {
        Self {
            max_aircraft: 20,
            max_complexity: 100.0,
        }
    }
}

impl SectorCapacity {
    pub fn validate(&self) -> AtcResult<()> {
        if self.max_aircraft == 0 {
            return Err(validation("sector aircraft capacity must be positive"));
        }
        ensure_positive("sector complexity capacity", self.max_complexity)
    }
}

/// Live workload of one sector.
///
/// Aircraft count above capacity is a balancing target, not a hard limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorWorkload {
    sector_id: SectorId,
    capacity: SectorCapacity,
    /// Assigned aircraft in arrival order
    aircraft_ids: Vec<String>,
    complexity: f64,
    last_update_nanos: u64,
}

impl SectorWorkload {
    pub fn new(sector_id: SectorId, capacity: SectorCapacity) -> AtcResult<Self> {
        capacity.validate()?;
        Ok(Self {
            sector_id,
            capacity,
            aircraft_ids: Vec::new(),
            complexity: 0.0,
            last_update_nanos: 0,
        })
    }

    pub fn sector_id(&self) -> SectorId {
        self.sector_id
    }

    pub fn capacity(&self) -> SectorCapacity {
        self.capacity
    }

    pub fn aircraft_ids(&self) -> &[String] {
        &self.aircraft_ids
    }

    pub fn contains(&self, aircraft_id: &str) -> bool {
        self.aircraft_ids.iter().any(|id| id == aircraft_id)
    }

    pub fn aircraft_count(&self) -> usize {
        self.aircraft_ids.len()
    }

    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    pub fn last_update_nanos(&self) -> u64 {
        self.last_update_nanos
    }

    pub fn remaining_aircraft_capacity(&self) -> usize {
        self.capacity.max_aircraft.saturating_sub(self.aircraft_count())
    }

    pub fn remaining_complexity_capacity(&self) -> f64 {
        (self.capacity.max_complexity - self.complexity).max(0.0)
    }

    pub fn can_accept_aircraft(&self) -> bool {
        self.remaining_aircraft_capacity() > 0 && self.remaining_complexity_capacity() > 0.0
    }

    pub fn is_at_capacity(&self) -> bool {
        !self.can_accept_aircraft()
    }

    /// The higher of aircraft-count and complexity utilization.
    pub fn utilization(&self) -> f64 {
        let by_count = self.aircraft_count() as f64 / self.capacity.max_aircraft as f64;
        let by_complexity = self.complexity / self.capacity.max_complexity;
        by_count.max(by_complexity)
    }

    pub fn complexity_utilization(&self) -> f64 {
        self.complexity / self.capacity.max_complexity
    }

    pub fn health(&self) -> SectorHealth {
        SectorHealth::from_utilization(self.utilization())
    }

    /// Returns false if the aircraft was already a member.
    pub fn add_aircraft(&mut self, aircraft_id: &str, complexity: f64, now_nanos: u64) -> bool {
        if self.contains(aircraft_id) {
            return false;
        }
        self.aircraft_ids.push(aircraft_id.to_string());
        self.complexity += complexity;
        self.last_update_nanos = now_nanos;
        true
    }

    /// Returns false if the aircraft was not a member.
    pub fn remove_aircraft(&mut self, aircraft_id: &str, complexity: f64, now_nanos: u64) -> bool {
        let Some(idx) = self.aircraft_ids.iter().position(|id| id == aircraft_id) else {
            return false;
        };
        self.aircraft_ids.remove(idx);
        self.complexity = (self.complexity - complexity).max(0.0);
        self.last_update_nanos = now_nanos;
        true
    }

    /// Drop every aircraft and the accumulated complexity. Capacity is kept.
    pub fn reset(&mut self) {
        self.aircraft_ids.clear();
        self.complexity = 0.0;
        self.last_update_nanos = 0;
    }

    pub fn update_aircraft_complexity(
        &mut self,
        aircraft_id: &str,
        old: f64,
        new: f64,
        now_nanos: u64,
    ) {
        if self.contains(aircraft_id) {
            self.complexity = (self.complexity - old + new).max(0.0);
            self.last_update_nanos = now_nanos;
        }
    }
}

impl std::fmt::Display for SectorWorkload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sector {}: aircraft {}/{}, complexity {:.2}/{:.2}, {:?}",
            self.sector_id,
            self.aircraft_count(),
            self.capacity.max_aircraft,
            self.complexity,
            self.capacity.max_complexity,
            self.health()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentReason {
    InitialAssignment,
    LoadBalancing,
    Emergency,
    WeatherAvoidance,
    TrafficConflict,
    Optimization,
    CapacityOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl AssignmentPriority {
    /// Complexity above which an assignment is always HIGH priority.
    pub const HIGH_COMPLEXITY: f64 = 7.0;

    pub fn determine(reason: AssignmentReason, complexity: f64) -> Self {
        if reason == AssignmentReason::Emergency {
            Self::Critical
        } else if complexity > Self::HIGH_COMPLEXITY {
            Self::High
        } else if reason == AssignmentReason::LoadBalancing {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// An immutable record of one balancer decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAssignment {
    pub(crate) aircraft_id: String,
    pub(crate) assigned_sector: SectorId,
    /// `None` for an aircraft that had no sector
    pub(crate) previous_sector: Option<SectorId>,
    pub(crate) reason: AssignmentReason,
    pub(crate) priority: AssignmentPriority,
    pub(crate) complexity: f64,
    pub(crate) rationale: String,
    pub(crate) logical_time_nanos: u64,
}

impl SectorAssignment {
    pub fn aircraft_id(&self) -> &str {
        &self.aircraft_id
    }

    pub fn assigned_sector(&self) -> SectorId {
        self.assigned_sector
    }

    pub fn previous_sector(&self) -> Option<SectorId> {
        self.previous_sector
    }

    pub fn reason(&self) -> AssignmentReason {
        self.reason
    }

    pub fn priority(&self) -> AssignmentPriority {
        self.priority
    }

    /// Complexity contribution of the aircraft at decision time
    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn logical_time_nanos(&self) -> u64 {
        self.logical_time_nanos
    }

    pub fn is_initial_assignment(&self) -> bool {
        self.previous_sector.is_none()
    }

    pub fn is_sector_change(&self) -> bool {
        self.previous_sector
            .is_some_and(|previous| previous != self.assigned_sector)
    }

    pub fn requires_immediate_action(&self) -> bool {
        self.priority == AssignmentPriority::Critical
            || matches!(
                self.reason,
                AssignmentReason::Emergency | AssignmentReason::TrafficConflict
            )
    }

    pub fn description(&self) -> String {
        match self.previous_sector {
            Some(previous) if previous != self.assigned_sector => format!(
                "Aircraft {} moved from Sector {} to Sector {} ({:?})",
                self.aircraft_id, previous, self.assigned_sector, self.reason
            ),
            _ => format!(
                "Aircraft {} assigned to Sector {} ({:?})",
                self.aircraft_id, self.assigned_sector, self.reason
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload() -> SectorWorkload {
        SectorWorkload::new(1, SectorCapacity::default()).unwrap()
    }

    #[test]
    fn contains_is_inclusive_on_every_face() {
        let sector = Sector::new(1, 0, 0, 100_000, 100_000, 0, 1_000_000).unwrap();
        assert!(sector.contains(&AircraftState::new(0, 0, 0, 0, 0)));
        assert!(sector.contains(&AircraftState::new(100_000, 100_000, 0, 0, 1_000_000)));
        assert!(!sector.contains(&AircraftState::new(100_001, 50_000, 0, 0, 500_000)));
        assert!(!sector.contains(&AircraftState::new(50_000, 50_000, 0, 0, 1_000_001)));
        assert_eq!(sector.center(), (50_000.0, 50_000.0));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert!(Sector::new(1, 10, 0, 0, 10, 0, 10).is_err());
        assert!(Sector::new(1, 0, 0, 10, 10, 10, 0).is_err());
        assert!(SectorWorkload::new(1, SectorCapacity { max_aircraft: 0, max_complexity: 1.0 }).is_err());
    }

    #[test]
    fn health_boundaries_fall_into_higher_bucket() {
        assert_eq!(SectorHealth::from_utilization(0.59), SectorHealth::Healthy);
        assert_eq!(SectorHealth::from_utilization(0.6), SectorHealth::Moderate);
        assert_eq!(SectorHealth::from_utilization(0.8), SectorHealth::High);
        assert_eq!(SectorHealth::from_utilization(0.95), SectorHealth::Critical);
        assert_eq!(SectorHealth::from_utilization(1.4), SectorHealth::Critical);
    }

    #[test]
    fn accumulated_complexity_of_eighty_is_high() {
        let mut w = workload();
        assert_eq!(w.health(), SectorHealth::Healthy);
        w.add_aircraft("FL001", 25.0, 1);
        w.add_aircraft("FL002", 25.0, 2);
        assert_eq!(w.health(), SectorHealth::Healthy);
        w.add_aircraft("FL003", 30.0, 3);
        assert_eq!(w.utilization(), 0.8);
        assert_eq!(w.health(), SectorHealth::High);
        assert_eq!(w.last_update_nanos(), 3);
    }

    #[test]
    fn membership_is_a_set_and_complexity_never_negative() {
        let mut w = workload();
        assert!(w.add_aircraft("FL001", 5.0, 0));
        assert!(!w.add_aircraft("FL001", 5.0, 0));
        assert_eq!(w.aircraft_count(), 1);
        assert_eq!(w.complexity(), 5.0);
        assert!(w.remove_aircraft("FL001", 9.0, 0));
        assert!(!w.remove_aircraft("FL001", 9.0, 0));
        assert_eq!(w.complexity(), 0.0);
    }

    #[test]
    fn reset_empties_but_keeps_capacity() {
        let mut w = workload();
        w.add_aircraft("FL001", 12.5, 4);
        w.reset();
        assert_eq!(w, workload());
    }

    #[test]
    fn utilization_takes_the_larger_ratio() {
        let mut w = SectorWorkload::new(2, SectorCapacity { max_aircraft: 4, max_complexity: 100.0 }).unwrap();
        w.add_aircraft("A", 1.0, 0);
        w.add_aircraft("B", 1.0, 0);
        assert_eq!(w.utilization(), 0.5);
        w.update_aircraft_complexity("A", 1.0, 90.0, 0);
        assert_eq!(w.utilization(), 0.91);
        assert_eq!(w.remaining_aircraft_capacity(), 2);
        assert!(w.can_accept_aircraft());
    }

    #[test]
    fn priority_rules() {
        use AssignmentReason::*;
        assert_eq!(AssignmentPriority::determine(Emergency, 1.0), AssignmentPriority::Critical);
        assert_eq!(AssignmentPriority::determine(InitialAssignment, 7.5), AssignmentPriority::High);
        assert_eq!(AssignmentPriority::determine(LoadBalancing, 7.0), AssignmentPriority::Medium);
        assert_eq!(AssignmentPriority::determine(Optimization, 3.0), AssignmentPriority::Low);
    }

    #[test]
    fn assignment_descriptions() {
        let mut a = SectorAssignment {
            aircraft_id: "FL001".into(),
            assigned_sector: 2,
            previous_sector: None,
            reason: AssignmentReason::InitialAssignment,
            priority: AssignmentPriority::Low,
            complexity: 4.0,
            rationale: String::new(),
            logical_time_nanos: 0,
        };
        assert!(a.is_initial_assignment());
        assert!(!a.is_sector_change());
        assert!(a.description().contains("assigned to Sector 2"));

        a.previous_sector = Some(1);
        a.reason = AssignmentReason::TrafficConflict;
        assert!(a.is_sector_change());
        assert!(a.requires_immediate_action());
        assert!(a.description().contains("moved from Sector 1 to Sector 2"));
    }
}
