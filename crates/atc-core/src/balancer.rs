//! Sector balancer.
//!
//! Assigns every flight to one sector, keeps per-sector workload in step
//! with those assignments, and periodically moves aircraft out of
//! overloaded sectors. All maps are ordered and sectors are kept sorted by
//! id, so the same sequence of calls always yields the same assignments.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::complexity::ComplexityCalculator;
use crate::config::BalancerConfig;
use crate::error::{validation, AtcError, AtcResult};
use crate::models::{AircraftState, Flight};
use crate::sector::{
    AssignmentPriority, AssignmentReason, Sector, SectorAssignment, SectorHealth, SectorId,
    SectorWorkload,
};

/// Complexity assumed for a moved aircraft with no cached score.
const FALLBACK_COMPLEXITY: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct SectorBalancer {
    /// Sorted by id
    sectors: Vec<Sector>,
    workloads: BTreeMap<SectorId, SectorWorkload>,
    assignments: BTreeMap<String, SectorId>,
    complexity_cache: BTreeMap<String, f64>,
    config: BalancerConfig,
    calculator: ComplexityCalculator,
}

impl SectorBalancer {
    /// Sectors must be non-empty with unique ids.
    pub fn new(
        mut sectors: Vec<Sector>,
        config: BalancerConfig,
        calculator: ComplexityCalculator,
    ) -> AtcResult<Self> {
        config.validate()?;
        if sectors.is_empty() {
            return Err(validation("at least one sector is required"));
        }
        sectors.sort_by_key(Sector::id);
        let mut workloads = BTreeMap::new();
        for sector in &sectors {
            let workload = SectorWorkload::new(sector.id(), config.capacity_for(sector.id()))?;
            if workloads.insert(sector.id(), workload).is_some() {
                return Err(validation(format!("duplicate sector id {}", sector.id())));
            }
        }

        Ok(Self {
            sectors,
            workloads,
            assignments: BTreeMap::new(),
            complexity_cache: BTreeMap::new(),
            config,
            calculator,
        })
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    pub fn workload(&self, sector_id: SectorId) -> Option<&SectorWorkload> {
        self.workloads.get(&sector_id)
    }

    pub fn workloads(&self) -> &BTreeMap<SectorId, SectorWorkload> {
        &self.workloads
    }

    pub fn aircraft_assignments(&self) -> &BTreeMap<String, SectorId> {
        &self.assignments
    }

    pub fn sector_of(&self, aircraft_id: &str) -> Option<SectorId> {
        self.assignments.get(aircraft_id).copied()
    }

    pub fn complexity_of(&self, aircraft_id: &str) -> Option<f64> {
        self.complexity_cache.get(aircraft_id).copied()
    }

    /// Score the flight, pick its sector and move its workload there.
    pub fn assign(&mut self, flight: &Flight, now_nanos: u64) -> AtcResult<SectorAssignment> {
        let aircraft_id = flight.flight_id();
        let complexity =
            self.calculator
                .calculate(flight.state(), flight.performance(), flight.intent());
        let previous_complexity = self
            .complexity_cache
            .insert(aircraft_id.to_string(), complexity);
        let previous = self.sector_of(aircraft_id);
        let old_contribution = previous_complexity.unwrap_or(complexity);
        let current = previous.map(|sector| (sector, aircraft_id, old_contribution));
        let target = self.find_optimal_sector(flight.state(), complexity, current)?;

        let reason = match previous {
            None => AssignmentReason::InitialAssignment,
            Some(p) if p != target => AssignmentReason::LoadBalancing,
            Some(_) => AssignmentReason::Optimization,
        };
        let rationale = match previous {
            None => format!(
                "Initial assignment of aircraft {aircraft_id} to sector {target} based on optimal workload distribution"
            ),
            Some(p) if p != target => format!(
                "Moved aircraft {aircraft_id} from sector {p} to sector {target} for workload balancing"
            ),
            Some(_) => format!(
                "Optimized assignment of aircraft {aircraft_id} to sector {target} (complexity: {complexity:.2})"
            ),
        };

        match previous {
            Some(p) if p == target => {
                if let Some(workload) = self.workloads.get_mut(&p) {
                    workload.update_aircraft_complexity(
                        aircraft_id,
                        old_contribution,
                        complexity,
                        now_nanos,
                    );
                }
            }
            _ => self.transfer(
                aircraft_id,
                previous,
                target,
                old_contribution,
                complexity,
                now_nanos,
            ),
        }

        tracing::debug!(
            aircraft = aircraft_id,
            sector = target,
            ?previous,
            ?reason,
            complexity,
            "Sector assigned"
        );

        Ok(SectorAssignment {
            aircraft_id: aircraft_id.to_string(),
            assigned_sector: target,
            previous_sector: previous,
            reason,
            priority: AssignmentPriority::determine(reason, complexity),
            complexity,
            rationale,
            logical_time_nanos: now_nanos,
        })
    }

    /// Forget an aircraft entirely. Returns the sector it was in.
    pub fn release(&mut self, aircraft_id: &str, now_nanos: u64) -> Option<SectorId> {
        let sector_id = self.assignments.remove(aircraft_id)?;
        let complexity = self
            .complexity_cache
            .remove(aircraft_id)
            .unwrap_or(FALLBACK_COMPLEXITY);
        if let Some(workload) = self.workloads.get_mut(&sector_id) {
            workload.remove_aircraft(aircraft_id, complexity, now_nanos);
        }
        tracing::debug!(aircraft = aircraft_id, sector = sector_id, "Aircraft released");
        Some(sector_id)
    }

    pub fn clear(&mut self) {
        for workload in self.workloads.values_mut() {
            workload.reset();
        }
        self.assignments.clear();
        self.complexity_cache.clear();
    }

    /// Move aircraft from HIGH/CRITICAL sectors into HEALTHY ones while the
    /// utilization gap exceeds the load-balance threshold.
    ///
    /// Moves are administrative: the aircraft's position is not re-checked
    /// against the receiving sector's box.
    pub fn perform_rebalancing(&mut self, now_nanos: u64) -> Vec<SectorAssignment> {
        if !self.config.auto_rebalancing {
            return Vec::new();
        }

        let overloaded = self.sectors_where(SectorHealth::is_overloaded, true);
        let underloaded = self.sectors_where(|h| h == SectorHealth::Healthy, false);

        let mut moves = Vec::new();
        for &from in &overloaded {
            for &to in &underloaded {
                self.rebalance_between(from, to, now_nanos, &mut moves);
                if self.health_of(from) == Some(SectorHealth::Healthy) {
                    break;
                }
            }
        }

        if !moves.is_empty() {
            tracing::info!(moves = moves.len(), "Rebalancing pass moved aircraft");
        }
        moves
    }

    /// Whether a rebalancing pass has work to do, or complexity is spread
    /// unevenly beyond the configured gap.
    pub fn needs_rebalancing(&self) -> bool {
        let least_loaded_healthy = self
            .workloads
            .values()
            .filter(|w| w.health() == SectorHealth::Healthy)
            .map(SectorWorkload::utilization)
            .fold(None, |acc: Option<f64>, u| Some(acc.map_or(u, |a| a.min(u))));

        let load_gap = least_loaded_healthy.is_some_and(|healthy| {
            self.workloads.values().any(|w| {
                w.health().is_overloaded()
                    && w.utilization() - healthy > self.config.load_balance_threshold
            })
        });
        if load_gap {
            return true;
        }

        let (min, max) = self
            .workloads
            .values()
            .map(SectorWorkload::complexity_utilization)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), u| (lo.min(u), hi.max(u)));
        max - min > self.config.complexity_balance_threshold
    }

    pub fn balance_stats(&self) -> SectorBalanceStats {
        SectorBalanceStats {
            total_aircraft: self.assignments.len(),
            sectors: self.workloads.values().map(SectorInfo::from).collect(),
        }
    }

    pub fn export_state(&self) -> BalancerState {
        BalancerState {
            workloads: self.workloads.values().cloned().collect(),
            assignments: self.assignments.clone(),
            complexity: self.complexity_cache.clone(),
        }
    }

    /// Replace the live state with an exported one after checking that
    /// workloads, assignments and cached scores agree with each other and
    /// with this balancer's sectors.
    pub fn restore_state(&mut self, state: BalancerState) -> AtcResult<()> {
        let known: BTreeSet<SectorId> = self.sectors.iter().map(Sector::id).collect();
        let mut workloads = BTreeMap::new();
        for workload in state.workloads {
            let id = workload.sector_id();
            if !known.contains(&id) {
                return Err(AtcError::Invariant(format!(
                    "snapshot workload for unknown sector {id}"
                )));
            }
            workload.capacity().validate()?;
            if workloads.insert(id, workload).is_some() {
                return Err(AtcError::Invariant(format!("snapshot repeats sector {id}")));
            }
        }
        if workloads.len() != known.len() {
            return Err(AtcError::Invariant(format!(
                "snapshot has {} workloads for {} sectors",
                workloads.len(),
                known.len()
            )));
        }

        let members: usize = workloads.values().map(SectorWorkload::aircraft_count).sum();
        if members != state.assignments.len() {
            return Err(AtcError::Invariant(format!(
                "snapshot lists {members} sector members but {} assignments",
                state.assignments.len()
            )));
        }
        for (aircraft_id, sector_id) in &state.assignments {
            let in_sector = workloads
                .get(sector_id)
                .is_some_and(|w| w.contains(aircraft_id));
            if !in_sector {
                return Err(AtcError::Invariant(format!(
                    "aircraft {aircraft_id} assigned to sector {sector_id} but not a member"
                )));
            }
            if !state.complexity.contains_key(aircraft_id) {
                return Err(AtcError::Invariant(format!(
                    "aircraft {aircraft_id} has no cached complexity"
                )));
            }
        }

        self.workloads = workloads;
        self.assignments = state.assignments;
        self.complexity_cache = state.complexity;
        Ok(())
    }

    /// Best-scoring containing sector, else the nearest sector center.
    /// Ties go to the lowest sector id.
    ///
    /// `current` is the aircraft's present sector and cached contribution.
    /// That sector is scored as if the aircraft were not yet in it, so an
    /// unchanged aircraft never competes against its own workload.
    fn find_optimal_sector(
        &self,
        state: &AircraftState,
        complexity: f64,
        current: Option<(SectorId, &str, f64)>,
    ) -> AtcResult<SectorId> {
        let mut best: Option<(SectorId, f64)> = None;
        for sector in self.sectors.iter().filter(|s| s.contains(state)) {
            let Some(workload) = self.workloads.get(&sector.id()) else {
                continue;
            };
            let score = match current {
                Some((id, aircraft_id, contribution)) if id == sector.id() => {
                    let mut without = workload.clone();
                    let stamp = workload.last_update_nanos();
                    without.remove_aircraft(aircraft_id, contribution, stamp);
                    self.score(&without, complexity)
                }
                _ => self.score(workload, complexity),
            };
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((sector.id(), score));
            }
        }
        if let Some((id, _)) = best {
            return Ok(id);
        }

        let mut nearest: Option<(SectorId, f64)> = None;
        for sector in &self.sectors {
            let distance = sector.distance_to_center_scaled(state);
            if nearest.map_or(true, |(_, d)| distance < d) {
                nearest = Some((sector.id(), distance));
            }
        }
        nearest
            .map(|(id, _)| id)
            .ok_or_else(|| AtcError::Invariant("balancer has no sectors".to_string()))
    }

    fn score(&self, workload: &SectorWorkload, complexity: f64) -> f64 {
        let w = &self.config.score_weights;
        let capacity = 1.0 - workload.utilization();
        let balance =
            1.0 - (workload.complexity() - complexity).abs() / self.config.complexity_normalizer;
        capacity * w.capacity
            + balance * w.complexity_balance
            + self.config.geographic_placeholder * w.geographic
            + workload.health().score() * w.health
    }

    fn rebalance_between(
        &mut self,
        from: SectorId,
        to: SectorId,
        now_nanos: u64,
        moves: &mut Vec<SectorAssignment>,
    ) {
        let candidates = match self.workloads.get(&from) {
            Some(workload) => workload.aircraft_ids().to_vec(),
            None => return,
        };

        for aircraft_id in candidates {
            let (Some(from_util), Some(to_util)) =
                (self.utilization_of(from), self.utilization_of(to))
            else {
                return;
            };
            if from_util - to_util <= self.config.load_balance_threshold {
                continue;
            }

            let complexity = self
                .complexity_cache
                .get(&aircraft_id)
                .copied()
                .unwrap_or(FALLBACK_COMPLEXITY);
            self.transfer(&aircraft_id, Some(from), to, complexity, complexity, now_nanos);
            tracing::debug!(aircraft = %aircraft_id, from, to, "Aircraft rebalanced");

            moves.push(SectorAssignment {
                rationale: format!(
                    "Rebalancing from overloaded sector {from} to underloaded sector {to}"
                ),
                aircraft_id,
                assigned_sector: to,
                previous_sector: Some(from),
                reason: AssignmentReason::LoadBalancing,
                priority: AssignmentPriority::Medium,
                complexity,
                logical_time_nanos: now_nanos,
            });

            if self.health_of(from) == Some(SectorHealth::Healthy) {
                break;
            }
        }
    }

    fn transfer(
        &mut self,
        aircraft_id: &str,
        from: Option<SectorId>,
        to: SectorId,
        old_complexity: f64,
        new_complexity: f64,
        now_nanos: u64,
    ) {
        if let Some(workload) = from.and_then(|id| self.workloads.get_mut(&id)) {
            workload.remove_aircraft(aircraft_id, old_complexity, now_nanos);
        }
        if let Some(workload) = self.workloads.get_mut(&to) {
            workload.add_aircraft(aircraft_id, new_complexity, now_nanos);
        }
        self.assignments.insert(aircraft_id.to_string(), to);
    }

    fn utilization_of(&self, sector_id: SectorId) -> Option<f64> {
        self.workloads.get(&sector_id).map(SectorWorkload::utilization)
    }

    fn health_of(&self, sector_id: SectorId) -> Option<SectorHealth> {
        self.workloads.get(&sector_id).map(SectorWorkload::health)
    }

    /// Sector ids whose health matches, ordered by utilization (descending
    /// when `busiest_first`) and then by id.
    fn sectors_where(
        &self,
        keep: impl Fn(SectorHealth) -> bool,
        busiest_first: bool,
    ) -> Vec<SectorId> {
        let mut picked: Vec<(SectorId, f64)> = self
            .workloads
            .values()
            .filter(|w| keep(w.health()))
            .map(|w| (w.sector_id(), w.utilization()))
            .collect();
        picked.sort_by(|(a_id, a), (b_id, b)| {
            let by_util = if busiest_first { b.total_cmp(a) } else { a.total_cmp(b) };
            by_util.then(a_id.cmp(b_id))
        });
        picked.into_iter().map(|(id, _)| id).collect()
    }
}

/// Serializable balancer state for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancerState {
    pub workloads: Vec<SectorWorkload>,
    pub assignments: BTreeMap<String, SectorId>,
    pub complexity: BTreeMap<String, f64>,
}

/// Point-in-time summary of one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorInfo {
    pub sector_id: SectorId,
    pub aircraft_count: usize,
    pub max_aircraft: usize,
    pub complexity: f64,
    pub max_complexity: f64,
    pub utilization: f64,
    pub health: SectorHealth,
}

impl From<&SectorWorkload> for SectorInfo {
    fn from(w: &SectorWorkload) -> Self {
        Self {
            sector_id: w.sector_id(),
            aircraft_count: w.aircraft_count(),
            max_aircraft: w.capacity().max_aircraft,
            complexity: w.complexity(),
            max_complexity: w.capacity().max_complexity,
            utilization: w.utilization(),
            health: w.health(),
        }
    }
}

impl std::fmt::Display for SectorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sector {}: aircraft {}/{}, complexity {:.1}/{:.1}, utilization {:.1}%, {:?}",
            self.sector_id,
            self.aircraft_count,
            self.max_aircraft,
            self.complexity,
            self.max_complexity,
            self.utilization * 100.0,
            self.health
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkloadDistribution {
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl WorkloadDistribution {
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

impl std::fmt::Display for WorkloadDistribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "min={:.2}, max={:.2}, std_dev={:.2}, range={:.2}",
            self.min,
            self.max,
            self.std_dev,
            self.range()
        )
    }
}

/// System-wide balance picture, one `SectorInfo` per sector in id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorBalanceStats {
    pub total_aircraft: usize,
    pub sectors: Vec<SectorInfo>,
}

impl SectorBalanceStats {
    pub fn total_sectors(&self) -> usize {
        self.sectors.len()
    }

    pub fn average_aircraft_per_sector(&self) -> f64 {
        if self.sectors.is_empty() {
            return 0.0;
        }
        self.total_aircraft as f64 / self.sectors.len() as f64
    }

    pub fn average_utilization(&self) -> f64 {
        if self.sectors.is_empty() {
            return 0.0;
        }
        self.sectors.iter().map(|s| s.utilization).sum::<f64>() / self.sectors.len() as f64
    }

    pub fn sectors_by_health(&self) -> BTreeMap<SectorHealth, usize> {
        let mut counts = BTreeMap::new();
        for info in &self.sectors {
            *counts.entry(info.health).or_insert(0) += 1;
        }
        counts
    }

    pub fn overloaded_sectors(&self) -> Vec<&SectorInfo> {
        self.sectors.iter().filter(|s| s.health.is_overloaded()).collect()
    }

    pub fn healthy_sectors(&self) -> Vec<&SectorInfo> {
        self.sectors
            .iter()
            .filter(|s| s.health == SectorHealth::Healthy)
            .collect()
    }

    pub fn sectors_needing_attention(&self) -> Vec<&SectorInfo> {
        self.sectors
            .iter()
            .filter(|s| s.health != SectorHealth::Healthy)
            .collect()
    }

    /// Highest utilization; the lowest id wins a tie.
    pub fn most_loaded(&self) -> Option<&SectorInfo> {
        self.sectors.iter().fold(None, |best, s| match best {
            Some(b) if b.utilization >= s.utilization => Some(b),
            _ => Some(s),
        })
    }

    /// Lowest utilization; the lowest id wins a tie.
    pub fn least_loaded(&self) -> Option<&SectorInfo> {
        self.sectors.iter().fold(None, |best, s| match best {
            Some(b) if b.utilization <= s.utilization => Some(b),
            _ => Some(s),
        })
    }

    pub fn is_system_balanced(&self) -> bool {
        self.overloaded_sectors().is_empty()
    }

    /// Fraction of sectors that are HEALTHY.
    pub fn system_health_score(&self) -> f64 {
        if self.sectors.is_empty() {
            return 0.0;
        }
        self.healthy_sectors().len() as f64 / self.sectors.len() as f64
    }

    pub fn workload_distribution(&self) -> WorkloadDistribution {
        if self.sectors.is_empty() {
            return WorkloadDistribution {
                min: 0.0,
                max: 0.0,
                std_dev: 0.0,
            };
        }
        let mean = self.average_utilization();
        let (min, max, squares) = self.sectors.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(lo, hi, sq), s| {
                (
                    lo.min(s.utilization),
                    hi.max(s.utilization),
                    sq + (s.utilization - mean).powi(2),
                )
            },
        );
        WorkloadDistribution {
            min,
            max,
            std_dev: (squares / self.sectors.len() as f64).sqrt(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} aircraft across {} sectors, {:.1}% average utilization, {:.1}% system health",
            self.total_aircraft,
            self.total_sectors(),
            self.average_utilization() * 100.0,
            self.system_health_score() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::ComplexityWeights;
    use crate::models::fixtures::flight;
    use crate::rules::WakeCategory;
    use crate::sector::SectorCapacity;

    /// Three 10 km boxes: 1 at the origin, 2 east of it, 3 north of it.
    fn sectors() -> Vec<Sector> {
        vec![
            Sector::new(1, 0, 0, 1_000_000, 1_000_000, 0, 5_000_000).unwrap(),
            Sector::new(2, 1_000_000, 0, 2_000_000, 1_000_000, 0, 5_000_000).unwrap(),
            Sector::new(3, 0, 1_000_000, 1_000_000, 2_000_000, 0, 5_000_000).unwrap(),
        ]
    }

    fn balancer_with(config: BalancerConfig) -> SectorBalancer {
        SectorBalancer::new(sectors(), config, ComplexityCalculator::default()).unwrap()
    }

    fn balancer() -> SectorBalancer {
        balancer_with(BalancerConfig::default())
    }

    fn state(x: i64, y: i64) -> AircraftState {
        AircraftState::new(x, y, 5000, 10000, 3_000_000)
    }

    #[test]
    fn rejects_empty_and_duplicate_sectors() {
        let empty = SectorBalancer::new(Vec::new(), BalancerConfig::default(), ComplexityCalculator::default());
        assert!(matches!(empty, Err(AtcError::Validation(_))));

        let mut dup = sectors();
        dup.push(Sector::new(2, 0, 0, 1, 1, 0, 1).unwrap());
        let dup = SectorBalancer::new(dup, BalancerConfig::default(), ComplexityCalculator::default());
        assert!(matches!(dup, Err(AtcError::Validation(_))));
    }

    #[test]
    fn initial_assignment_to_containing_sector() {
        let mut balancer = balancer();
        let a = balancer
            .assign(&flight("FL001", state(500_000, 500_000), WakeCategory::Medium), 10)
            .unwrap();
        assert_eq!(a.assigned_sector, 1);
        assert_eq!(a.previous_sector, None);
        assert_eq!(a.reason, AssignmentReason::InitialAssignment);
        assert!(a.is_initial_assignment());
        assert!(!a.is_sector_change());
        assert!(a.complexity > 0.0);
        assert!(a.rationale.contains("Initial assignment of aircraft FL001 to sector 1"));
        assert!(a.description().contains("FL001"));
        assert_eq!(a.logical_time_nanos, 10);

        let workload = balancer.workload(1).unwrap();
        assert_eq!(workload.aircraft_count(), 1);
        assert!((workload.complexity() - a.complexity).abs() < 1e-12);
        assert_eq!(balancer.sector_of("FL001"), Some(1));
        assert_eq!(balancer.complexity_of("FL001"), Some(a.complexity));
    }

    #[test]
    fn outside_every_sector_falls_back_to_nearest_center() {
        let mut balancer = balancer();
        // East of sector 2
        let a = balancer
            .assign(&flight("FL001", state(2_500_000, 500_000), WakeCategory::Medium), 0)
            .unwrap();
        assert_eq!(a.assigned_sector, 2);
        // Far north-east is closer to 3's center than 1's
        let b = balancer
            .assign(&flight("FL002", state(600_000, 9_000_000), WakeCategory::Medium), 0)
            .unwrap();
        assert_eq!(b.assigned_sector, 3);
    }

    #[test]
    fn shared_boundary_tie_goes_to_lowest_id() {
        let mut balancer = balancer();
        // On the x = 10 km face shared by sectors 1 and 2; both empty
        let a = balancer
            .assign(&flight("FL001", state(1_000_000, 500_000), WakeCategory::Medium), 0)
            .unwrap();
        assert_eq!(a.assigned_sector, 1);
    }

    #[test]
    fn reassigning_on_shared_boundary_keeps_sector() {
        let mut balancer = balancer();
        let on_face = flight("FL001", state(1_000_000, 500_000), WakeCategory::Medium);
        let first = balancer.assign(&on_face, 0).unwrap();
        let second = balancer.assign(&on_face, 1).unwrap();

        assert_eq!(first.assigned_sector(), 1);
        assert_eq!(second.assigned_sector(), 1);
        assert_eq!(second.previous_sector(), Some(1));
        assert_eq!(second.reason(), AssignmentReason::Optimization);
        assert_eq!(balancer.workload(1).unwrap().aircraft_count(), 1);
        assert_eq!(balancer.workload(2).unwrap().aircraft_count(), 0);
    }

    #[test]
    fn moving_aircraft_changes_sector() {
        let mut balancer = balancer();
        balancer
            .assign(&flight("FL001", state(500_000, 500_000), WakeCategory::Medium), 0)
            .unwrap();
        let moved = balancer
            .assign(&flight("FL001", state(1_500_000, 500_000), WakeCategory::Medium), 1)
            .unwrap();
        assert_eq!(moved.assigned_sector, 2);
        assert_eq!(moved.previous_sector, Some(1));
        assert!(moved.is_sector_change());
        assert_eq!(moved.reason, AssignmentReason::LoadBalancing);
        assert_eq!(moved.priority, AssignmentPriority::Medium);
        assert!(moved.rationale.contains("from sector 1 to sector 2"));

        assert_eq!(balancer.workload(1).unwrap().aircraft_count(), 0);
        assert_eq!(balancer.workload(1).unwrap().complexity(), 0.0);
        assert_eq!(balancer.workload(2).unwrap().aircraft_count(), 1);
    }

    #[test]
    fn reassigning_in_place_replaces_complexity() {
        let mut balancer = balancer();
        let first = balancer
            .assign(&flight("FL001", state(500_000, 500_000), WakeCategory::Medium), 0)
            .unwrap();
        // Level flight scores lower than the climbing first update
        let level = AircraftState::new(500_000, 500_000, 5000, 0, 3_000_000);
        let second = balancer
            .assign(&flight("FL001", level, WakeCategory::Medium), 1)
            .unwrap();
        assert_eq!(second.reason, AssignmentReason::Optimization);
        assert_eq!(second.priority, AssignmentPriority::Low);
        assert!(second.rationale.starts_with("Optimized assignment"));
        assert!(second.complexity < first.complexity);

        let workload = balancer.workload(1).unwrap();
        assert_eq!(workload.aircraft_count(), 1);
        assert!((workload.complexity() - second.complexity).abs() < 1e-9);
    }

    #[test]
    fn release_forgets_aircraft() {
        let mut balancer = balancer();
        balancer
            .assign(&flight("FL001", state(500_000, 500_000), WakeCategory::Medium), 0)
            .unwrap();
        assert_eq!(balancer.release("FL001", 5), Some(1));
        assert_eq!(balancer.release("FL001", 6), None);
        assert_eq!(balancer.workload(1).unwrap().aircraft_count(), 0);
        assert_eq!(balancer.workload(1).unwrap().complexity(), 0.0);
        assert!(balancer.aircraft_assignments().is_empty());
        assert_eq!(balancer.complexity_of("FL001"), None);
    }

    fn small_capacity_config() -> BalancerConfig {
        let mut config = BalancerConfig::default();
        config.default_capacity = SectorCapacity {
            max_aircraft: 4,
            max_complexity: 100.0,
        };
        config
    }

    #[test]
    fn rebalancing_drains_overloaded_sector_without_moving_positions() {
        let mut balancer = balancer_with(small_capacity_config());
        for i in 0..4 {
            balancer
                .assign(
                    &flight(&format!("FL{i:03}"), state(100_000 + i * 10_000, 500_000), WakeCategory::Medium),
                    0,
                )
                .unwrap();
        }
        assert_eq!(balancer.workload(1).unwrap().health(), SectorHealth::Critical);
        assert!(balancer.needs_rebalancing());

        let moves = balancer.perform_rebalancing(7);
        // 4/4 -> 3/4 (0.75, moderate) -> 2/4 (0.5, healthy)
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].aircraft_id, "FL000");
        assert_eq!(moves[0].previous_sector, Some(1));
        assert_eq!(moves[0].assigned_sector, 2);
        assert_eq!(moves[0].reason, AssignmentReason::LoadBalancing);
        assert_eq!(moves[0].priority, AssignmentPriority::Medium);
        assert_eq!(moves[0].logical_time_nanos, 7);
        assert!(moves[0].rationale.contains("overloaded sector 1 to underloaded sector 2"));
        // Sector 2 now sits at 0.25, so the 0.75 - 0.25 gap still clears 0.2
        assert_eq!(moves[1].aircraft_id, "FL001");
        assert_eq!(moves[1].assigned_sector, 2);

        assert_eq!(balancer.workload(1).unwrap().health(), SectorHealth::Healthy);
        assert_eq!(balancer.sector_of("FL000"), Some(2));
        assert_eq!(balancer.workload(2).unwrap().aircraft_ids(), &["FL000", "FL001"]);
        assert!(!balancer.needs_rebalancing());
        assert!(balancer.perform_rebalancing(8).is_empty());
    }

    #[test]
    fn rebalancing_respects_threshold_and_switch() {
        let mut config = small_capacity_config();
        config.load_balance_threshold = 1.0;
        let mut balancer = balancer_with(config);
        for i in 0..4 {
            balancer
                .assign(&flight(&format!("FL{i}"), state(100_000, 500_000), WakeCategory::Light), 0)
                .unwrap();
        }
        assert!(balancer.perform_rebalancing(1).is_empty());

        let mut config = small_capacity_config();
        config.auto_rebalancing = false;
        let mut balancer = balancer_with(config);
        for i in 0..4 {
            balancer
                .assign(&flight(&format!("FL{i}"), state(100_000, 500_000), WakeCategory::Light), 0)
                .unwrap();
        }
        assert!(balancer.perform_rebalancing(1).is_empty());
    }

    #[test]
    fn balance_stats_reflect_workloads() {
        let mut balancer = balancer();
        balancer
            .assign(&flight("FL001", state(500_000, 500_000), WakeCategory::Medium), 0)
            .unwrap();
        let stats = balancer.balance_stats();
        assert_eq!(stats.total_aircraft, 1);
        assert_eq!(stats.total_sectors(), 3);
        assert!((stats.average_aircraft_per_sector() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.system_health_score(), 1.0);
        assert!(stats.is_system_balanced());
        assert_eq!(stats.sectors_by_health()[&SectorHealth::Healthy], 3);
        assert_eq!(stats.most_loaded().unwrap().sector_id, 1);
        assert_eq!(stats.least_loaded().unwrap().sector_id, 2);
        assert!(stats.sectors_needing_attention().is_empty());

        let dist = stats.workload_distribution();
        assert_eq!(dist.min, 0.0);
        // Complexity utilization (about 0.055) outweighs the 1/20 count
        assert!(dist.max > 0.05);
        assert_eq!(dist.max, stats.sectors[0].utilization);
        assert_eq!(dist.range(), dist.max);
        assert!(dist.std_dev > 0.0);
        assert!(stats.summary().starts_with("1 aircraft across 3 sectors"));
        assert!(stats.sectors[0].to_string().contains("aircraft 1/20"));
    }

    #[test]
    fn heavy_complexity_gets_high_priority() {
        let calculator = ComplexityCalculator::new(ComplexityWeights {
            speed: 1.0,
            altitude: 1.0,
            wake: 1.0,
            ..ComplexityWeights::default()
        });
        let mut balancer = SectorBalancer::new(sectors(), BalancerConfig::default(), calculator).unwrap();
        let a = balancer
            .assign(&flight("FL001", state(500_000, 500_000), WakeCategory::Super), 0)
            .unwrap();
        assert!(a.complexity > AssignmentPriority::HIGH_COMPLEXITY);
        assert_eq!(a.priority, AssignmentPriority::High);
    }

    #[test]
    fn exported_state_restores_and_rejects_inconsistency() {
        let mut source = balancer();
        source
            .assign(&flight("FL001", state(500_000, 500_000), WakeCategory::Medium), 0)
            .unwrap();
        source
            .assign(&flight("FL002", state(1_500_000, 500_000), WakeCategory::Heavy), 0)
            .unwrap();

        let mut target = balancer();
        target.restore_state(source.export_state()).unwrap();
        assert_eq!(target.export_state(), source.export_state());

        let mut broken = source.export_state();
        broken.assignments.insert("GHOST".into(), 3);
        assert!(matches!(
            balancer().restore_state(broken),
            Err(AtcError::Invariant(_))
        ));

        let mut broken = source.export_state();
        broken.complexity.remove("FL002");
        assert!(matches!(
            balancer().restore_state(broken),
            Err(AtcError::Invariant(_))
        ));

        let mut broken = source.export_state();
        broken.workloads.pop();
        assert!(balancer().restore_state(broken).is_err());
    }

    #[test]
    fn clear_resets_workloads() {
        let mut balancer = balancer();
        balancer
            .assign(&flight("FL001", state(500_000, 500_000), WakeCategory::Medium), 0)
            .unwrap();
        balancer.clear();
        assert!(balancer.aircraft_assignments().is_empty());
        assert_eq!(balancer.complexity_of("FL001"), None);
        let fresh = self::balancer();
        assert_eq!(balancer.workloads(), fresh.workloads());
        assert_eq!(balancer.workloads().len(), sectors().len());
    }
}
