//! Deterministic scenario replay.
//!
//! Time advances in fixed 100 ms steps on the engine's logical clock:
//! a conflict pass every step, a rebalancing pass every 200 ms, and flight
//! motion plus a health pass every full second. Nothing reads the wall
//! clock, so two replays of the same scenario publish identical events.

use std::collections::BTreeMap;

use atc_core::{AtcEngine, AtcResult, EngineEvent, Flight, TimerKind, VecSink};

use super::scenarios::Scenario;

pub const BASE_STEP_MS: u64 = 100;
const STEP_NANOS: u64 = BASE_STEP_MS * 1_000_000;
const REBALANCE_EVERY: u64 = 2;
const SECOND_EVERY: u64 = 1_000 / BASE_STEP_MS;

/// Number of base steps that cover the scenario's duration.
pub fn total_steps(scenario: &Scenario) -> u64 {
    u64::from(scenario.duration_s) * SECOND_EVERY
}

pub struct Replay {
    engine: AtcEngine<VecSink>,
    step: u64,
}

impl Replay {
    /// Fresh engine with every scenario flight upserted at time zero.
    pub fn new(scenario: &Scenario) -> AtcResult<Self> {
        let sectors = scenario.layout.to_sectors()?;
        let mut engine = AtcEngine::new(scenario.engine.clone(), sectors, VecSink::default())?;
        for flight in scenario.to_flights()? {
            engine.upsert_flight(flight)?;
        }
        Ok(Self { engine, step: 0 })
    }

    /// Resume from snapshot bytes. The step counter is recovered from the
    /// snapshot's logical clock.
    pub fn from_snapshot(scenario: &Scenario, bytes: &[u8]) -> AtcResult<Self> {
        let sectors = scenario.layout.to_sectors()?;
        let engine =
            AtcEngine::restore(scenario.engine.clone(), sectors, VecSink::default(), bytes)?;
        let step = engine.now() / STEP_NANOS;
        Ok(Self { engine, step })
    }

    pub fn current_step(&self) -> u64 {
        self.step
    }

    pub fn engine(&self) -> &AtcEngine<VecSink> {
        &self.engine
    }

    pub fn step(&mut self) -> AtcResult<()> {
        self.step += 1;
        let now = self.step * STEP_NANOS;

        self.engine.tick(now, TimerKind::ConflictDetection.correlation_id())?;
        let whole_second = self.step % SECOND_EVERY == 0;
        if whole_second {
            self.move_flights()?;
        }
        if self.step % REBALANCE_EVERY == 0 {
            self.engine.tick(now, TimerKind::Rebalancing.correlation_id())?;
        }
        if whole_second {
            self.engine.tick(now, TimerKind::HealthCheck.correlation_id())?;
        }
        Ok(())
    }

    pub fn run_until(&mut self, last_step: u64) -> AtcResult<()> {
        while self.step < last_step {
            self.step()?;
        }
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        self.engine.sink_mut().take()
    }

    pub fn snapshot(&self) -> AtcResult<Vec<u8>> {
        self.engine.snapshot()
    }

    /// One second of straight-line motion for every flight, re-upserted so
    /// the balancer sees the new position.
    fn move_flights(&mut self) -> AtcResult<()> {
        let flights: Vec<Flight> = self.engine.registry().flights().cloned().collect();
        for mut flight in flights {
            flight.state_mut().advance(1);
            self.engine.upsert_flight(flight)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub scenario: String,
    pub steps: u64,
    pub events: Vec<EngineEvent>,
    pub final_snapshot: Vec<u8>,
}

impl ReplayReport {
    pub fn count_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Largest number of simultaneous conflicts seen in any pass.
    pub fn peak_conflicts(&self) -> usize {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Conflicts { conflicts, .. } => Some(conflicts.len()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Assignments that moved an aircraft between sectors.
    pub fn sector_moves(&self) -> usize {
        self.events
            .iter()
            .filter(|e| match e {
                EngineEvent::Assignment(a) => a.is_sector_change(),
                _ => false,
            })
            .count()
    }

    pub fn summary(&self) -> String {
        let kinds = self
            .count_by_kind()
            .iter()
            .map(|(kind, n)| format!("{kind}={n}"))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "{}: {} steps, {} events ({kinds}), peak conflicts {}, sector moves {}",
            self.scenario,
            self.steps,
            self.events.len(),
            self.peak_conflicts(),
            self.sector_moves()
        )
    }
}

pub fn run(scenario: &Scenario) -> AtcResult<ReplayReport> {
    let mut replay = Replay::new(scenario)?;
    let steps = total_steps(scenario);
    replay.run_until(steps)?;
    let report = ReplayReport {
        scenario: scenario.name.clone(),
        steps,
        events: replay.take_events(),
        final_snapshot: replay.snapshot()?,
    };
    tracing::info!(
        scenario = %scenario.name,
        steps,
        events = report.events.len(),
        "Replay finished"
    );
    Ok(report)
}

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub split_step: u64,
    pub events_compared: usize,
    /// Index of the first event after the split that differs
    pub first_divergence: Option<usize>,
    pub snapshots_match: bool,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.first_divergence.is_none() && self.snapshots_match
    }
}

/// Replay the scenario once straight through and once with a snapshot
/// transfer at the midpoint, then compare everything published after the
/// split and the final engine state.
pub fn verify(scenario: &Scenario) -> AtcResult<VerifyReport> {
    let steps = total_steps(scenario);
    let split_step = steps / 2;

    let mut primary = Replay::new(scenario)?;
    primary.run_until(split_step)?;
    let bytes = primary.snapshot()?;
    primary.take_events();
    primary.run_until(steps)?;
    let expected = primary.take_events();

    let mut replica = Replay::from_snapshot(scenario, &bytes)?;
    replica.run_until(steps)?;
    let actual = replica.take_events();

    let first_divergence = first_difference(&expected, &actual)?;
    let snapshots_match = primary.snapshot()? == replica.snapshot()?;
    if let Some(index) = first_divergence {
        tracing::warn!(
            scenario = %scenario.name,
            index,
            "Replica diverged after snapshot transfer"
        );
    }

    Ok(VerifyReport {
        split_step,
        events_compared: expected.len().max(actual.len()),
        first_divergence,
        snapshots_match,
    })
}

/// Events are compared through their serialized form.
fn first_difference(expected: &[EngineEvent], actual: &[EngineEvent]) -> AtcResult<Option<usize>> {
    for i in 0..expected.len().max(actual.len()) {
        let (Some(a), Some(b)) = (expected.get(i), actual.get(i)) else {
            return Ok(Some(i));
        };
        if serde_json::to_value(a)? != serde_json::to_value(b)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scenarios::{
        create_crossing_scenario, create_overload_scenario, create_parallel_scenario,
        create_random_scenario,
    };

    #[test]
    fn step_schedule_matches_the_timers() {
        let mut replay = Replay::new(&create_parallel_scenario()).unwrap();
        replay.take_events();
        replay.run_until(10).unwrap();
        let counts = ReplayReport {
            scenario: String::new(),
            steps: 10,
            events: replay.take_events(),
            final_snapshot: Vec::new(),
        }
        .count_by_kind();

        assert_eq!(counts["conflicts"], 10);
        assert_eq!(counts["conflict_stats"], 1);
        assert_eq!(counts["balance_stats"], 1);
        // Two flights re-upserted once, at the one second mark
        assert_eq!(counts["assignment"], 2);
        assert_eq!(replay.engine().now(), 1_000_000_000);
    }

    #[test]
    fn crossing_scenario_reports_a_conflict() {
        let report = run(&create_crossing_scenario()).unwrap();
        assert!(report.peak_conflicts() >= 1);
    }

    #[test]
    fn parallel_scenario_stays_clear() {
        let report = run(&create_parallel_scenario()).unwrap();
        assert_eq!(report.peak_conflicts(), 0);
    }

    #[test]
    fn overload_scenario_moves_aircraft_out() {
        let report = run(&create_overload_scenario()).unwrap();
        assert!(report.sector_moves() > 0, "{}", report.summary());
    }

    #[test]
    fn replays_are_deterministic() {
        let scenario = create_random_scenario(11, 15, 5).unwrap();
        let a = run(&scenario).unwrap();
        let b = run(&scenario).unwrap();
        assert_eq!(a.final_snapshot, b.final_snapshot);
        assert_eq!(first_difference(&a.events, &b.events).unwrap(), None);
    }

    #[test]
    fn snapshot_transfer_is_consistent() {
        for scenario in [create_overload_scenario(), create_random_scenario(5, 20, 6).unwrap()] {
            let report = verify(&scenario).unwrap();
            assert!(report.is_consistent(), "{}: {report:?}", scenario.name);
            assert!(report.events_compared > 0);
        }
    }

    #[test]
    fn resumed_replay_picks_up_the_step() {
        let scenario = create_parallel_scenario();
        let mut replay = Replay::new(&scenario).unwrap();
        replay.run_until(7).unwrap();
        let resumed = Replay::from_snapshot(&scenario, &replay.snapshot().unwrap()).unwrap();
        assert_eq!(resumed.current_step(), 7);
    }
}
