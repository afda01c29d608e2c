//! End-to-end engine scenarios through the public API.

use std::sync::Arc;

use atc_core::spatial::{from_meters, to_meters};
use atc_core::{
    AircraftPerformance, AircraftState, AltitudeConstraints, AltitudeUnit, AssignmentReason,
    AtcEngine, ConflictSeverity, EngineConfig, EngineEvent, Flight, FlightIntent, NullSink,
    Sector, SectorCapacity, SectorHealth, SectorWorkload, SeparationConfig, SpeedConstraints,
    SpeedUnit, TickOutcome, TimerKind, VecSink, WakeCategory, Waypoint,
};

fn performance(wake: WakeCategory) -> Arc<AircraftPerformance> {
    Arc::new(AircraftPerformance::new("A320", wake, 2500.0, 3000.0, 450.0, 140.0, 39000.0).unwrap())
}

fn cruise_intent() -> FlightIntent {
    FlightIntent::new(
        vec![
            Waypoint::new("ALPHA", 20_000.0, 5_000.0, 9_000.0).unwrap(),
            Waypoint::new("BRAVO", 40_000.0, 5_000.0, 9_000.0).unwrap(),
        ],
        SpeedConstraints::new(250.0, 450.0, 300.0, SpeedUnit::Knots).unwrap(),
        AltitudeConstraints::new(280.0, 350.0, 330.0, AltitudeUnit::FlightLevel).unwrap(),
        None,
        None,
    )
    .unwrap()
}

fn flight(id: &str, x_m: f64, y_m: f64, alt_m: f64, wake: WakeCategory) -> Flight {
    let state = AircraftState::new(
        (x_m * 100.0) as i64,
        (y_m * 100.0) as i64,
        5000,
        10000,
        (alt_m * 100.0) as i64,
    );
    Flight::new(id, state, cruise_intent(), performance(wake)).unwrap()
}

fn grid() -> Vec<Sector> {
    vec![
        Sector::new(1, 0, 0, 1_000_000, 1_000_000, 0, 5_000_000).unwrap(),
        Sector::new(2, 1_000_000, 0, 2_000_000, 1_000_000, 0, 5_000_000).unwrap(),
        Sector::new(3, 0, 1_000_000, 1_000_000, 2_000_000, 0, 5_000_000).unwrap(),
    ]
}

fn engine() -> AtcEngine<VecSink> {
    AtcEngine::new(EngineConfig::default(), grid(), VecSink::default()).unwrap()
}

#[test]
fn close_medium_pair_is_a_high_severity_conflict() {
    let mut engine = engine();
    engine.upsert_flight(flight("FL001", 1000.0, 2000.0, 30_000.0, WakeCategory::Medium)).unwrap();
    engine.upsert_flight(flight("FL002", 1500.0, 2500.0, 30_005.0, WakeCategory::Medium)).unwrap();

    let TickOutcome::Conflicts(conflicts) =
        engine.tick(100_000_000, TimerKind::ConflictDetection.correlation_id()).unwrap()
    else {
        panic!("expected conflict pass");
    };
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, ConflictSeverity::High);
    assert!((conflicts[0].distance_m - 707.1).abs() < 0.1);
}

#[test]
fn cruise_scaled_pair_five_centimeters_apart_vertically_conflicts() {
    let intent = cruise_intent();
    let at = |id: &str, x: i64, y: i64, altitude: i64| {
        let state = AircraftState::new(x, y, 5000, 10000, altitude);
        Flight::new(id, state, intent.clone(), performance(WakeCategory::Medium)).unwrap()
    };
    let a = at("FL001", from_meters(1000.0), from_meters(2000.0), 30_000);
    let b = at("FL002", from_meters(1500.0), from_meters(2500.0), 30_005);

    let vertical = b.vertical_distance_m(&a);
    assert!((vertical - 0.05).abs() < 1e-9, "vertical {vertical}");
    assert_eq!(from_meters(to_meters(30_005)), 30_005);
    assert!((a.horizontal_distance_m(&b) - 707.1).abs() < 0.1);

    let mut engine = engine();
    engine.upsert_flight(a).unwrap();
    engine.upsert_flight(b).unwrap();
    let conflicts = engine.registry().detect_all();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, ConflictSeverity::High);
    assert!(conflicts[0].involves("FL001") && conflicts[0].involves("FL002"));
}

#[test]
fn pair_seven_km_apart_is_clear_under_standard_minima() {
    let mut config = EngineConfig::default();
    // Flatten the wake table to the 3 NM standard
    config.separation = SeparationConfig {
        wake_horizontal_nm: [3.0; 4],
        ..SeparationConfig::default()
    };
    let mut engine = AtcEngine::new(config, grid(), NullSink).unwrap();
    engine.upsert_flight(flight("FL001", 1000.0, 2000.0, 30_000.0, WakeCategory::Medium)).unwrap();
    engine.upsert_flight(flight("FL002", 6000.0, 7000.0, 30_005.0, WakeCategory::Medium)).unwrap();
    assert!(engine.registry().detect_all().is_empty());
}

#[test]
fn aircraft_outside_all_sectors_goes_to_nearest_center() {
    let mut engine = engine();
    let assignment = engine
        .upsert_flight(flight("FL009", 25_000.0, 25_000.0, 30_000.0, WakeCategory::Light))
        .unwrap();
    // Centers: 1 at (5,5) km, 2 at (15,5) km, 3 at (5,15) km. 2 and 3 tie at
    // equal distance, so the lower id wins.
    assert_eq!(assignment.assigned_sector(), 2);
    assert_eq!(assignment.reason(), AssignmentReason::InitialAssignment);
}

#[test]
fn repeated_upsert_is_idempotent() {
    let mut engine = engine();
    let first = engine
        .upsert_flight(flight("FL001", 5000.0, 5000.0, 30_000.0, WakeCategory::Medium))
        .unwrap();
    let second = engine
        .upsert_flight(flight("FL001", 5000.0, 5000.0, 30_000.0, WakeCategory::Medium))
        .unwrap();
    assert_eq!(second.reason(), AssignmentReason::Optimization);
    assert_eq!(second.assigned_sector(), first.assigned_sector());
    let workload = engine.balancer().workload(first.assigned_sector()).unwrap();
    assert_eq!(workload.aircraft_count(), 1);
    assert!((workload.complexity() - first.complexity()).abs() < 1e-9);
}

#[test]
fn accumulated_complexity_of_eighty_is_high() {
    let mut workload = SectorWorkload::new(1, SectorCapacity::default()).unwrap();
    workload.add_aircraft("A", 25.0, 0);
    workload.add_aircraft("B", 25.0, 0);
    workload.add_aircraft("C", 30.0, 0);
    assert_eq!(workload.utilization(), 0.8);
    assert_eq!(workload.health(), SectorHealth::High);
}

#[test]
fn full_tick_cycle_publishes_in_order() {
    let mut engine = engine();
    engine.upsert_flight(flight("FL001", 1000.0, 2000.0, 30_000.0, WakeCategory::Heavy)).unwrap();
    engine.upsert_flight(flight("FL002", 1500.0, 2500.0, 30_005.0, WakeCategory::Medium)).unwrap();
    engine.sink_mut().take();

    for (i, timer) in TimerKind::ALL.into_iter().enumerate() {
        engine.tick((i as u64 + 1) * 1_000, timer.correlation_id()).unwrap();
    }
    let kinds: Vec<&str> = engine.sink().events().iter().map(EngineEvent::kind).collect();
    assert_eq!(kinds, ["conflicts", "conflict_stats", "balance_stats"]);
    assert_eq!(engine.now(), 3_000);
}
