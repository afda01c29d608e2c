//! Scenario files and the pre-defined traffic scenarios.
//!
//! A scenario is plain JSON. Flights are written in meters, knots and feet
//! and are rebuilt through the validating domain constructors when loaded,
//! so a hand-edited file with an inverted constraint fails at load time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use atc_core::spatial::{from_meters, to_meters};
use atc_core::{
    AircraftPerformance, AircraftState, AltitudeConstraints, AltitudeUnit, AtcResult,
    EngineConfig, Flight, FlightIntent, SectorCapacity, SpeedConstraints, SpeedUnit,
    WakeCategory, Waypoint,
};
use atc_node::{SectorLayout, TrafficGenerator};

/// A complete, replayable scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub engine: EngineConfig,
    pub layout: SectorLayout,
    pub flights: Vec<FlightSpec>,
    /// Simulated run length
    #[serde(default = "default_duration_s")]
    pub duration_s: u32,
}

fn default_duration_s() -> u32 {
    60
}

impl Scenario {
    pub fn to_flights(&self) -> AtcResult<Vec<Flight>> {
        self.flights.iter().map(FlightSpec::to_flight).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSpec {
    pub aircraft_type: String,
    pub wake: WakeCategory,
    pub climb_fpm: f64,
    pub descent_fpm: f64,
    pub max_speed_kt: f64,
    pub min_speed_kt: f64,
    pub max_altitude_ft: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointSpec {
    pub name: String,
    pub x_m: f64,
    pub y_m: f64,
    pub altitude_m: f64,
}

/// `min <= target <= max`, in knots for speed and feet for altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSpec {
    pub min: f64,
    pub max: f64,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSpec {
    pub id: String,
    pub performance: PerformanceSpec,
    pub x_m: f64,
    pub y_m: f64,
    pub altitude_m: f64,
    pub vx_mps: f64,
    pub vy_mps: f64,
    #[serde(default)]
    pub waypoints: Vec<WaypointSpec>,
    pub speed_kt: BandSpec,
    pub altitude_ft: BandSpec,
    #[serde(default)]
    pub departure_procedure: Option<String>,
    #[serde(default)]
    pub arrival_procedure: Option<String>,
}

impl FlightSpec {
    pub fn to_flight(&self) -> AtcResult<Flight> {
        let p = &self.performance;
        let performance = Arc::new(AircraftPerformance::new(
            p.aircraft_type.clone(),
            p.wake,
            p.climb_fpm,
            p.descent_fpm,
            p.max_speed_kt,
            p.min_speed_kt,
            p.max_altitude_ft,
        )?);
        let waypoints = self
            .waypoints
            .iter()
            .map(|w| Waypoint::new(w.name.clone(), w.x_m, w.y_m, w.altitude_m))
            .collect::<AtcResult<Vec<_>>>()?;
        let intent = FlightIntent::new(
            waypoints,
            SpeedConstraints::new(
                self.speed_kt.min,
                self.speed_kt.max,
                self.speed_kt.target,
                SpeedUnit::Knots,
            )?,
            AltitudeConstraints::new(
                self.altitude_ft.min,
                self.altitude_ft.max,
                self.altitude_ft.target,
                AltitudeUnit::Feet,
            )?,
            self.departure_procedure.clone(),
            self.arrival_procedure.clone(),
        )?;
        let state = AircraftState::new(
            from_meters(self.x_m),
            from_meters(self.y_m),
            from_meters(self.vx_mps),
            from_meters(self.vy_mps),
            from_meters(self.altitude_m),
        );
        Flight::new(self.id.clone(), state, intent, performance)
    }
}

impl From<&Flight> for FlightSpec {
    fn from(flight: &Flight) -> Self {
        let p = flight.performance();
        let intent = flight.intent();
        let state = flight.state();
        Self {
            id: flight.flight_id().to_string(),
            performance: PerformanceSpec {
                aircraft_type: p.aircraft_type().to_string(),
                wake: p.wake_category(),
                climb_fpm: p.max_climb_rate_fpm(),
                descent_fpm: p.max_descent_rate_fpm(),
                max_speed_kt: p.max_speed_kt(),
                min_speed_kt: p.min_speed_kt(),
                max_altitude_ft: p.max_altitude_ft(),
            },
            x_m: state.position_x_m(),
            y_m: state.position_y_m(),
            altitude_m: state.altitude_m(),
            vx_mps: to_meters(state.velocity_x),
            vy_mps: to_meters(state.velocity_y),
            waypoints: intent
                .waypoints()
                .iter()
                .map(|w| WaypointSpec {
                    name: w.name.clone(),
                    x_m: w.x_m,
                    y_m: w.y_m,
                    altitude_m: w.altitude_m,
                })
                .collect(),
            speed_kt: BandSpec {
                min: intent.speed_constraints().min(),
                max: intent.speed_constraints().max(),
                target: intent.speed_constraints().target(),
            },
            altitude_ft: BandSpec {
                min: intent.altitude_constraints().min_feet(),
                max: intent.altitude_constraints().max_feet(),
                target: intent.altitude_constraints().target_feet(),
            },
            departure_procedure: intent.departure_procedure().map(str::to_string),
            arrival_procedure: intent.arrival_procedure().map(str::to_string),
        }
    }
}

fn airliner(wake: WakeCategory) -> PerformanceSpec {
    PerformanceSpec {
        aircraft_type: "A320".to_string(),
        wake,
        climb_fpm: 2500.0,
        descent_fpm: 3000.0,
        max_speed_kt: 470.0,
        min_speed_kt: 130.0,
        max_altitude_ft: 39000.0,
    }
}

/// Level cruise flight at 9 km with no procedures.
fn cruiser(
    id: &str,
    wake: WakeCategory,
    x_m: f64,
    y_m: f64,
    vx_mps: f64,
    vy_mps: f64,
) -> FlightSpec {
    FlightSpec {
        id: id.to_string(),
        performance: airliner(wake),
        x_m,
        y_m,
        altitude_m: 9_000.0,
        vx_mps,
        vy_mps,
        waypoints: Vec::new(),
        speed_kt: BandSpec {
            min: 250.0,
            max: 450.0,
            target: 300.0,
        },
        altitude_ft: BandSpec {
            min: 28_000.0,
            max: 32_000.0,
            target: 29_500.0,
        },
        departure_procedure: None,
        arrival_procedure: None,
    }
}

/// Two aircraft head-on along y = 25 km, closing at 400 m/s.
pub fn create_crossing_scenario() -> Scenario {
    Scenario {
        name: "crossing".to_string(),
        engine: EngineConfig::default(),
        layout: SectorLayout::default_grid(),
        flights: vec![
            cruiser("AC001", WakeCategory::Medium, 10_000.0, 25_000.0, 200.0, 0.0),
            cruiser("AC002", WakeCategory::Heavy, 40_000.0, 25_000.0, -200.0, 0.0),
        ],
        duration_s: 60,
    }
}

/// Two aircraft on parallel tracks 20 km apart; never in conflict.
pub fn create_parallel_scenario() -> Scenario {
    Scenario {
        name: "parallel".to_string(),
        engine: EngineConfig::default(),
        layout: SectorLayout::default_grid(),
        flights: vec![
            cruiser("AC001", WakeCategory::Medium, 5_000.0, 20_000.0, 150.0, 0.0),
            cruiser("AC002", WakeCategory::Medium, 5_000.0, 40_000.0, 150.0, 0.0),
        ],
        duration_s: 60,
    }
}

/// Sector 1 receives more aircraft than it can hold, so rebalancing moves
/// some of them into the empty neighbours.
pub fn create_overload_scenario() -> Scenario {
    let mut engine = EngineConfig::default();
    engine.balancer.default_capacity = SectorCapacity {
        max_aircraft: 6,
        max_complexity: 100.0,
    };
    let flights = (0..8)
        .map(|i| {
            let offset = i as f64 * 4_000.0;
            cruiser(
                &format!("AC{:03}", i + 1),
                WakeCategory::Light,
                5_000.0 + offset,
                10_000.0 + offset,
                20.0,
                0.0,
            )
        })
        .collect();
    Scenario {
        name: "overload".to_string(),
        engine,
        layout: SectorLayout::default_grid(),
        flights,
        duration_s: 10,
    }
}

/// `count` seeded random flights over the default grid.
pub fn create_random_scenario(seed: u64, count: usize, duration_s: u32) -> AtcResult<Scenario> {
    let layout = SectorLayout::default_grid();
    let extent = layout.extent_m().unwrap_or((0.0, 0.0, 100_000.0, 100_000.0));
    let mut generator = TrafficGenerator::new(seed, extent)?;
    let flights = (0..count)
        .map(|_| generator.spawn().map(|f| FlightSpec::from(&f)))
        .collect::<AtcResult<Vec<_>>>()?;
    Ok(Scenario {
        name: format!("random-{seed}"),
        engine: EngineConfig::default(),
        layout,
        flights,
        duration_s,
    })
}
