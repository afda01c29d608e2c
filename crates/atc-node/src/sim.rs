//! Seeded synthetic traffic.
//!
//! Flights fly straight lines at constant velocity across the layout's
//! extent. Generation is driven entirely by the seed, so two generators
//! with the same seed and extent produce the same traffic.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use atc_core::spatial::from_meters;
use atc_core::{
    AircraftPerformance, AircraftState, AltitudeConstraints, AltitudeUnit, AtcResult, Flight,
    FlightIntent, SpeedConstraints, SpeedUnit, WakeCategory, Waypoint,
};

/// (type, wake, climb fpm, descent fpm, max kt, min kt, ceiling ft)
const FLEET: [(&str, WakeCategory, f64, f64, f64, f64, f64); 4] = [
    ("C172", WakeCategory::Light, 700.0, 500.0, 160.0, 50.0, 14000.0),
    ("A320", WakeCategory::Medium, 2500.0, 3000.0, 470.0, 130.0, 39000.0),
    ("B77W", WakeCategory::Heavy, 2000.0, 2500.0, 510.0, 150.0, 43000.0),
    ("A388", WakeCategory::Super, 1500.0, 2000.0, 510.0, 160.0, 43000.0),
];

/// Relative frequency of each `FLEET` entry.
const FLEET_WEIGHTS: [u32; 4] = [2, 10, 4, 1];

pub struct TrafficGenerator {
    rng: StdRng,
    /// (min_x, min_y, max_x, max_y) in meters
    extent: (f64, f64, f64, f64),
    fleet: Vec<Arc<AircraftPerformance>>,
    next_id: u64,
}

impl TrafficGenerator {
    pub fn new(seed: u64, extent: (f64, f64, f64, f64)) -> AtcResult<Self> {
        let fleet = FLEET
            .iter()
            .map(|&(name, wake, climb, descent, max_kt, min_kt, ceiling)| {
                AircraftPerformance::new(name, wake, climb, descent, max_kt, min_kt, ceiling)
                    .map(Arc::new)
            })
            .collect::<AtcResult<Vec<_>>>()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            extent,
            fleet,
            next_id: 1,
        })
    }

    /// A new flight somewhere inside the extent.
    pub fn spawn(&mut self) -> AtcResult<Flight> {
        let (min_x, min_y, max_x, max_y) = self.extent;
        let x_m = self.rng.random_range(min_x..=max_x);
        let y_m = self.rng.random_range(min_y..=max_y);
        let altitude_m = self.rng.random_range(1_000.0..12_000.0);
        let heading = self.rng.random_range(0.0..std::f64::consts::TAU);
        let speed_mps = self.rng.random_range(60.0..250.0);
        let performance = Arc::clone(self.pick_type());

        let state = AircraftState::new(
            from_meters(x_m),
            from_meters(y_m),
            from_meters(speed_mps * heading.cos()),
            from_meters(speed_mps * heading.sin()),
            from_meters(altitude_m),
        );

        let legs = self.rng.random_range(0..5);
        let waypoints = (1..=legs)
            .map(|i| {
                let ahead = i as f64 * 10_000.0;
                Waypoint::new(
                    format!("WP{i}"),
                    x_m + ahead * heading.cos(),
                    y_m + ahead * heading.sin(),
                    altitude_m,
                )
            })
            .collect::<AtcResult<Vec<_>>>()?;
        let max_kt = performance.max_speed_kt();
        let min_kt = performance.min_speed_kt();
        let ceiling_ft = performance.max_altitude_ft();
        let intent = FlightIntent::new(
            waypoints,
            SpeedConstraints::new(min_kt, max_kt, (min_kt + max_kt) / 2.0, SpeedUnit::Knots)?,
            AltitudeConstraints::new(0.0, ceiling_ft, ceiling_ft * 0.8, AltitudeUnit::Feet)?,
            self.rng.random_bool(0.3).then(|| "SID1".to_string()),
            self.rng.random_bool(0.3).then(|| "STAR1".to_string()),
        )?;

        let id = format!("SIM{:04}", self.next_id);
        self.next_id += 1;
        Flight::new(id, state, intent, performance)
    }

    pub fn contains(&self, flight: &Flight) -> bool {
        let (min_x, min_y, max_x, max_y) = self.extent;
        let state = flight.state();
        (min_x..=max_x).contains(&state.position_x_m())
            && (min_y..=max_y).contains(&state.position_y_m())
    }

    fn pick_type(&mut self) -> &Arc<AircraftPerformance> {
        let total: u32 = FLEET_WEIGHTS.iter().sum();
        let mut roll = self.rng.random_range(0..total);
        for (performance, weight) in self.fleet.iter().zip(FLEET_WEIGHTS) {
            if roll < weight {
                return performance;
            }
            roll -= weight;
        }
        &self.fleet[self.fleet.len() - 1]
    }
}
