//! Core data models: aircraft state, flight intent and the flight aggregate.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{validation, AtcResult};
use crate::rules::{AircraftPerformance, SeparationMinima};
use crate::sector::SectorId;
use crate::spatial::{self, Position3, FEET_PER_METER};

/// Kinematic state of an aircraft in scaled units (cm, cm/s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftState {
    pub position_x: i64,
    pub position_y: i64,
    pub velocity_x: i64,
    pub velocity_y: i64,
    pub altitude: i64,
    /// Sector the balancer last placed this aircraft in
    #[serde(default)]
    pub sector_id: Option<SectorId>,
}

impl AircraftState {
    pub fn new(
        position_x: i64,
        position_y: i64,
        velocity_x: i64,
        velocity_y: i64,
        altitude: i64,
    ) -> Self {
        Self {
            position_x,
            position_y,
            velocity_x,
            velocity_y,
            altitude,
            sector_id: None,
        }
    }

    pub fn with_sector(mut self, sector_id: SectorId) -> Self {
        self.sector_id = Some(sector_id);
        self
    }

    pub fn position(&self) -> Position3 {
        Position3::new(self.position_x, self.position_y, self.altitude)
    }

    pub fn position_x_m(&self) -> f64 {
        spatial::to_meters(self.position_x)
    }

    pub fn position_y_m(&self) -> f64 {
        spatial::to_meters(self.position_y)
    }

    pub fn velocity_x_mps(&self) -> f64 {
        spatial::to_meters(self.velocity_x)
    }

    pub fn velocity_y_mps(&self) -> f64 {
        spatial::to_meters(self.velocity_y)
    }

    pub fn altitude_m(&self) -> f64 {
        spatial::to_meters(self.altitude)
    }

    pub fn ground_speed_mps(&self) -> f64 {
        spatial::planar_distance(self.velocity_x_mps(), self.velocity_y_mps(), 0.0, 0.0)
    }

    /// Advance the position along the current velocity (constant-velocity
    /// extrapolation), in integer arithmetic.
    pub fn advance(&mut self, delta_secs: i64) {
        self.position_x = self
            .position_x
            .saturating_add(self.velocity_x.saturating_mul(delta_secs));
        self.position_y = self
            .position_y
            .saturating_add(self.velocity_y.saturating_mul(delta_secs));
    }

    /// Millisecond variant of [`AircraftState::advance`]. Each displacement
    /// is truncated toward zero to whole scaled units.
    pub fn advance_millis(&mut self, delta_ms: i64) {
        let step = |velocity: i64| {
            let moved = i128::from(velocity) * i128::from(delta_ms) / 1000;
            i64::try_from(moved).unwrap_or(if moved < 0 { i64::MIN } else { i64::MAX })
        };
        self.position_x = self.position_x.saturating_add(step(self.velocity_x));
        self.position_y = self.position_y.saturating_add(step(self.velocity_y));
    }
}

/// A navigation waypoint in 3D space (meters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub x_m: f64,
    pub y_m: f64,
    pub altitude_m: f64,
}

impl Waypoint {
    pub fn new(name: impl Into<String>, x_m: f64, y_m: f64, altitude_m: f64) -> AtcResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(validation("waypoint name cannot be empty"));
        }
        if ![x_m, y_m, altitude_m].iter().all(|v| v.is_finite()) {
            return Err(validation(format!("waypoint {name} has non-finite coordinates")));
        }
        Ok(Self {
            name,
            x_m,
            y_m,
            altitude_m,
        })
    }

    pub fn distance_to(&self, other: &Waypoint) -> f64 {
        let dz = self.altitude_m - other.altitude_m;
        let h = self.horizontal_distance_to(other);
        (h * h + dz * dz).sqrt()
    }

    pub fn horizontal_distance_to(&self, other: &Waypoint) -> f64 {
        spatial::planar_distance(self.x_m, self.y_m, other.x_m, other.y_m)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeedUnit {
    Knots,
    Mach,
    Kph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AltitudeUnit {
    Feet,
    Meters,
    FlightLevel,
}

fn check_band(kind: &str, min: f64, max: f64, target: f64) -> AtcResult<()> {
    if ![min, max, target].iter().all(|v| v.is_finite()) {
        return Err(validation(format!("{kind} constraint values must be finite")));
    }
    if min > max {
        return Err(validation(format!(
            "min {kind} ({min}) cannot be greater than max {kind} ({max})"
        )));
    }
    if target < min || target > max {
        return Err(validation(format!(
            "target {kind} ({target}) must be within [{min}, {max}]"
        )));
    }
    Ok(())
}

/// Signed adjustment that brings `value` back into `[min, max]`.
fn band_adjustment(min: f64, max: f64, value: f64) -> f64 {
    if value < min {
        min - value
    } else if value > max {
        max - value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedConstraints {
    min: f64,
    max: f64,
    target: f64,
    unit: SpeedUnit,
}

impl SpeedConstraints {
    pub fn new(min: f64, max: f64, target: f64, unit: SpeedUnit) -> AtcResult<Self> {
        check_band("speed", min, max, target)?;
        Ok(Self { min, max, target, unit })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn unit(&self) -> SpeedUnit {
        self.unit
    }

    pub fn is_valid(&self, speed: f64) -> bool {
        (self.min..=self.max).contains(&speed)
    }

    /// Positive to speed up, negative to slow down.
    pub fn recommended_adjustment(&self, speed: f64) -> f64 {
        band_adjustment(self.min, self.max, speed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeConstraints {
    min: f64,
    max: f64,
    target: f64,
    unit: AltitudeUnit,
}

impl AltitudeConstraints {
    pub fn new(min: f64, max: f64, target: f64, unit: AltitudeUnit) -> AtcResult<Self> {
        check_band("altitude", min, max, target)?;
        Ok(Self { min, max, target, unit })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn unit(&self) -> AltitudeUnit {
        self.unit
    }

    pub fn is_valid(&self, altitude: f64) -> bool {
        (self.min..=self.max).contains(&altitude)
    }

    /// Positive to climb, negative to descend.
    pub fn recommended_adjustment(&self, altitude: f64) -> f64 {
        band_adjustment(self.min, self.max, altitude)
    }

    pub fn min_feet(&self) -> f64 {
        self.to_feet(self.min)
    }

    pub fn max_feet(&self) -> f64 {
        self.to_feet(self.max)
    }

    pub fn target_feet(&self) -> f64 {
        self.to_feet(self.target)
    }

    fn to_feet(&self, value: f64) -> f64 {
        match self.unit {
            AltitudeUnit::Feet => value,
            AltitudeUnit::Meters => value * FEET_PER_METER,
            AltitudeUnit::FlightLevel => value * 100.0,
        }
    }
}

/// Planned route and operational constraints for a flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightIntent {
    waypoints: Vec<Waypoint>,
    speed: SpeedConstraints,
    altitude: AltitudeConstraints,
    /// Standard instrument departure
    #[serde(default)]
    departure_procedure: Option<String>,
    /// Standard terminal arrival route
    #[serde(default)]
    arrival_procedure: Option<String>,
}

impl FlightIntent {
    pub fn new(
        waypoints: Vec<Waypoint>,
        speed: SpeedConstraints,
        altitude: AltitudeConstraints,
        departure_procedure: Option<String>,
        arrival_procedure: Option<String>,
    ) -> AtcResult<Self> {
        let blank = |p: &Option<String>| p.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&departure_procedure) || blank(&arrival_procedure) {
            return Err(validation("procedure identifiers cannot be blank"));
        }
        Ok(Self {
            waypoints,
            speed,
            altitude,
            departure_procedure,
            arrival_procedure,
        })
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn speed_constraints(&self) -> &SpeedConstraints {
        &self.speed
    }

    pub fn altitude_constraints(&self) -> &AltitudeConstraints {
        &self.altitude
    }

    pub fn departure_procedure(&self) -> Option<&str> {
        self.departure_procedure.as_deref()
    }

    pub fn arrival_procedure(&self) -> Option<&str> {
        self.arrival_procedure.as_deref()
    }

    pub fn is_departing(&self) -> bool {
        !self.waypoints.is_empty() && self.departure_procedure.is_some()
    }

    pub fn is_arriving(&self) -> bool {
        !self.waypoints.is_empty() && self.arrival_procedure.is_some()
    }

    /// First waypoint ahead of the given position on either axis, falling
    /// back to the final waypoint.
    pub fn next_waypoint(&self, x_m: f64, y_m: f64) -> Option<&Waypoint> {
        self.waypoints
            .iter()
            .find(|wp| wp.x_m > x_m || wp.y_m > y_m)
            .or_else(|| self.waypoints.last())
    }
}

/// A flight: state, intent, performance and bookkeeping, keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    flight_id: String,
    state: AircraftState,
    intent: FlightIntent,
    performance: Arc<AircraftPerformance>,
    /// Logical time (ns) of the last upsert
    #[serde(default)]
    last_update_nanos: u64,
}

impl Flight {
    pub fn new(
        flight_id: impl Into<String>,
        state: AircraftState,
        intent: FlightIntent,
        performance: Arc<AircraftPerformance>,
    ) -> AtcResult<Self> {
        let flight_id = flight_id.into();
        if flight_id.trim().is_empty() {
            return Err(validation("flight id cannot be empty"));
        }
        Ok(Self {
            flight_id,
            state,
            intent,
            performance,
            last_update_nanos: 0,
        })
    }

    pub fn with_last_update(mut self, nanos: u64) -> Self {
        self.last_update_nanos = nanos;
        self
    }

    pub fn flight_id(&self) -> &str {
        &self.flight_id
    }

    pub fn state(&self) -> &AircraftState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AircraftState {
        &mut self.state
    }

    pub fn intent(&self) -> &FlightIntent {
        &self.intent
    }

    pub fn performance(&self) -> &AircraftPerformance {
        &self.performance
    }

    pub fn shared_performance(&self) -> Arc<AircraftPerformance> {
        Arc::clone(&self.performance)
    }

    pub fn last_update_nanos(&self) -> u64 {
        self.last_update_nanos
    }

    pub fn sector_id(&self) -> Option<SectorId> {
        self.state.sector_id
    }

    pub fn is_in_sector(&self, sector_id: SectorId) -> bool {
        self.state.sector_id == Some(sector_id)
    }

    pub fn horizontal_distance_m(&self, other: &Flight) -> f64 {
        spatial::horizontal_distance_m(self.state.position(), other.state.position())
    }

    pub fn vertical_distance_m(&self, other: &Flight) -> f64 {
        spatial::vertical_separation_m(self.state.position(), other.state.position())
    }

    /// Both horizontal and vertical separation are below the minima.
    pub fn has_conflict_with(&self, other: &Flight, minima: &SeparationMinima) -> bool {
        if self == other {
            return false;
        }
        self.horizontal_distance_m(other) < minima.horizontal_m()
            && self.vertical_distance_m(other) < minima.vertical_m()
    }
}

impl PartialEq for Flight {
    fn eq(&self, other: &Self) -> bool {
        self.flight_id == other.flight_id
    }
}

impl Eq for Flight {}

impl std::hash::Hash for Flight {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.flight_id.hash(state);
    }
}

impl std::fmt::Display for Flight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sector = self
            .sector_id()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "Flight {} sector={} pos=({:.1}, {:.1}) alt={:.1}m",
            self.flight_id,
            sector,
            self.state.position_x_m(),
            self.state.position_y_m(),
            self.state.altitude_m()
        )
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::rules::WakeCategory;

    pub fn performance(wake: WakeCategory) -> Arc<AircraftPerformance> {
        Arc::new(AircraftPerformance::new("B737", wake, 2000.0, 2000.0, 400.0, 200.0, 41000.0).unwrap())
    }

    pub fn intent(waypoints: usize, sid: bool, star: bool) -> FlightIntent {
        let waypoints = (0..waypoints)
            .map(|i| Waypoint::new(format!("WP{}", i + 1), 1000.0 * i as f64, 2000.0, 9000.0).unwrap())
            .collect();
        FlightIntent::new(
            waypoints,
            SpeedConstraints::new(200.0, 400.0, 300.0, SpeedUnit::Knots).unwrap(),
            AltitudeConstraints::new(25000.0, 35000.0, 30000.0, AltitudeUnit::Feet).unwrap(),
            sid.then(|| "SID1".to_string()),
            star.then(|| "STAR1".to_string()),
        )
        .unwrap()
    }

    pub fn flight(id: &str, state: AircraftState, wake: WakeCategory) -> Flight {
        Flight::new(id, state, intent(3, true, true), performance(wake)).unwrap()
    }
}
