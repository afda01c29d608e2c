//! Spatial math for conflict detection and sector balancing.
//!
//! Positions, velocities and altitudes are carried as integers scaled by
//! [`SCALE`] (hundredths of a meter). Replicas executing the same input
//! sequence must reach bit-identical state, so nothing in this module feeds a
//! floating-point value back into stored state; the `*_m` helpers exist for
//! comparisons against real-valued minima and for presentation.

use serde::{Deserialize, Serialize};

/// Scale factor between stored integers and meters (centimeters).
pub const SCALE: i64 = 100;

pub const METERS_PER_NM: f64 = 1852.0;
pub const METERS_PER_FOOT: f64 = 0.3048;
pub const FEET_PER_METER: f64 = 3.28084;
pub const MPS_PER_KNOT: f64 = 0.514444;

/// Convert a scaled integer (cm, cm/s) to meters (m, m/s).
pub fn to_meters(scaled: i64) -> f64 {
    scaled as f64 / SCALE as f64
}

/// Convert meters to the scaled representation, rounding half away from zero.
pub fn from_meters(meters: f64) -> i64 {
    (meters * SCALE as f64).round() as i64
}

pub fn nm_to_meters(nm: f64) -> f64 {
    nm * METERS_PER_NM
}

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * METERS_PER_FOOT
}

pub fn knots_to_mps(knots: f64) -> f64 {
    knots * MPS_PER_KNOT
}

/// Feet per minute to meters per second.
pub fn fpm_to_mps(fpm: f64) -> f64 {
    fpm * METERS_PER_FOOT / 60.0
}

/// A point in scaled space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position3 {
    pub x: i64,
    pub y: i64,
    pub altitude: i64,
}

impl Position3 {
    pub fn new(x: i64, y: i64, altitude: i64) -> Self {
        Self { x, y, altitude }
    }

    pub fn from_meters(x_m: f64, y_m: f64, altitude_m: f64) -> Self {
        Self {
            x: from_meters(x_m),
            y: from_meters(y_m),
            altitude: from_meters(altitude_m),
        }
    }
}

/// Horizontal Euclidean distance in scaled units.
///
/// Deltas are squared in `u128`; any `i64` delta squares without overflow
/// and the sum saturates at the extremes of the coordinate range.
pub fn horizontal_distance_scaled(a: Position3, b: Position3) -> f64 {
    let dx = (i128::from(a.x) - i128::from(b.x)).unsigned_abs();
    let dy = (i128::from(a.y) - i128::from(b.y)).unsigned_abs();
    ((dx * dx).saturating_add(dy * dy) as f64).sqrt()
}

/// Horizontal Euclidean distance in meters.
pub fn horizontal_distance_m(a: Position3, b: Position3) -> f64 {
    horizontal_distance_scaled(a, b) / SCALE as f64
}

/// Absolute altitude delta in scaled units.
pub fn vertical_separation_scaled(a: Position3, b: Position3) -> u64 {
    a.altitude.abs_diff(b.altitude)
}

/// Absolute altitude delta in meters.
pub fn vertical_separation_m(a: Position3, b: Position3) -> f64 {
    vertical_separation_scaled(a, b) as f64 / SCALE as f64
}

/// Planar distance between two real-valued points (meters).
pub fn planar_distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x1 - x2;
    let dy = y1 - y2;
    (dx * dx + dy * dy).sqrt()
}
