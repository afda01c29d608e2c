//! Per-aircraft complexity scoring.
//!
//! The score is a 0..=10 estimate of how much controller attention an
//! aircraft demands. It is the weighted sum of five bounded factors:
//!
//! | factor   | range | driver                                             |
//! |----------|-------|----------------------------------------------------|
//! | speed    | 0-10  | ground speed as a fraction of the type's max speed |
//! | altitude | 2-11  | altitude band, +3 while climbing or descending     |
//! | wake     | 2-10  | wake turbulence category                           |
//! | intent   | 3-13  | departure/arrival procedures and route length      |
//! | position | 2     | fixed until sector-boundary proximity is modelled  |

use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, AtcResult};
use crate::models::{AircraftState, FlightIntent};
use crate::rules::{AircraftPerformance, WakeCategory};

pub const MAX_COMPLEXITY: f64 = 10.0;

/// Weights and constants of the complexity function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityWeights {
    pub speed: f64,
    pub altitude: f64,
    pub wake: f64,
    pub intent: f64,
    pub position: f64,
    /// Position factor used in place of a boundary-distance score
    pub position_placeholder: f64,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            speed: 0.3,
            altitude: 0.2,
            wake: 0.25,
            intent: 0.15,
            position: 0.1,
            position_placeholder: 2.0,
        }
    }
}

impl ComplexityWeights {
    pub fn validate(&self) -> AtcResult<()> {
        ensure_non_negative("speed weight", self.speed)?;
        ensure_non_negative("altitude weight", self.altitude)?;
        ensure_non_negative("wake weight", self.wake)?;
        ensure_non_negative("intent weight", self.intent)?;
        ensure_non_negative("position weight", self.position)?;
        ensure_non_negative("position placeholder", self.position_placeholder)
    }
}

/// Weighted contribution of each factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityBreakdown {
    pub speed: f64,
    pub altitude: f64,
    pub wake: f64,
    pub intent: f64,
    pub position: f64,
}

impl ComplexityBreakdown {
    /// Sum of contributions, clamped to `0..=MAX_COMPLEXITY`.
    pub fn total(&self) -> f64 {
        let sum = self.speed + self.altitude + self.wake + self.intent + self.position;
        if sum.is_nan() {
            return 0.0;
        }
        sum.clamp(0.0, MAX_COMPLEXITY)
    }
}

impl std::fmt::Display for ComplexityBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Speed={:.2}, Altitude={:.2}, Wake={:.2}, Intent={:.2}, Position={:.2}",
            self.speed, self.altitude, self.wake, self.intent, self.position
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComplexityCalculator {
    weights: ComplexityWeights,
}

impl ComplexityCalculator {
    pub fn new(weights: ComplexityWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ComplexityWeights {
        &self.weights
    }

    pub fn calculate(
        &self,
        state: &AircraftState,
        performance: &AircraftPerformance,
        intent: &FlightIntent,
    ) -> f64 {
        self.breakdown(state, performance, intent).total()
    }

    pub fn breakdown(
        &self,
        state: &AircraftState,
        performance: &AircraftPerformance,
        intent: &FlightIntent,
    ) -> ComplexityBreakdown {
        let w = &self.weights;
        ComplexityBreakdown {
            speed: speed_factor(state, performance) * w.speed,
            altitude: altitude_factor(state, performance) * w.altitude,
            wake: wake_factor(performance.wake_category()) * w.wake,
            intent: intent_factor(intent) * w.intent,
            position: w.position_placeholder * w.position,
        }
    }
}

fn speed_factor(state: &AircraftState, performance: &AircraftPerformance) -> f64 {
    let max_speed = performance.max_speed_mps();
    if max_speed <= 0.0 {
        return 0.0;
    }
    (state.ground_speed_mps() / max_speed).min(1.0) * 10.0
}

fn altitude_factor(state: &AircraftState, performance: &AircraftPerformance) -> f64 {
    let altitude_m = state.altitude_m();
    let base = if altitude_m < 1000.0 {
        8.0
    } else if altitude_m < 5000.0 {
        6.0
    } else if altitude_m < 10000.0 {
        4.0
    } else {
        2.0
    };

    // The state carries no vertical rate; the y velocity component stands in
    // for it, matching the scores the balancer has always produced.
    let vertical_rate = state.velocity_y_mps().abs();
    if vertical_rate > performance.max_climb_rate_mps() * 0.1 {
        base + 3.0
    } else {
        base
    }
}

fn wake_factor(category: WakeCategory) -> f64 {
    match category {
        WakeCategory::Light => 2.0,
        WakeCategory::Medium => 4.0,
        WakeCategory::Heavy => 7.0,
        WakeCategory::Super => 10.0,
    }
}

fn intent_factor(intent: &FlightIntent) -> f64 {
    let mut score = 3.0;
    if intent.is_departing() {
        score += 3.0;
    }
    if intent.is_arriving() {
        score += 4.0;
    }
    score + (intent.waypoints().len() as f64 * 0.5).min(3.0)
}
