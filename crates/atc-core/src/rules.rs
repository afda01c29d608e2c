//! Safety rules: wake turbulence categories, separation minima and aircraft
//! performance envelopes.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, ensure_positive, validation, AtcResult};
use crate::spatial::{feet_to_meters, fpm_to_mps, knots_to_mps, nm_to_meters};

pub const STANDARD_HORIZONTAL_NM: f64 = 3.0;
pub const STANDARD_VERTICAL_FT: f64 = 1000.0;
pub const REDUCED_HORIZONTAL_NM: f64 = 2.5;
pub const REDUCED_VERTICAL_FT: f64 = 500.0;

/// Wake turbulence category, ordered from least to most restrictive.
///
/// The derived `Ord` is the safety ranking: `Super > Heavy > Medium > Light`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WakeCategory {
    Light,
    Medium,
    Heavy,
    Super,
}

impl WakeCategory {
    pub const ALL: [WakeCategory; 4] = [Self::Light, Self::Medium, Self::Heavy, Self::Super];

    /// Wake-specific trailing separation in nautical miles.
    pub fn required_separation_nm(self) -> f64 {
        match self {
            Self::Light => 3.0,
            Self::Medium => 5.0,
            Self::Heavy => 6.0,
            Self::Super => 8.0,
        }
    }

    /// The higher-ranked of two categories. Pair minima are always computed
    /// from this, never from the lighter aircraft.
    pub fn more_restrictive(a: Self, b: Self) -> Self {
        a.max(b)
    }
}

/// Minimum separation between two aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeparationMinima {
    /// Horizontal minimum in nautical miles
    pub horizontal_nm: f64,
    /// Vertical minimum in feet
    pub vertical_ft: f64,
    pub is_reduced: bool,
}

impl Default for SeparationMinima {
    fn default() -> Self {
        Self::standard()
    }
}

impl SeparationMinima {
    pub fn new(horizontal_nm: f64, vertical_ft: f64, is_reduced: bool) -> AtcResult<Self> {
        ensure_positive("horizontal minimum", horizontal_nm)?;
        ensure_positive("vertical minimum", vertical_ft)?;
        Ok(Self {
            horizontal_nm,
            vertical_ft,
            is_reduced,
        })
    }

    /// 3 NM / 1000 ft.
    pub fn standard() -> Self {
        Self {
            horizontal_nm: STANDARD_HORIZONTAL_NM,
            vertical_ft: STANDARD_VERTICAL_FT,
            is_reduced: false,
        }
    }

    /// 2.5 NM / 500 ft.
    pub fn reduced() -> Self {
        Self {
            horizontal_nm: REDUCED_HORIZONTAL_NM,
            vertical_ft: REDUCED_VERTICAL_FT,
            is_reduced: true,
        }
    }

    /// Standard minima with the horizontal raised to the wake-specific value.
    pub fn with_wake_turbulence(category: WakeCategory) -> Self {
        SeparationConfig::default().minima_for(category)
    }

    pub fn horizontal_m(&self) -> f64 {
        nm_to_meters(self.horizontal_nm)
    }

    pub fn vertical_m(&self) -> f64 {
        feet_to_meters(self.vertical_ft)
    }
}

impl std::fmt::Display for SeparationMinima {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1} NM / {:.0} ft{}",
            self.horizontal_nm,
            self.vertical_ft,
            if self.is_reduced { " (reduced)" } else { "" }
        )
    }
}

/// Configuration for separation rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Standard horizontal minimum (NM)
    pub standard_horizontal_nm: f64,
    /// Standard vertical minimum (ft)
    pub standard_vertical_ft: f64,
    /// Wake-specific horizontal minima (NM), indexed LIGHT, MEDIUM, HEAVY, SUPER
    pub wake_horizontal_nm: [f64; 4],
    /// Below this relative speed (m/s) a pair is treated as not closing
    pub min_closing_speed_mps: f64,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            standard_horizontal_nm: STANDARD_HORIZONTAL_NM,
            standard_vertical_ft: STANDARD_VERTICAL_FT,
            wake_horizontal_nm: WakeCategory::ALL.map(WakeCategory::required_separation_nm),
            min_closing_speed_mps: 0.1,
        }
    }
}

impl SeparationConfig {
    pub fn validate(&self) -> AtcResult<()> {
        ensure_positive("standard_horizontal_nm", self.standard_horizontal_nm)?;
        ensure_positive("standard_vertical_ft", self.standard_vertical_ft)?;
        for (category, nm) in WakeCategory::ALL.iter().zip(self.wake_horizontal_nm) {
            ensure_positive(&format!("wake minimum for {category:?}"), nm)?;
        }
        if self.wake_horizontal_nm.windows(2).any(|w| w[0] > w[1]) {
            return Err(validation(
                "wake minima must not decrease from LIGHT to SUPER",
            ));
        }
        ensure_non_negative("min_closing_speed_mps", self.min_closing_speed_mps)
    }

    pub fn minima_for(&self, category: WakeCategory) -> SeparationMinima {
        let wake = self.wake_horizontal_nm[category as usize];
        SeparationMinima {
            horizontal_nm: self.standard_horizontal_nm.max(wake),
            vertical_ft: self.standard_vertical_ft,
            is_reduced: false,
        }
    }

    /// Minima for a pair, using the more restrictive wake category.
    pub fn minima_for_pair(&self, a: WakeCategory, b: WakeCategory) -> SeparationMinima {
        self.minima_for(WakeCategory::more_restrictive(a, b))
    }
}

/// Performance envelope of an aircraft type. Shared read-only by every
/// flight of that type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircraftPerformance {
    aircraft_type: String,
    wake_category: WakeCategory,
    /// feet per minute
    max_climb_rate_fpm: f64,
    /// feet per minute
    max_descent_rate_fpm: f64,
    /// knots
    min_speed_kt: f64,
    /// knots
    max_speed_kt: f64,
    /// feet
    max_altitude_ft: f64,
}

impl AircraftPerformance {
    pub fn new(
        aircraft_type: impl Into<String>,
        wake_category: WakeCategory,
        max_climb_rate_fpm: f64,
        max_descent_rate_fpm: f64,
        max_speed_kt: f64,
        min_speed_kt: f64,
        max_altitude_ft: f64,
    ) -> AtcResult<Self> {
        let aircraft_type = aircraft_type.into();
        if aircraft_type.trim().is_empty() {
            return Err(validation("aircraft type cannot be empty"));
        }
        ensure_non_negative("max climb rate", max_climb_rate_fpm)?;
        ensure_non_negative("max descent rate", max_descent_rate_fpm)?;
        ensure_non_negative("min speed", min_speed_kt)?;
        ensure_positive("max speed", max_speed_kt)?;
        ensure_non_negative("max altitude", max_altitude_ft)?;
        if min_speed_kt > max_speed_kt {
            return Err(validation(format!(
                "min speed ({min_speed_kt} kt) cannot be greater than max speed ({max_speed_kt} kt)"
            )));
        }
        Ok(Self {
            aircraft_type,
            wake_category,
            max_climb_rate_fpm,
            max_descent_rate_fpm,
            min_speed_kt,
            max_speed_kt,
            max_altitude_ft,
        })
    }

    pub fn aircraft_type(&self) -> &str {
        &self.aircraft_type
    }

    pub fn wake_category(&self) -> WakeCategory {
        self.wake_category
    }

    pub fn max_climb_rate_fpm(&self) -> f64 {
        self.max_climb_rate_fpm
    }

    pub fn max_descent_rate_fpm(&self) -> f64 {
        self.max_descent_rate_fpm
    }

    pub fn min_speed_kt(&self) -> f64 {
        self.min_speed_kt
    }

    pub fn max_speed_kt(&self) -> f64 {
        self.max_speed_kt
    }

    pub fn max_altitude_ft(&self) -> f64 {
        self.max_altitude_ft
    }

    pub fn max_speed_mps(&self) -> f64 {
        knots_to_mps(self.max_speed_kt)
    }

    pub fn max_climb_rate_mps(&self) -> f64 {
        fpm_to_mps(self.max_climb_rate_fpm)
    }

    pub fn required_separation_nm(&self) -> f64 {
        self.wake_category.required_separation_nm()
    }

    pub fn can_climb_to(&self, altitude_ft: f64) -> bool {
        altitude_ft <= self.max_altitude_ft
    }

    pub fn can_maintain_speed(&self, speed_kt: f64) -> bool {
        (self.min_speed_kt..=self.max_speed_kt).contains(&speed_kt)
    }
}

/// Performance records are identified by aircraft type.
impl PartialEq for AircraftPerformance {
    fn eq(&self, other: &Self) -> bool {
        self.aircraft_type == other.aircraft_type
    }
}

impl Eq for AircraftPerformance {}

#[cfg(test)]
mod tests {
    use super::*;

    fn b737() -> AircraftPerformance {
        AircraftPerformance::new("B737", WakeCategory::Medium, 2000.0, 2000.0, 400.0, 200.0, 41000.0)
            .unwrap()
    }

    #[test]
    fn standard_minima_are_three_miles_and_thousand_feet() {
        let minima = SeparationMinima::standard();
        assert_eq!(minima.horizontal_m(), 5556.0);
        assert!((minima.vertical_m() - 304.8).abs() < 1e-9);
        assert!(!minima.is_reduced);
        assert!(SeparationMinima::reduced().is_reduced);
    }

    #[test]
    fn wake_minima_are_monotonic() {
        let h: Vec<f64> = WakeCategory::ALL
            .iter()
            .map(|c| SeparationMinima::with_wake_turbulence(*c).horizontal_nm)
            .collect();
        assert_eq!(h, vec![3.0, 5.0, 6.0, 8.0]);
        assert!(h.windows(2).all(|w| w[0] <= w[1]));
        for c in WakeCategory::ALL {
            assert_eq!(SeparationMinima::with_wake_turbulence(c).vertical_ft, 1000.0);
        }
    }

    #[test]
    fn pair_minima_use_heavier_category() {
        let config = SeparationConfig::default();
        for a in WakeCategory::ALL {
            for b in WakeCategory::ALL {
                let pair = config.minima_for_pair(a, b);
                assert_eq!(pair, config.minima_for_pair(b, a));
                assert_eq!(pair, config.minima_for(a.max(b)));
            }
        }
        assert_eq!(
            WakeCategory::more_restrictive(WakeCategory::Light, WakeCategory::Super),
            WakeCategory::Super
        );
    }

    #[test]
    fn wake_minima_never_drop_below_standard() {
        let config = SeparationConfig {
            standard_horizontal_nm: 4.0,
            ..SeparationConfig::default()
        };
        assert_eq!(config.minima_for(WakeCategory::Light).horizontal_nm, 4.0);
        assert_eq!(config.minima_for(WakeCategory::Medium).horizontal_nm, 5.0);
    }

    #[test]
    fn config_rejects_decreasing_wake_table() {
        let config = SeparationConfig {
            wake_horizontal_nm: [3.0, 6.0, 5.0, 8.0],
            ..SeparationConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(SeparationConfig::default().validate().is_ok());
    }

    #[test]
    fn performance_rejects_inverted_speed_envelope() {
        let err = AircraftPerformance::new("C172", WakeCategory::Light, 700.0, 500.0, 100.0, 120.0, 14000.0);
        assert!(err.is_err());
        assert!(AircraftPerformance::new("", WakeCategory::Light, 700.0, 500.0, 120.0, 50.0, 14000.0).is_err());
        assert!(SeparationMinima::new(0.0, 1000.0, false).is_err());
    }

    #[test]
    fn performance_envelope_queries() {
        let perf = b737();
        assert!(perf.can_climb_to(41000.0));
        assert!(!perf.can_climb_to(41001.0));
        assert!(perf.can_maintain_speed(300.0));
        assert!(!perf.can_maintain_speed(150.0));
        assert_eq!(perf.required_separation_nm(), 5.0);
        assert_eq!(perf, b737());
    }
}
