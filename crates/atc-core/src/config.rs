//! Engine configuration.
//!
//! All thresholds and weights are injected at construction so independent
//! engine instances never share tuning state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::complexity::ComplexityWeights;
use crate::error::{ensure_non_negative, ensure_positive, validation, AtcResult};
use crate::rules::SeparationConfig;
use crate::sector::{SectorCapacity, SectorId};

/// Weights of the candidate-sector score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorScoreWeights {
    pub capacity: f64,
    pub complexity_balance: f64,
    pub geographic: f64,
    pub health: f64,
}

impl Default for SectorScoreWeights {
    fn default() -> Self {
        Self {
            capacity: 0.4,
            complexity_balance: 0.3,
            geographic: 0.2,
            health: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    pub default_capacity: SectorCapacity,
    /// Per-sector capacities that replace the default
    pub capacity_overrides: BTreeMap<SectorId, SectorCapacity>,
    /// Utilization gap required before an aircraft is moved
    pub load_balance_threshold: f64,
    /// Complexity-utilization spread that flags the system for rebalancing
    pub complexity_balance_threshold: f64,
    pub score_weights: SectorScoreWeights,
    /// Geographic factor used in place of a boundary-distance score
    pub geographic_placeholder: f64,
    /// Divisor applied to the complexity gap in the balance factor
    pub complexity_normalizer: f64,
    pub auto_rebalancing: bool,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            default_capacity: SectorCapacity::default(),
            capacity_overrides: BTreeMap::new(),
            load_balance_threshold: 0.2,
            complexity_balance_threshold: 0.3,
            score_weights: SectorScoreWeights::default(),
            geographic_placeholder: 0.8,
            complexity_normalizer: 100.0,
            auto_rebalancing: true,
        }
    }
}

impl BalancerConfig {
    pub fn capacity_for(&self, sector_id: SectorId) -> SectorCapacity {
        self.capacity_overrides
            .get(&sector_id)
            .copied()
            .unwrap_or(self.default_capacity)
    }

    pub fn validate(&self) -> AtcResult<()> {
        self.default_capacity.validate()?;
        for (id, capacity) in &self.capacity_overrides {
            capacity
                .validate()
                .map_err(|e| validation(format!("capacity override for sector {id}: {e}")))?;
        }
        ensure_non_negative("load_balance_threshold", self.load_balance_threshold)?;
        ensure_non_negative("complexity_balance_threshold", self.complexity_balance_threshold)?;
        let w = &self.score_weights;
        for (name, value) in [
            ("capacity weight", w.capacity),
            ("complexity balance weight", w.complexity_balance),
            ("geographic weight", w.geographic),
            ("health weight", w.health),
            ("geographic placeholder", self.geographic_placeholder),
        ] {
            ensure_non_negative(name, value)?;
        }
        ensure_positive("complexity_normalizer", self.complexity_normalizer)
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub separation: SeparationConfig,
    pub complexity: ComplexityWeights,
    pub balancer: BalancerConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> AtcResult<()> {
        self.separation.validate()?;
        self.complexity.validate()?;
        self.balancer.validate()
    }
}
