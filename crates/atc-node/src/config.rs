//! Node configuration from environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON sector layout; the built-in 2x2 grid when unset
    pub sectors_file: Option<PathBuf>,
    /// JSON `EngineConfig`; defaults when unset
    pub engine_config_file: Option<PathBuf>,
    pub conflict_tick: Duration,
    pub rebalance_tick: Duration,
    pub health_tick: Duration,
    /// Simulated flights to keep airborne; 0 disables the traffic loop
    pub sim_flights: usize,
    pub sim_seed: u64,
    pub sim_step: Duration,
    pub log_json: bool,
    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sectors_file: None,
            engine_config_file: None,
            conflict_tick: Duration::from_millis(100),
            rebalance_tick: Duration::from_millis(200),
            health_tick: Duration::from_millis(1000),
            sim_flights: 0,
            sim_seed: 42,
            sim_step: Duration::from_millis(1000),
            log_json: false,
            event_buffer: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sectors_file: env::var("ATC_SECTORS_FILE").ok().map(PathBuf::from),
            engine_config_file: env::var("ATC_ENGINE_CONFIG_FILE").ok().map(PathBuf::from),
            conflict_tick: millis_var("ATC_CONFLICT_TICK_MS").unwrap_or(defaults.conflict_tick),
            rebalance_tick: millis_var("ATC_REBALANCE_TICK_MS").unwrap_or(defaults.rebalance_tick),
            health_tick: millis_var("ATC_HEALTH_TICK_MS").unwrap_or(defaults.health_tick),
            sim_flights: env::var("ATC_SIM_FLIGHTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sim_flights),
            sim_seed: env::var("ATC_SIM_SEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sim_seed),
            sim_step: millis_var("ATC_SIM_STEP_MS").unwrap_or(defaults.sim_step),
            log_json: env::var("ATC_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            event_buffer: env::var("ATC_EVENT_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.event_buffer),
        }
    }
}

/// Zero is rejected: `tokio::time::interval` panics on a zero period.
fn millis_var(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cadences() {
        let config = Config::default();
        assert_eq!(config.conflict_tick, Duration::from_millis(100));
        assert_eq!(config.rebalance_tick, Duration::from_millis(200));
        assert_eq!(config.health_tick, Duration::from_secs(1));
        assert_eq!(config.sim_flights, 0);
    }

    #[test]
    fn zero_millis_is_ignored() {
        // Unique name so parallel tests never race on it
        env::set_var("ATC_TEST_ZERO_TICK_MS", "0");
        assert_eq!(millis_var("ATC_TEST_ZERO_TICK_MS"), None);
        env::set_var("ATC_TEST_ZERO_TICK_MS", "250");
        assert_eq!(millis_var("ATC_TEST_ZERO_TICK_MS"), Some(Duration::from_millis(250)));
        env::remove_var("ATC_TEST_ZERO_TICK_MS");
    }
}
