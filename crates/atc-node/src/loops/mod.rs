//! Background loops that drive the engine.
//!
//! Each pass has its own cadence; all of them stop on the shared shutdown
//! signal.

pub mod conflict_loop;
pub mod event_log_loop;
pub mod health_loop;
pub mod rebalance_loop;
pub mod traffic_loop;
