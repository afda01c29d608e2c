//! Offline scenario tooling: scenario files and deterministic replay of
//! the ATC engine.

pub mod sim;
