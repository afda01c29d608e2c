//! Error types for the ATC engine.

use thiserror::Error;

/// Root error type for engine failures.
///
/// Lookup misses are not errors: per-flight queries return empty results.
#[derive(Error, Debug)]
pub enum AtcError {
    /// A domain value was rejected at construction.
    #[error("validation error: {0}")]
    Validation(String),

    /// Engine state that correct upsert discipline cannot produce.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Tick delivered with a correlation id no pass is registered for.
    #[error("unknown timer correlation id {0}")]
    UnknownTimer(u64),

    /// Snapshot could not be encoded or decoded.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type AtcResult<T> = Result<T, AtcError>;

pub(crate) fn validation(msg: impl Into<String>) -> AtcError {
    AtcError::Validation(msg.into())
}

/// Reject NaN/infinite and negative values.
pub(crate) fn ensure_non_negative(name: &str, value: f64) -> AtcResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(validation(format!(
            "{name} must be a finite, non-negative number (got {value})"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_positive(name: &str, value: f64) -> AtcResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(validation(format!("{name} must be a finite, positive number (got {value})")));
    }
    Ok(())
}
