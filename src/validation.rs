//! Validation helpers for acquisition timing and identifiers.

use crate::error::{AcquisitionError, AppResult};

/// Validates that a scan interval is strictly positive.
///
/// # Arguments
///
/// * `interval_ms` - The nominal spacing between consecutive samples, in milliseconds.
///
/// # Returns
///
/// * `Ok(())` if the interval is valid.
/// * `Err(AcquisitionError::InvalidConfiguration)` if the interval is zero.
pub fn validate_scan_interval(interval_ms: u64) -> AppResult<()> {
    if interval_ms > 0 {
        Ok(())
    } else {
        Err(AcquisitionError::InvalidConfiguration(
            "scan interval must be greater than 0 ms".to_string(),
        ))
    }
}

/// Validates if a given string is not empty (after trimming whitespace).
pub fn is_not_empty(value: &str) -> Result<(), &'static str> {
    if !value.trim().is_empty() {
        Ok(())
    } else {
        Err("Value cannot be empty")
    }
}
