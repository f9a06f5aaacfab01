// src/capacity.rs
use crate::error::ForecastError;

/// Sections required to seat `predicted_enrollment` students at `capacity`
/// per section. Any fractional section rounds up; negative or non-finite
/// predictions need no sections.
pub fn sections_needed(predicted_enrollment: f64, capacity: u32) -> Result<u32, ForecastError> {
    if capacity == 0 {
        return Err(ForecastError::config("section capacity must be at least 1"));
    }
    if !predicted_enrollment.is_finite() || predicted_enrollment <= 0.0 {
        return Ok(0);
    }
    let sections = (predicted_enrollment / f64::from(capacity)).ceil();
    Ok(sections.min(f64::from(u32::MAX)) as u32)
}
