// src/records.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One tokenized CSV row: header name → cell text. Extra columns are carried
/// along untouched and ignored by the normalizer.
pub type RawRow = HashMap<String, String>;

/// A validated enrollment observation. Construct through the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub semester: String,
    pub course_code: String,
    /// Always ≥ 1.
    pub total_enrolled: u32,
}

/// A record (or generated future point) together with its forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Position in the normalized sequence the model was evaluated at.
    pub index: usize,
    pub semester: String,
    pub course_code: String,
    /// `None` for a next-period point that has no observation yet.
    pub total_enrolled: Option<u32>,
    pub predicted_enrollment: u32,
    pub sections_needed: u32,
}

impl PredictionResult {
    pub fn is_future(&self) -> bool {
        self.total_enrolled.is_none()
    }
}
