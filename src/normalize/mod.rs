// src/normalize/mod.rs
//! Turns loosely-shaped CSV rows into validated [`EnrollmentRecord`]s.

pub mod headers;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ColumnAliases;
use crate::records::{EnrollmentRecord, RawRow};
use headers::HeaderResolver;

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("enrollment `{0}` is not a base-10 integer")]
    UnparsableCount(String),
    #[error("enrollment {0} is not positive")]
    NonPositiveCount(i64),
}

/// Validates rows against a fixed set of column aliases.
#[derive(Debug, Clone)]
pub struct Normalizer {
    semester: HeaderResolver,
    course_code: HeaderResolver,
    total_enrolled: HeaderResolver,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&ColumnAliases::default(), true)
    }
}

impl Normalizer {
    pub fn new(aliases: &ColumnAliases, loose_headers: bool) -> Self {
        Self {
            semester: HeaderResolver::new(&aliases.semester, loose_headers),
            course_code: HeaderResolver::new(&aliases.course_code, loose_headers),
            total_enrolled: HeaderResolver::new(&aliases.total_enrolled, loose_headers),
        }
    }

    /// Validate a single row.
    pub fn check_row(&self, row: &RawRow) -> Result<EnrollmentRecord, Rejection> {
        let semester = self
            .semester
            .resolve(row)
            .ok_or(Rejection::MissingField("semester"))?;
        let course_code = self
            .course_code
            .resolve(row)
            .ok_or(Rejection::MissingField("course code"))?;
        let raw_total = self
            .total_enrolled
            .resolve(row)
            .ok_or(Rejection::MissingField("total enrolled"))?;

        Ok(EnrollmentRecord {
            semester: semester.trim().to_string(),
            course_code: course_code.trim().to_string(),
            total_enrolled: parse_count(raw_total)?,
        })
    }

    /// Keep every row that passes [`Normalizer::check_row`], in input order.
    #[instrument(level = "debug", skip_all, fields(rows = rows.len()))]
    pub fn normalize(&self, rows: &[RawRow]) -> Vec<EnrollmentRecord> {
        let records: Vec<EnrollmentRecord> = rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| match self.check_row(row) {
                Ok(record) => Some(record),
                Err(reason) => {
                    debug!(row = idx, %reason, "dropping row");
                    None
                }
            })
            .collect();

        debug!(
            kept = records.len(),
            dropped = rows.len() - records.len(),
            "normalized rows"
        );
        records
    }
}

/// Normalize with the default aliases and loose header matching.
pub fn normalize(rows: &[RawRow]) -> Vec<EnrollmentRecord> {
    Normalizer::default().normalize(rows)
}

fn parse_count(raw: &str) -> Result<u32, Rejection> {
    let n: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Rejection::UnparsableCount(raw.to_string()))?;
    if n <= 0 {
        return Err(Rejection::NonPositiveCount(n));
    }
    u32::try_from(n).map_err(|_| Rejection::UnparsableCount(raw.to_string()))
}
