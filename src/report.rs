// src/report.rs
//! Presentation hand-off: the data a table or chart renderer consumes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use prettytable::{format, Cell, Row, Table};
use serde::Serialize;
use std::io;

use crate::config::{ForecastConfig, ModelKind, PredictionMode};
use crate::records::PredictionResult;

const TABLE_HEADERS: [&str; 5] = [
    "Semester",
    "Course Code",
    "Total Students Enrolled",
    "Predicted Enrollment",
    "Sections Needed",
];

/// Everything produced by one forecast run, ready to serialize.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub generated_at: DateTime<Utc>,
    pub section_capacity: u32,
    pub mode: PredictionMode,
    pub model: ModelKind,
    pub results: Vec<PredictionResult>,
    pub series: Vec<ChartSeries>,
}

impl ForecastReport {
    pub fn new(config: &ForecastConfig, results: Vec<PredictionResult>) -> Self {
        Self {
            generated_at: Utc::now(),
            section_capacity: config.section_capacity,
            mode: config.mode.clone(),
            model: config.training.model,
            series: chart_series(&results),
            results,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing forecast report")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub semester: String,
    pub predicted_enrollment: u32,
    /// Point lies past the observed data.
    pub projected: bool,
}

/// Predictions for one course code, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub course_code: String,
    pub points: Vec<ChartPoint>,
}

/// Group predictions by course code, courses ordered by first appearance.
pub fn chart_series(results: &[PredictionResult]) -> Vec<ChartSeries> {
    let mut series: Vec<ChartSeries> = Vec::new();
    for r in results {
        let point = ChartPoint {
            semester: r.semester.clone(),
            predicted_enrollment: r.predicted_enrollment,
            projected: r.is_future(),
        };
        match series.iter_mut().find(|s| s.course_code == r.course_code) {
            Some(s) => s.points.push(point),
            None => series.push(ChartSeries {
                course_code: r.course_code.clone(),
                points: vec![point],
            }),
        }
    }
    series
}

/// Results as a table, numbers right-aligned. A next-period point has a
/// blank total.
pub fn results_table(results: &[PredictionResult]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER);
    table.set_titles(Row::new(
        TABLE_HEADERS
            .iter()
            .map(|h| Cell::new(h).style_spec("bFg"))
            .collect(),
    ));

    for r in results {
        let total = r.total_enrolled.map(|t| t.to_string()).unwrap_or_default();
        table.add_row(Row::new(vec![
            Cell::new(&r.semester),
            Cell::new(&r.course_code),
            Cell::new(&total).style_spec("r"),
            Cell::new(&r.predicted_enrollment.to_string()).style_spec("r"),
            Cell::new(&r.sections_needed.to_string()).style_spec("r"),
        ]));
    }
    table
}

/// [`results_table`] rendered to plain text.
pub fn render_table(results: &[PredictionResult]) -> String {
    results_table(results).to_string()
}

#[derive(Serialize)]
struct CsvRow<'a> {
    semester: &'a str,
    course_code: &'a str,
    total_enrolled: Option<u32>,
    predicted_enrollment: u32,
    sections_needed: u32,
}

/// Write results as CSV with a header row.
pub fn write_csv<W: io::Write>(results: &[PredictionResult], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in results {
        wtr.serialize(CsvRow {
            semester: &r.semester,
            course_code: &r.course_code,
            total_enrolled: r.total_enrolled,
            predicted_enrollment: r.predicted_enrollment,
            sections_needed: r.sections_needed,
        })
        .with_context(|| format!("writing CSV row for {}", r.course_code))?;
    }
    wtr.flush().context("flushing CSV output")?;
    Ok(())
}
