// src/pipeline/mod.rs
//! normalize → reject-if-empty → fit → predict → plan capacity.
//!
//! Every call builds its own normalizer, model and intermediate vectors, so
//! overlapping or repeated invocations never observe each other.

use tracing::{debug, info, instrument};

use crate::capacity::sections_needed;
use crate::config::{ForecastConfig, PredictionMode};
use crate::error::ForecastError;
use crate::forecast::{fit, fit_async, FitControl, Model};
use crate::normalize::Normalizer;
use crate::records::{EnrollmentRecord, PredictionResult, RawRow};

/// Forecast with no cancellation or progress reporting.
pub async fn forecast(
    raw_rows: &[RawRow],
    config: &ForecastConfig,
) -> Result<Vec<PredictionResult>, ForecastError> {
    forecast_with(raw_rows, config, FitControl::default()).await
}

/// Forecast, training on the blocking pool under the given [`FitControl`].
#[instrument(level = "info", skip_all, fields(rows = raw_rows.len(), mode = mode_name(&config.mode)))]
pub async fn forecast_with(
    raw_rows: &[RawRow],
    config: &ForecastConfig,
    control: FitControl,
) -> Result<Vec<PredictionResult>, ForecastError> {
    let records = prepare(raw_rows, config)?;
    let model = fit_async(records.clone(), config.training.clone(), control).await?;
    assemble(&records, &model, config)
}

/// Same as [`forecast_with`] but trains on the calling thread.
#[instrument(level = "info", skip_all, fields(rows = raw_rows.len(), mode = mode_name(&config.mode)))]
pub fn forecast_blocking(
    raw_rows: &[RawRow],
    config: &ForecastConfig,
    control: &FitControl,
) -> Result<Vec<PredictionResult>, ForecastError> {
    let records = prepare(raw_rows, config)?;
    let model = fit(&records, &config.training, control)?;
    assemble(&records, &model, config)
}

/// Validate the config and normalize rows, enforcing the minimum record count.
/// In next-period mode only the target course's series is kept.
fn prepare(
    raw_rows: &[RawRow],
    config: &ForecastConfig,
) -> Result<Vec<EnrollmentRecord>, ForecastError> {
    config.validate()?;

    let records = Normalizer::new(&config.aliases, config.loose_headers).normalize(raw_rows);
    info!(
        valid = records.len(),
        rejected = raw_rows.len() - records.len(),
        "normalized input"
    );

    if records.is_empty() {
        return Err(ForecastError::NoValidData);
    }
    let records = match &config.mode {
        PredictionMode::Backtest => records,
        PredictionMode::NextPeriod { course_code, .. } => course_series(records, course_code)?,
    };
    if records.len() < config.min_records {
        return Err(ForecastError::InsufficientDataForFit {
            required: config.min_records,
            actual: records.len(),
        });
    }
    Ok(records)
}

/// The records of one course, in input order, so the index runs over that
/// course's own history.
fn course_series(
    records: Vec<EnrollmentRecord>,
    course_code: &str,
) -> Result<Vec<EnrollmentRecord>, ForecastError> {
    let target = course_code.trim();
    let total = records.len();
    let series: Vec<EnrollmentRecord> = records
        .into_iter()
        .filter(|r| r.course_code == target)
        .collect();
    debug!(course = target, kept = series.len(), of = total, "selected course series");

    if series.is_empty() {
        return Err(ForecastError::NoValidData);
    }
    Ok(series)
}

/// Evaluate `model` per the configured mode and attach capacity plans.
pub fn assemble(
    records: &[EnrollmentRecord],
    model: &Model,
    config: &ForecastConfig,
) -> Result<Vec<PredictionResult>, ForecastError> {
    let capacity = config.section_capacity;
    match &config.mode {
        PredictionMode::Backtest => records
            .iter()
            .enumerate()
            .map(|(index, r)| {
                build_result(
                    model,
                    index,
                    &r.semester,
                    &r.course_code,
                    Some(r.total_enrolled),
                    capacity,
                )
            })
            .collect(),
        PredictionMode::NextPeriod {
            semester,
            course_code,
        } => Ok(vec![build_result(
            model,
            model.next_index(),
            semester.trim(),
            course_code.trim(),
            None,
            capacity,
        )?]),
    }
}

fn build_result(
    model: &Model,
    index: usize,
    semester: &str,
    course_code: &str,
    total_enrolled: Option<u32>,
    capacity: u32,
) -> Result<PredictionResult, ForecastError> {
    let raw = model.predict(index);
    if !raw.is_finite() {
        return Err(ForecastError::FittingError(format!(
            "prediction at index {} is not finite",
            index
        )));
    }
    let predicted_enrollment = raw.max(0.0).round().min(f64::from(u32::MAX)) as u32;
    let sections_needed = sections_needed(f64::from(predicted_enrollment), capacity)?;

    Ok(PredictionResult {
        index,
        semester: semester.to_string(),
        course_code: course_code.to_string(),
        total_enrolled,
        predicted_enrollment,
        sections_needed,
    })
}

fn mode_name(mode: &PredictionMode) -> &'static str {
    match mode {
        PredictionMode::Backtest => "backtest",
        PredictionMode::NextPeriod { .. } => "next_period",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelKind, TrainingConfig};
    use crate::error::ErrorKind;
    use tokio_util::sync::CancellationToken;
    use tracing_subscriber::{fmt, EnvFilter};

    fn init_logging() {
        let _ = fmt()
            .with_env_filter(EnvFilter::new("info,enrollcast=debug"))
            .with_test_writer()
            .try_init();
    }

    fn row(semester: &str, code: &str, total: &str) -> RawRow {
        [
            ("semester", semester),
            ("course code", code),
            ("total number of students enrolled", total),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn linear_config() -> ForecastConfig {
        ForecastConfig {
            training: TrainingConfig {
                model: ModelKind::Linear,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_two_course_scenario() {
        init_logging();
        let rows = vec![row("2024-1", "ITE102", "45"), row("2024-1", "ITE103", "58")];
        let config = ForecastConfig {
            section_capacity: 30,
            ..Default::default()
        };

        let results = forecast(&rows, &config).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].course_code, "ITE102");
        assert_eq!(results[1].course_code, "ITE103");
        for r in &results {
            assert!(r.sections_needed >= 1, "{:?}", r);
            assert_eq!(
                r.sections_needed,
                sections_needed(f64::from(r.predicted_enrollment), 30).unwrap()
            );
        }
        assert_eq!(results[0].total_enrolled, Some(45));
    }

    #[tokio::test]
    async fn test_empty_input_is_no_valid_data() {
        let err = forecast(&[], &ForecastConfig::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoValidData);
    }

    #[tokio::test]
    async fn test_all_rows_rejected_is_no_valid_data() {
        let rows = vec![row("2024-1", "ITE102", "0"), row("", "ITE103", "58")];
        let err = forecast(&rows, &ForecastConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoValidData);
    }

    #[tokio::test]
    async fn test_below_minimum_records() {
        let rows = vec![row("2024-1", "ITE102", "45"), row("2024-1", "ITE103", "abc")];
        let err = forecast(&rows, &ForecastConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientDataForFit {
                required: 2,
                actual: 1
            }
        ));

        let relaxed = ForecastConfig {
            min_records: 1,
            ..linear_config()
        };
        let results = forecast(&rows, &relaxed).await.unwrap();
        assert_eq!(results[0].predicted_enrollment, 45);
        assert_eq!(results[0].sections_needed, 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_invalid_configuration() {
        let rows = vec![row("2024-1", "ITE102", "45"), row("2024-2", "ITE102", "50")];
        let config = ForecastConfig {
            section_capacity: 0,
            ..Default::default()
        };
        let err = forecast(&rows, &config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn test_backtest_keeps_surviving_order() {
        let rows = vec![
            row("2023-1", "A", "30"),
            row("2023-2", "B", "nope"),
            row("2024-1", "C", "40"),
            row("2024-2", "D", "50"),
        ];
        let results = forecast(&rows, &linear_config()).await.unwrap();
        let codes: Vec<&str> = results.iter().map(|r| r.course_code.as_str()).collect();
        assert_eq!(codes, vec!["A", "C", "D"]);
        let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        // exact line through 30, 40, 50
        let predicted: Vec<u32> = results.iter().map(|r| r.predicted_enrollment).collect();
        assert_eq!(predicted, vec![30, 40, 50]);
        let sections: Vec<u32> = results.iter().map(|r| r.sections_needed).collect();
        assert_eq!(sections, vec![1, 2, 2]);
    }

    #[tokio::test]
    async fn test_next_period_single_point() {
        let rows = vec![
            row("2023-1", "ITE102", "40"),
            row("2023-2", "ITE102", "50"),
            row("2024-1", "ITE102", "60"),
        ];
        let config = ForecastConfig {
            mode: PredictionMode::NextPeriod {
                semester: "2024-2".into(),
                course_code: "ITE102".into(),
            },
            ..linear_config()
        };
        let results = forecast(&rows, &config).await.unwrap();
        assert_eq!(results.len(), 1);
        let point = &results[0];
        assert_eq!(point.index, 3);
        assert!(point.is_future());
        assert_eq!(point.semester, "2024-2");
        assert_eq!(point.predicted_enrollment, 70);
        assert_eq!(point.sections_needed, 3);
    }

    fn next_period(semester: &str, course_code: &str) -> ForecastConfig {
        ForecastConfig {
            mode: PredictionMode::NextPeriod {
                semester: semester.into(),
                course_code: course_code.into(),
            },
            ..linear_config()
        }
    }

    #[tokio::test]
    async fn test_next_period_uses_only_target_course() {
        init_logging();
        let rows = vec![
            row("2023-1", "ITE102", "10"),
            row("2023-1", "ITE103", "100"),
            row("2023-2", "ITE102", "10"),
            row("2023-2", "ITE103", "100"),
            row("2024-1", "ITE102", "10"),
            row("2024-1", "ITE103", "100"),
        ];

        let low = forecast(&rows, &next_period("2024-2", "ITE102")).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].index, 3);
        assert_eq!(low[0].course_code, "ITE102");
        assert_eq!(low[0].predicted_enrollment, 10);
        assert_eq!(low[0].sections_needed, 1);

        let high = forecast(&rows, &next_period("2024-2", " ITE103 ")).await.unwrap();
        assert_eq!(high[0].predicted_enrollment, 100);
        assert_eq!(high[0].sections_needed, 4);
    }

    #[tokio::test]
    async fn test_next_period_unknown_course_is_no_valid_data() {
        let rows = vec![row("2023-1", "ITE102", "10"), row("2023-2", "ITE102", "12")];
        let err = forecast(&rows, &next_period("2024-1", "ZZZ999"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoValidData);
    }

    #[tokio::test]
    async fn test_next_period_short_course_history() {
        let rows = vec![
            row("2023-1", "ITE102", "10"),
            row("2023-1", "ITE103", "40"),
            row("2023-2", "ITE102", "12"),
        ];
        let err = forecast(&rows, &next_period("2024-1", "ITE103"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientDataForFit {
                required: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_declining_trend_clamps_at_zero() {
        let rows = vec![row("1", "X", "30"), row("2", "X", "20"), row("3", "X", "10")];
        let config = ForecastConfig {
            mode: PredictionMode::NextPeriod {
                semester: "6".into(),
                course_code: "X".into(),
            },
            ..linear_config()
        };
        // next index 3 → 0 students
        let results = forecast(&rows, &config).await.unwrap();
        assert_eq!(results[0].predicted_enrollment, 0);
        assert_eq!(results[0].sections_needed, 0);
    }

    #[tokio::test]
    async fn test_reinvocation_does_not_leak() {
        let a = vec![row("1", "A", "500"), row("2", "A", "900"), row("3", "A", "700")];
        let b = vec![row("1", "B", "12"), row("2", "B", "15")];
        let config = ForecastConfig::default();

        let b_alone = forecast(&b, &config).await.unwrap();
        let _ = forecast(&a, &config).await.unwrap();
        let b_after_a = forecast(&b, &config).await.unwrap();
        assert_eq!(b_alone, b_after_a);
    }

    #[tokio::test]
    async fn test_overlapping_invocations() {
        let a = vec![row("1", "A", "500"), row("2", "A", "900"), row("3", "A", "700")];
        let b = vec![row("1", "B", "12"), row("2", "B", "15")];
        let config = ForecastConfig::default();

        let (ra, rb) = tokio::join!(forecast(&a, &config), forecast(&b, &config));
        assert_eq!(ra.unwrap(), forecast(&a, &config).await.unwrap());
        assert_eq!(rb.unwrap(), forecast(&b, &config).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_then_rerun() {
        let rows = vec![row("1", "A", "10"), row("2", "A", "20")];
        let config = ForecastConfig::default();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = forecast_with(&rows, &config, FitControl::new(cancel))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let results = forecast(&rows, &config).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_blocking_matches_async() {
        let rows = vec![row("1", "A", "10"), row("2", "A", "20"), row("3", "A", "25")];
        let config = ForecastConfig::default();
        let blocking = forecast_blocking(&rows, &config, &FitControl::default()).unwrap();

        let rt = tokio::runtime::Runtime::new().unwrap();
        let awaited = rt.block_on(forecast(&rows, &config)).unwrap();
        assert_eq!(blocking, awaited);
    }
}
