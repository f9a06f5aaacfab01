pub mod capacity;
pub mod config;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod normalize;
pub mod pipeline;
pub mod records;
pub mod report;

pub use capacity::sections_needed;
pub use config::{ForecastConfig, ModelKind, PredictionMode, TrainingConfig};
pub use error::{ErrorKind, ForecastError};
pub use forecast::{fit, fit_async, predict, FitControl, FitProgress, Model};
pub use normalize::{normalize, Normalizer};
pub use pipeline::{forecast, forecast_blocking, forecast_with};
pub use records::{EnrollmentRecord, PredictionResult, RawRow};
