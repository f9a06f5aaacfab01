// src/forecast/mod.rs
//! Trend model over the ordinal position of each record.
//!
//! The only feature is the 0-based index of a record in the normalized
//! sequence; semester labels are never parsed. Inputs are scaled to
//! `[0, 1]` by the last observed index and targets are standardised before
//! training, so one learning rate works for any enrollment magnitude.

pub mod linear;
pub mod mlp;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::config::{ModelKind, TrainingConfig};
use crate::error::ForecastError;
use crate::records::EnrollmentRecord;
use linear::LinearTrend;
use mlp::{Adam, Mlp};

/// Reported once per epoch while a model trains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FitProgress {
    pub epoch: usize,
    pub epochs: usize,
    pub loss: f64,
}

/// Caller-side handles for one fit: abandon it, or watch it progress.
#[derive(Debug, Default)]
pub struct FitControl {
    pub cancel: CancellationToken,
    pub progress: Option<watch::Sender<FitProgress>>,
}

impl FitControl {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    /// Attach a progress channel and hand back its receiving end.
    pub fn with_progress(mut self) -> (Self, watch::Receiver<FitProgress>) {
        let (tx, rx) = watch::channel(FitProgress::default());
        self.progress = Some(tx);
        (self, rx)
    }

    fn report(&self, progress: FitProgress) {
        if let Some(tx) = &self.progress {
            tx.send_replace(progress);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitSummary {
    pub epochs_run: usize,
    /// Standardised-scale MSE before the first update.
    pub initial_loss: f64,
    /// Standardised-scale MSE after the last update.
    pub final_loss: f64,
    /// Coefficient of determination; only the linear model reports one.
    pub r_squared: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Scaling {
    x_span: f64,
    y_mean: f64,
    y_std: f64,
}

impl Scaling {
    fn from_targets(n: usize, ys: &[f64]) -> Self {
        let x_span = n.saturating_sub(1).max(1) as f64;
        let y_mean = ys.iter().sum::<f64>() / ys.len() as f64;
        let var = ys.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / ys.len() as f64;
        let y_std = if var.sqrt() > 1e-9 { var.sqrt() } else { 1.0 };
        Self {
            x_span,
            y_mean,
            y_std,
        }
    }

    fn x(&self, index: usize) -> f64 {
        index as f64 / self.x_span
    }

    fn y(&self, value: f64) -> f64 {
        (value - self.y_mean) / self.y_std
    }

    fn unscale_y(&self, value: f64) -> f64 {
        value * self.y_std + self.y_mean
    }
}

#[derive(Debug, Clone)]
enum Regressor {
    Mlp(Mlp),
    Linear(LinearTrend),
}

impl Regressor {
    fn predict(&self, x: f64) -> f64 {
        match self {
            Regressor::Mlp(m) => m.predict(x),
            Regressor::Linear(l) => l.predict(x),
        }
    }
}

/// A fitted trend. Owns all of its state; nothing is shared between fits.
#[derive(Debug, Clone)]
pub struct Model {
    kind: ModelKind,
    regressor: Regressor,
    scaling: Scaling,
    n_observations: usize,
    summary: FitSummary,
}

impl Model {
    /// Raw (unrounded, possibly negative) enrollment estimate at `index`.
    pub fn predict(&self, index: usize) -> f64 {
        let x = self.scaling.x(index);
        self.scaling.unscale_y(self.regressor.predict(x))
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Number of records the model was fitted on.
    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    /// The first index past the observed data.
    pub fn next_index(&self) -> usize {
        self.n_observations
    }

    pub fn summary(&self) -> FitSummary {
        self.summary
    }
}

/// Free-function form of [`Model::predict`].
pub fn predict(model: &Model, index: usize) -> f64 {
    model.predict(index)
}

/// Fit a trend over `records` in order. Blocks for the whole training loop;
/// see [`fit_async`] for the awaitable form.
#[instrument(level = "debug", skip(records, training, control), fields(n = records.len(), model = ?training.model))]
pub fn fit(
    records: &[EnrollmentRecord],
    training: &TrainingConfig,
    control: &FitControl,
) -> Result<Model, ForecastError> {
    if records.is_empty() {
        return Err(ForecastError::InsufficientDataForFit {
            required: 1,
            actual: 0,
        });
    }
    training.validate()?;
    if control.cancel.is_cancelled() {
        return Err(ForecastError::Cancelled);
    }

    let targets: Vec<f64> = records.iter().map(|r| f64::from(r.total_enrolled)).collect();
    let scaling = Scaling::from_targets(records.len(), &targets);
    let xs: Vec<f64> = (0..records.len()).map(|i| scaling.x(i)).collect();
    let ys: Vec<f64> = targets.iter().map(|&y| scaling.y(y)).collect();

    let (regressor, summary) = match training.model {
        ModelKind::Linear => {
            let initial_loss = ys.iter().map(|y| y * y).sum::<f64>() / ys.len() as f64;
            let line = LinearTrend::fit(&xs, &ys);
            let summary = FitSummary {
                epochs_run: 1,
                initial_loss,
                final_loss: line.mse(&xs, &ys),
                r_squared: Some(line.r_squared()),
            };
            control.report(FitProgress {
                epoch: 1,
                epochs: 1,
                loss: summary.final_loss,
            });
            (Regressor::Linear(line), summary)
        }
        ModelKind::Mlp => {
            let (net, summary) = train_mlp(&xs, &ys, training, control)?;
            (Regressor::Mlp(net), summary)
        }
    };

    if !summary.final_loss.is_finite() {
        return Err(ForecastError::FittingError(format!(
            "final loss is not finite ({})",
            summary.final_loss
        )));
    }
    debug!(
        epochs = summary.epochs_run,
        initial_loss = summary.initial_loss,
        final_loss = summary.final_loss,
        r_squared = ?summary.r_squared,
        "fit complete"
    );

    Ok(Model {
        kind: training.model,
        regressor,
        scaling,
        n_observations: records.len(),
        summary,
    })
}

fn train_mlp(
    xs: &[f64],
    ys: &[f64],
    training: &TrainingConfig,
    control: &FitControl,
) -> Result<(Mlp, FitSummary), ForecastError> {
    let mut net = Mlp::new(training.hidden_units, training.seed);
    let mut adam = Adam::new(&net, training.learning_rate);
    let mut initial_loss = f64::NAN;

    for epoch in 1..=training.epochs {
        if control.cancel.is_cancelled() {
            debug!(epoch, "fit cancelled");
            return Err(ForecastError::Cancelled);
        }
        let loss = adam.step(&mut net, xs, ys);
        if !loss.is_finite() {
            return Err(ForecastError::FittingError(format!(
                "loss became non-finite at epoch {}",
                epoch
            )));
        }
        if epoch == 1 {
            initial_loss = loss;
        }
        trace!(epoch, loss, "epoch");
        control.report(FitProgress {
            epoch,
            epochs: training.epochs,
            loss,
        });
    }

    let final_loss = net.mse(xs, ys);
    Ok((
        net,
        FitSummary {
            epochs_run: training.epochs,
            initial_loss,
            final_loss,
            r_squared: None,
        },
    ))
}

/// Run [`fit`] on the blocking pool so the caller can keep reporting
/// progress while it trains. Cancel through `control.cancel`.
pub async fn fit_async(
    records: Vec<EnrollmentRecord>,
    training: TrainingConfig,
    control: FitControl,
) -> Result<Model, ForecastError> {
    tokio::task::spawn_blocking(move || fit(&records, &training, &control))
        .await
        .map_err(|e| ForecastError::FittingError(format!("training task failed: {}", e)))?
}
