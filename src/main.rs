use anyhow::{Context, Result};
use clap::Parser;
use enrollcast::{
    config::load_config,
    ingest::{load_upload, Upload},
    pipeline::forecast_with,
    report::{results_table, write_csv, ForecastReport},
    FitControl, FitProgress, ForecastConfig, ForecastError, ModelKind, PredictionMode,
    PredictionResult,
};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::PathBuf,
    process::ExitCode,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Forecast course enrollment and the sections needed from a CSV history.
#[derive(Parser, Debug)]
#[command(name = "enrollcast", version)]
struct Args {
    /// CSV with semester, course code and total enrolled columns
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// YAML config; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum students per section
    #[arg(long)]
    capacity: Option<u32>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long, value_enum)]
    model: Option<ModelKind>,

    /// Forecast one future point for this semester (needs --next-course)
    #[arg(long, requires = "next_course")]
    next_semester: Option<String>,

    #[arg(long, requires = "next_semester")]
    next_course: Option<String>,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the result rows as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();

    // ─── 2) resolve config ───────────────────────────────────────────
    let config = build_config(&args)?;
    info!(
        capacity = config.section_capacity,
        model = ?config.training.model,
        epochs = config.training.epochs,
        "config ready"
    );

    // ─── 3) cancel on ctrl-c ─────────────────────────────────────────
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling fit");
                cancel.cancel();
            }
        }
    });

    // ─── 4) ingest + forecast ────────────────────────────────────────
    let results = match run(&args, &config, cancel).await {
        Ok(results) => results,
        Err(e) => {
            error!(kind = ?e.kind(), "{}", e);
            eprintln!("{}", e.kind().user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    // ─── 5) present ──────────────────────────────────────────────────
    results_table(&results).printstd();
    let report = ForecastReport::new(&config, results);
    for s in &report.series {
        let values: Vec<String> = s
            .points
            .iter()
            .map(|p| p.predicted_enrollment.to_string())
            .collect();
        info!(course = %s.course_code, predicted = %values.join(" → "), "series");
    }

    if let Some(path) = &args.json {
        fs::write(path, report.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("wrote report → {}", path.display());
    }
    if let Some(path) = &args.csv {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_csv(&report.results, BufWriter::new(file))?;
        info!("wrote results → {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn build_config(args: &Args) -> Result<ForecastConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ForecastConfig::default(),
    };
    if let Some(capacity) = args.capacity {
        config.section_capacity = capacity;
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(model) = args.model {
        config.training.model = model;
    }
    if let (Some(semester), Some(course_code)) = (&args.next_semester, &args.next_course) {
        config.mode = PredictionMode::NextPeriod {
            semester: semester.clone(),
            course_code: course_code.clone(),
        };
    }
    Ok(config)
}

async fn run(
    args: &Args,
    config: &ForecastConfig,
    cancel: CancellationToken,
) -> Result<Vec<PredictionResult>, ForecastError> {
    let upload = match &args.input {
        Some(path) => Some(Upload::from_path(path).map_err(|e| {
            ForecastError::ParseFailure(format!("could not read {}: {:#}", path.display(), e))
        })?),
        None => None,
    };
    let rows = load_upload(upload.as_ref())?;
    info!(rows = rows.len(), "loaded CSV");

    let (control, rx) = FitControl::new(cancel).with_progress();
    let watcher = tokio::spawn(log_progress(rx));
    info!("predicting…");
    let results = forecast_with(&rows, config, control).await;
    let _ = watcher.await;
    results
}

/// Log roughly every tenth epoch until the sender goes away.
async fn log_progress(mut rx: watch::Receiver<FitProgress>) {
    let mut last_logged = 0;
    while rx.changed().await.is_ok() {
        let p = *rx.borrow_and_update();
        let step = (p.epochs / 10).max(1);
        if p.epoch >= last_logged + step || p.epoch == p.epochs {
            info!(epoch = p.epoch, epochs = p.epochs, loss = p.loss, "training");
            last_logged = p.epoch;
        }
    }
}
