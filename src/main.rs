//! Cat vs Dog Classifier - Main Entry Point
//!
//! Loads the ONNX model once, then serves the upload page and the
//! `/predict` endpoint until interrupted.

use anyhow::{Context, Result};
use cat_dog_classifier::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    metrics::{MetricsReporter, ServiceMetrics},
    server::{run_server, AppState},
    storage::ScratchStore,
    InferenceEngine, Predictor,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Optional first argument overrides the config file location
    let (config_path, config) = match std::env::args().nth(1) {
        Some(path) => {
            let config = AppConfig::load_from_path(&path)?;
            (path, config)
        }
        None => (DEFAULT_CONFIG_PATH.to_string(), AppConfig::load()?),
    };

    init_logging(&config.logging)?;
    info!(config = %config_path, "Starting Cat vs Dog Classifier");
    info!(
        model = %config.model.path,
        threshold = config.model.threshold,
        input = %format!("{}x{}", config.preprocess.width, config.preprocess.height),
        filter = ?config.preprocess.filter,
        "Configuration loaded"
    );

    let scratch = ScratchStore::new(&config.storage);
    scratch
        .init()
        .with_context(|| format!("Failed to create {}", scratch.dir().display()))?;

    // The service must not accept traffic without a model
    let engine = match InferenceEngine::new(&config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!(error = %e, path = %config.model.path, "Model failed to load");
            return Err(e.into());
        }
    };
    info!(model = %engine.name(), "Model ready");

    let metrics = Arc::new(ServiceMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = Arc::new(AppState::with_metrics(&config, engine, metrics.clone()));
    run_server(&config, state).await?;

    metrics.print_summary();
    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log level")?;

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        registry
            .with(fmt::layer())
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}
