//! Application state shared across handlers

use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::ServiceMetrics;
use crate::models::Predictor;
use crate::preprocess::ImagePreprocessor;
use crate::storage::ScratchStore;

/// Everything a request needs. Built once at startup and never mutated.
pub struct AppState {
    pub predictor: Arc<dyn Predictor>,
    pub preprocessor: ImagePreprocessor,
    pub scratch: ScratchStore,
    pub metrics: Arc<ServiceMetrics>,
    /// Scores at or above this value are labelled "dog"
    pub threshold: f32,
}

impl AppState {
    pub fn new(config: &AppConfig, predictor: Arc<dyn Predictor>) -> Self {
        Self::with_metrics(config, predictor, Arc::new(ServiceMetrics::new()))
    }

    pub fn with_metrics(
        config: &AppConfig,
        predictor: Arc<dyn Predictor>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            predictor,
            preprocessor: ImagePreprocessor::new(&config.preprocess),
            scratch: ScratchStore::new(&config.storage),
            metrics,
            threshold: config.model.threshold,
        }
    }
}
