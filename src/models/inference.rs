//! Inference engine for the cat/dog classifier

use crate::config::AppConfig;
use crate::error::{ClassifierError, Result};
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::preprocess::ImageTensor;
use crate::types::Prediction;
use ort::session::SessionOutputs;
use ort::value::Tensor;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Anything that can turn an image tensor into a P(dog) score.
///
/// Implementations must be safe to share between request handlers.
pub trait Predictor: Send + Sync {
    /// Name reported in logs and health checks
    fn name(&self) -> &str;

    /// Evaluate a single tensor and return a score in [0, 1]
    fn score(&self, tensor: &ImageTensor) -> Result<f32>;
}

/// Run one prediction and apply the decision threshold.
pub fn classify(
    predictor: &dyn Predictor,
    tensor: &ImageTensor,
    threshold: f32,
) -> Result<Prediction> {
    let score = predictor.score(tensor)?;
    if !score.is_finite() {
        return Err(ClassifierError::Inference(format!(
            "model returned non-finite score {}",
            score
        )));
    }
    Ok(Prediction::from_score(score, threshold))
}

/// Single-model inference engine using ONNX Runtime
pub struct InferenceEngine {
    /// `Session::run` needs exclusive access, so calls are serialized here
    model: Mutex<LoadedModel>,
    name: String,
}

impl InferenceEngine {
    /// Load the configured model and verify it accepts the configured input shape.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.model.onnx_threads)
            .map_err(|e| ClassifierError::Load(format!("{:#}", e)))?;
        let model = loader
            .load_model(&config.model.path, &config.model.name)
            .map_err(|e| ClassifierError::Load(format!("{:#}", e)))?;

        let engine = Self::from_model(model);

        let warmup = ImageTensor::zeros(
            config.preprocess.height as usize,
            config.preprocess.width as usize,
        );
        let score = engine.score(&warmup).map_err(|e| {
            ClassifierError::Load(format!(
                "model rejected a {:?} input: {}",
                warmup.shape(),
                e
            ))
        })?;

        info!(
            model = %engine.name,
            input_shape = ?warmup.shape(),
            warmup_score = score,
            "Inference engine initialized"
        );

        Ok(engine)
    }

    /// Wrap an already loaded model without a warm-up run
    pub fn from_model(model: LoadedModel) -> Self {
        let name = model.name.clone();
        Self {
            model: Mutex::new(model),
            name,
        }
    }

    fn run(&self, tensor: &ImageTensor) -> Result<f32> {
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let input_tensor = Tensor::from_array((shape, tensor.data().to_vec()))
            .map_err(|e| ClassifierError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut guard = lock_recovering(&self.model);
        let model = &mut *guard;

        let outputs = model
            .session
            .run(ort::inputs![model.input_name.as_str() => input_tensor])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        extract_score(&outputs, &model.output_name, &model.name)
    }
}

impl Predictor for InferenceEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, tensor: &ImageTensor) -> Result<f32> {
        let score = self.run(tensor)?;
        debug!(model = %self.name, score, "Inference complete");
        Ok(score)
    }
}

/// Lock the session, taking it back if an earlier holder panicked.
///
/// A panic mid-run leaves no partial state in the session that a later run
/// depends on, so one bad request must not disable inference for good.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Model lock was poisoned by a panicked request, recovering");
        mutex.clear_poison();
        poisoned.into_inner()
    })
}

/// Extract the dog probability from the session outputs.
///
/// Prefers the configured output name, then falls back to the first float tensor.
fn extract_score(outputs: &SessionOutputs, output_name: &str, model_name: &str) -> Result<f32> {
    if let Some(output) = outputs.get(output_name) {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            return score_from_tensor(&dims, data);
        }
    }

    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            debug!(model = %model_name, output = %name, "Extracted score from fallback output");
            return score_from_tensor(&dims, data);
        }
    }

    Err(ClassifierError::Inference(format!(
        "model {} produced no float tensor output",
        model_name
    )))
}

/// Pick the dog probability out of a `[1, 1]`, `[1]`, `[1, 2]` or `[2]` tensor.
fn score_from_tensor(dims: &[i64], data: &[f32]) -> Result<f32> {
    let classes = match dims {
        [1, n] | [n] => *n,
        _ => {
            return Err(ClassifierError::Inference(format!(
                "unexpected output shape {:?}",
                dims
            )))
        }
    };

    let index = match classes {
        1 => 0,
        2 => 1,
        _ => {
            return Err(ClassifierError::Inference(format!(
                "expected 1 or 2 output classes, got {}",
                classes
            )))
        }
    };

    data.get(index).copied().ok_or_else(|| {
        ClassifierError::Inference(format!("output tensor too short for shape {:?}", dims))
    })
}
