//! ML model inference components

pub mod inference;
pub mod loader;

pub use inference::{classify, InferenceEngine, Predictor};
pub use loader::{LoadedModel, ModelLoader};
