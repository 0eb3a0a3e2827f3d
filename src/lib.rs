//! Cat vs Dog Classifier Library
//!
//! Serves a pretrained binary image classifier over HTTP: uploads are
//! decoded, resized to the model's input resolution and scored with an
//! ONNX model loaded once at startup.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod server;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::ClassifierError;
pub use models::inference::{InferenceEngine, Predictor};
pub use preprocess::{ImagePreprocessor, ImageTensor};
pub use storage::ScratchStore;
pub use types::{Label, Prediction};
