//! Type definitions for the classifier service

pub mod prediction;
pub mod upload;

pub use prediction::{ErrorResponse, Label, Prediction, PredictionResponse};
pub use upload::UploadedImage;
