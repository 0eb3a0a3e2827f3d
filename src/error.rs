//! Error types for the classifier service

use crate::types::ErrorResponse;
use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Model could not be loaded or failed its warm-up run. Fatal at startup.
    #[error("Model load error: {0}")]
    Load(String),

    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Missing required form field '{0}'")]
    MissingFile(&'static str),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    /// Request was not a readable multipart form at all
    #[error("Multipart rejected: {0}")]
    MultipartRejected(#[from] MultipartRejection),
}

impl ClassifierError {
    /// Short stable name used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifierError::Load(_) => "load",
            ClassifierError::Decode(_) => "decode",
            ClassifierError::Io(_) => "io",
            ClassifierError::Inference(_) => "inference",
            ClassifierError::MissingFile(_) => "missing_file",
            ClassifierError::Multipart(_) | ClassifierError::MultipartRejected(_) => "multipart",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ClassifierError::Decode(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ClassifierError::MissingFile(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ClassifierError::Multipart(e) => e.status(),
            ClassifierError::MultipartRejected(e) => e.status(),
            ClassifierError::Load(_) | ClassifierError::Io(_) | ClassifierError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ClassifierError::Decode(_) => "uploaded file is not a supported image".to_string(),
            ClassifierError::Io(_) => "failed to store upload".to_string(),
            ClassifierError::Inference(_) | ClassifierError::Load(_) => {
                "inference failed".to_string()
            }
            ClassifierError::MissingFile(field) => {
                format!("missing required form field '{}'", field)
            }
            ClassifierError::Multipart(e) => e.body_text(),
            ClassifierError::MultipartRejected(e) => e.body_text(),
        }
    }
}

impl IntoResponse for ClassifierError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), detail = %self, "Request failed");
        } else {
            tracing::warn!(kind = self.kind(), detail = %self, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.public_message(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
