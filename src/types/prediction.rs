//! Prediction data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision threshold used when none is configured
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Class label produced by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Cat,
    Dog,
}

impl Label {
    /// Map a P(dog) score to a label. The threshold is inclusive: ties go to `Dog`.
    pub fn from_score(score: f32, threshold: f32) -> Self {
        if score >= threshold {
            Label::Dog
        } else {
            Label::Cat
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Cat => "cat",
            Label::Dog => "dog",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted class
    pub label: Label,
    /// Raw model score, interpreted as P(dog)
    pub score: f32,
}

impl Prediction {
    pub fn from_score(score: f32, threshold: f32) -> Self {
        Self {
            label: Label::from_score(score, threshold),
            score,
        }
    }
}

/// Body returned by `POST /predict` on success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: Label,
}

impl From<Prediction> for PredictionResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            prediction: prediction.label,
        }
    }
}

/// Body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
