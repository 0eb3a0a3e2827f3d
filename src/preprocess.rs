//! Image preprocessing for model inference.
//!
//! Turns uploaded bytes into the normalized NHWC tensor the classifier was
//! trained on: decode, resize to a fixed resolution (distorting the aspect
//! ratio if needed), force three channels and scale every value into [0, 1].

use crate::config::PreprocessConfig;
use crate::error::Result;
use image::imageops::FilterType;
use std::path::Path;
use tracing::debug;

/// Number of color channels fed to the model
pub const CHANNELS: usize = 3;

/// Normalized image batch of one, laid out as `[1, height, width, 3]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    height: usize,
    width: usize,
}

impl ImageTensor {
    /// Build a tensor from raw NHWC data.
    ///
    /// Returns `None` if `data` does not hold exactly `height * width * 3` values.
    pub fn from_nhwc(data: Vec<f32>, height: usize, width: usize) -> Option<Self> {
        if data.len() != height * width * CHANNELS {
            return None;
        }
        Some(Self {
            data,
            height,
            width,
        })
    }

    /// All-zero tensor, used to warm up the model at startup
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            data: vec![0.0; height * width * CHANNELS],
            height,
            width,
        }
    }

    /// Shape in `[batch, height, width, channels]` order
    pub fn shape(&self) -> [usize; 4] {
        [1, self.height, self.width, CHANNELS]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Decodes and normalizes uploaded images.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl ImagePreprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            filter: config.filter.into(),
        }
    }

    /// Decode `bytes` and produce a `(1, height, width, 3)` tensor.
    ///
    /// Any format the `image` crate can sniff is accepted; everything else is a
    /// decode error. Grayscale, alpha and 16-bit inputs are all reduced to RGB8.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<ImageTensor> {
        let img = image::load_from_memory(bytes)?;
        let (src_width, src_height) = (img.width(), img.height());

        let rgb = img
            .resize_exact(self.width, self.height, self.filter)
            .to_rgb8();

        let data: Vec<f32> = rgb
            .into_raw()
            .into_iter()
            .map(|c| c as f32 / 255.0)
            .collect();

        debug!(
            src_width,
            src_height,
            width = self.width,
            height = self.height,
            "Image preprocessed"
        );

        Ok(ImageTensor {
            data,
            height: self.height as usize,
            width: self.width as usize,
        })
    }

    /// Read an image from disk and preprocess it
    pub fn preprocess_file<P: AsRef<Path>>(&self, path: P) -> Result<ImageTensor> {
        let bytes = std::fs::read(path.as_ref())?;
        self.preprocess(&bytes)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(&PreprocessConfig::default())
    }
}
