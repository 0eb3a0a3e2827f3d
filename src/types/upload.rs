//! Uploaded file data structures

use axum::body::Bytes;
use std::path::Path;

/// Longest client extension carried over to the scratch file name
const MAX_EXTENSION_LEN: usize = 8;

/// An image received from a client, before it is written to scratch storage
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Filename supplied by the client, if any. Only used for logging and
    /// to pick a file extension.
    pub file_name: Option<String>,
    /// Raw request bytes
    pub bytes: Bytes,
}

impl UploadedImage {
    pub fn new(file_name: Option<String>, bytes: Bytes) -> Self {
        Self { file_name, bytes }
    }

    /// Lowercased extension of the client filename, if it is short and alphanumeric.
    ///
    /// Anything else (path separators, dots, overly long suffixes) is dropped so the
    /// client never controls more than a harmless suffix of the scratch path.
    pub fn safe_extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let ext = Path::new(name).extension()?.to_str()?;

        if ext.is_empty()
            || ext.len() > MAX_EXTENSION_LEN
            || !ext.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return None;
        }

        Some(ext.to_ascii_lowercase())
    }
}
