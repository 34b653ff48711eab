//! Encoded image results.

use serde::{Deserialize, Serialize};

/// Encoding of a finished image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Parse a configuration value (`png`, `jpg`, `jpeg`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }
}

/// Encoded bytes of one finished render together with their format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResult {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageResult {
    pub fn new(bytes: Vec<u8>, format: ImageFormat) -> Self {
        Self { bytes, format }
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}
