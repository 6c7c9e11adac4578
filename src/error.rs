//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PNG encoding error: {0}")]
    PngEncode(#[from] png::EncodingError),

    #[error("WebP encoding error: {0}")]
    WebpEncode(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Image batch is empty")]
    EmptyBatch,

    #[error("Image buffer has {actual} samples, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Filename prefix escapes the output directory: {0}")]
    OutsideOutputDirectory(String),
}

pub type Result<T> = std::result::Result<T, Error>;
