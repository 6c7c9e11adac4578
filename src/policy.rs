//! Per-format save policy
//!
//! Maps each file type onto its extension, encoder options, and
//! metadata embedding strategy. Kept as one closed table so format
//! behavior is testable without touching the filesystem.

use crate::models::FileType;

/// How encoded bytes get their metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataStrategy {
    /// Textual chunks written during PNG encoding.
    PngTextChunks,
    /// A single EXIF user comment spliced into the encoded container.
    ExifUserComment,
}

/// Encoder selection and its fixed tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncoderOptions {
    Png { compression_level: u8 },
    Jpeg { quality: u8 },
    WebpLossless,
    WebpLossy { quality: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatPolicy {
    pub extension: &'static str,
    pub encoding: EncoderOptions,
    pub metadata: MetadataStrategy,
}

impl FormatPolicy {
    pub fn for_file_type(file_type: FileType) -> Self {
        match file_type {
            FileType::Png => Self {
                extension: "png",
                encoding: EncoderOptions::Png {
                    compression_level: 4,
                },
                metadata: MetadataStrategy::PngTextChunks,
            },
            FileType::Jpeg => Self {
                extension: "jpg",
                encoding: EncoderOptions::Jpeg { quality: 90 },
                metadata: MetadataStrategy::ExifUserComment,
            },
            FileType::WebpLossless => Self {
                extension: "webp",
                encoding: EncoderOptions::WebpLossless,
                metadata: MetadataStrategy::ExifUserComment,
            },
            FileType::WebpLossy => Self {
                extension: "webp",
                encoding: EncoderOptions::WebpLossy { quality: 90.0 },
                metadata: MetadataStrategy::ExifUserComment,
            },
        }
    }
}
