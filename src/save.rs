//! The save node itself
//!
//! Walks a batch in order, encodes each frame per the format policy,
//! embeds workflow metadata where asked to, and reports the written
//! files back in the shape the host UI expects.

use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tracing::{debug, info};

use crate::batch::{ImageBatch, ImageFrame};
use crate::exif;
use crate::models::{HostSettings, MetadataBundle, SaveConfig, SaveSummary, SavedImage};
use crate::paths::{OutputPathResolver, SavePathService};
use crate::policy::{EncoderOptions, FormatPolicy, MetadataStrategy};
use crate::{Error, Result};

pub struct SaveImageNode {
    paths: Box<dyn SavePathService>,
    settings: HostSettings,
}

impl SaveImageNode {
    /// Node writing into the given output directory with the standard
    /// path layout.
    pub fn new(output_dir: impl Into<PathBuf>, settings: HostSettings) -> Self {
        Self {
            paths: Box::new(OutputPathResolver::new(output_dir)),
            settings,
        }
    }

    /// Node backed by a custom path service, for hosts that own their
    /// directory layout.
    pub fn with_path_service(paths: Box<dyn SavePathService>, settings: HostSettings) -> Self {
        Self { paths, settings }
    }

    /// Saves every frame of the batch and returns the file descriptors
    /// in batch order. Files written before an error stay on disk.
    pub fn save_images(
        &self,
        batch: &ImageBatch,
        config: &SaveConfig,
        metadata: Option<&MetadataBundle>,
    ) -> Result<SaveSummary> {
        let policy = FormatPolicy::for_file_type(config.file_type);
        let first = batch.first();
        let mut parts = self
            .paths
            .resolve(&config.filename_prefix, first.width(), first.height())?;

        let embed = config.save_metadata && !self.settings.disable_metadata;
        let metadata = if embed { metadata } else { None };

        // Embedding payloads are the same for every frame of the batch.
        let mut chunks = Vec::new();
        let mut comment = None;
        if let Some(bundle) = metadata {
            match policy.metadata {
                MetadataStrategy::PngTextChunks => chunks = bundle.png_chunks()?,
                MetadataStrategy::ExifUserComment => comment = Some(bundle.exif_comment()?),
            }
        }

        info!(
            "Saving {} image(s) as {} into {}",
            batch.len(),
            config.file_type,
            parts.folder.display()
        );

        let mut images = Vec::with_capacity(batch.len());
        for frame in batch.frames() {
            let filename = format!("{}_{:05}_.{}", parts.stem, parts.counter, policy.extension);
            let path = parts.folder.join(&filename);

            let bytes = match policy.encoding {
                EncoderOptions::Png { compression_level } => {
                    encode_png(frame, compression_level, &chunks)?
                }
                EncoderOptions::Jpeg { quality } => {
                    let encoded = encode_jpeg(frame, quality)?;
                    attach_exif_jpeg(encoded, comment.as_deref())?
                }
                EncoderOptions::WebpLossless => {
                    let encoded = encode_webp(frame, None)?;
                    attach_exif_webp(encoded, comment.as_deref(), frame)?
                }
                EncoderOptions::WebpLossy { quality } => {
                    let encoded = encode_webp(frame, Some(quality))?;
                    attach_exif_webp(encoded, comment.as_deref(), frame)?
                }
            };
            std::fs::write(&path, &bytes)?;
            debug!("Wrote {}", path.display());

            images.push(SavedImage::output(filename, parts.subfolder.clone()));
            parts.counter += 1;
        }

        Ok(SaveSummary::new(images))
    }
}

fn encode_png(frame: &ImageFrame, compression_level: u8, chunks: &[(String, String)]) -> Result<Vec<u8>> {
    let rgb = frame.to_rgb8();
    let mut bytes = Vec::new();

    let mut encoder = png::Encoder::new(&mut bytes, frame.width(), frame.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png_compression(compression_level));
    for (keyword, text) in chunks {
        encoder.add_text_chunk(keyword.clone(), text.clone())?;
    }
    let mut writer = encoder.write_header()?;
    writer.write_image_data(rgb.as_raw())?;
    writer.finish()?;

    Ok(bytes)
}

/// Maps a zlib-style level onto the presets the encoder exposes.
fn png_compression(level: u8) -> png::Compression {
    match level {
        0..=3 => png::Compression::Fast,
        4..=6 => png::Compression::Default,
        _ => png::Compression::Best,
    }
}

fn encode_jpeg(frame: &ImageFrame, quality: u8) -> Result<Vec<u8>> {
    let rgb = frame.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).write_image(
        rgb.as_raw(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(bytes)
}

fn encode_webp(frame: &ImageFrame, quality: Option<f32>) -> Result<Vec<u8>> {
    let rgb = frame.to_rgb8();
    let encoder = webp::Encoder::from_rgb(rgb.as_raw(), frame.width(), frame.height());
    let encoded = match quality {
        Some(quality) => encoder.encode_simple(false, quality),
        None => encoder.encode_simple(true, 100.0),
    }
    .map_err(|e| Error::WebpEncode(format!("{:?}", e)))?;
    Ok(encoded.to_vec())
}

fn attach_exif_jpeg(encoded: Vec<u8>, comment: Option<&str>) -> Result<Vec<u8>> {
    match comment {
        Some(comment) => exif::embed_in_jpeg(&encoded, &exif::user_comment_tiff(comment)),
        None => Ok(encoded),
    }
}

fn attach_exif_webp(encoded: Vec<u8>, comment: Option<&str>, frame: &ImageFrame) -> Result<Vec<u8>> {
    match comment {
        Some(comment) => exif::embed_in_webp(
            &encoded,
            &exif::user_comment_tiff(comment),
            frame.width(),
            frame.height(),
        ),
        None => Ok(encoded),
    }
}
