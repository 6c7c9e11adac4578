//! Image frames and batches
//!
//! The host hands generated images over as float tensors: height by
//! width by three channels, values in [0, 1]. These types carry that
//! data with the shape checked up front.

use image::RgbImage;

use crate::{Error, Result};

/// One decoded raster frame: row-major RGB, `f32` samples in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    width: u32,
    height: u32,
    samples: Vec<f32>,
}

impl ImageFrame {
    /// Builds a frame from raw samples. Fails unless
    /// `samples.len() == width * height * 3`.
    pub fn from_samples(width: u32, height: u32, samples: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if samples.len() != expected {
            return Err(Error::ShapeMismatch {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// A frame filled with a single RGB value, mostly useful in tests.
    pub fn filled(width: u32, height: u32, rgb: [f32; 3]) -> Self {
        let mut samples = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            samples.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            samples,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Converts to 8-bit RGB: scale by 255, clamp to [0, 255], truncate.
    /// Out-of-range inputs saturate rather than wrap.
    pub fn to_rgb8(&self) -> RgbImage {
        let pixels: Vec<u8> = self
            .samples
            .iter()
            .map(|&v| (v * 255.0).clamp(0.0, 255.0) as u8)
            .collect();
        RgbImage::from_raw(self.width, self.height, pixels)
            .expect("sample count checked at construction")
    }
}

/// A non-empty ordered batch of frames. Save order follows batch order,
/// and the first frame's dimensions drive output path resolution.
#[derive(Debug, Clone)]
pub struct ImageBatch {
    frames: Vec<ImageFrame>,
}

impl ImageBatch {
    pub fn new(frames: Vec<ImageFrame>) -> Result<Self> {
        if frames.is_empty() {
            return Err(Error::EmptyBatch);
        }
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[ImageFrame] {
        &self.frames
    }

    pub fn first(&self) -> &ImageFrame {
        &self.frames[0]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; emptiness is rejected at construction.
    pub fn is_empty(&self) -> bool {
        false
    }
}
