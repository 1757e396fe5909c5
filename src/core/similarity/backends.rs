//! Built-in embedding backends.
//!
//! Neither backend needs a model file. [`HistogramBackend`] reproduces the
//! luma-histogram feature vector; [`ColorLayoutBackend`] keeps a coarse
//! picture of where colours sit in the frame, so a reframed shot of the same
//! scene still lands close while a different scene with a similar palette
//! does not.

use super::traits::{Embedding, EmbeddingBackend};
use crate::core::source::to_gray;
use crate::error::EmbeddingError;
use image::imageops::FilterType;
use image::DynamicImage;

/// Number of luma levels in the histogram
const HISTOGRAM_BINS: usize = 256;

/// Luma histogram, normalised to sum 1 and zero-padded
#[derive(Debug, Clone)]
pub struct HistogramBackend {
    dimensions: usize,
}

impl HistogramBackend {
    /// Default vector length
    pub const DIMENSIONS: usize = 512;

    pub fn new() -> Self {
        Self {
            dimensions: Self::DIMENSIONS,
        }
    }
}

impl Default for HistogramBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingBackend for HistogramBackend {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn extract(&self, image: &DynamicImage) -> Result<Embedding, EmbeddingError> {
        let luma = to_gray(image);
        let total = luma.as_raw().len();
        if total == 0 {
            return Err(EmbeddingError::ZeroVector);
        }

        let mut counts = [0u64; HISTOGRAM_BINS];
        for &value in luma.as_raw() {
            counts[value as usize] += 1;
        }

        let mut features: Vec<f32> = counts
            .iter()
            .map(|&c| (c as f64 / total as f64) as f32)
            .collect();
        features.resize(self.dimensions, 0.0);

        Embedding::new(features)
    }
}

/// Coarse spatial colour layout.
///
/// The image is squeezed to a `grid`×`grid` RGB raster; each channel is
/// centred on its mean, and the three channel means plus a constant bias
/// are appended.
#[derive(Debug, Clone)]
pub struct ColorLayoutBackend {
    grid: u32,
}

impl ColorLayoutBackend {
    pub const DEFAULT_GRID: u32 = 8;

    /// Weight of the constant component that keeps flat images non-zero
    const BIAS: f32 = 0.5;

    pub fn new() -> Self {
        Self {
            grid: Self::DEFAULT_GRID,
        }
    }

    pub fn dimensions(&self) -> usize {
        (self.grid * self.grid * 3) as usize + 4
    }
}

impl Default for ColorLayoutBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingBackend for ColorLayoutBackend {
    fn name(&self) -> &'static str {
        "color_layout"
    }

    fn extract(&self, image: &DynamicImage) -> Result<Embedding, EmbeddingError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EmbeddingError::ZeroVector);
        }

        let small = image
            .resize_exact(self.grid, self.grid, FilterType::Triangle)
            .to_rgb8();
        let cells = (self.grid * self.grid) as f32;

        let mut means = [0f32; 3];
        for pixel in small.pixels() {
            for (channel, mean) in means.iter_mut().enumerate() {
                *mean += f32::from(pixel[channel]) / 255.0;
            }
        }
        for mean in &mut means {
            *mean /= cells;
        }

        let mut features = Vec::with_capacity(self.dimensions());
        for pixel in small.pixels() {
            for (channel, mean) in means.iter().enumerate() {
                features.push(f32::from(pixel[channel]) / 255.0 - mean);
            }
        }
        features.extend_from_slice(&means);
        features.push(Self::BIAS);

        Embedding::new(features)
    }
}
