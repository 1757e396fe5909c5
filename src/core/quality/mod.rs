//! # Quality Analysis Module
//!
//! Scores how good a photo is so the best shot of each group can be kept.
//!
//! ## Metrics
//! Each submetric is normalised to [0, 1]:
//! | Metric     | Measure                                   | Saturates at     |
//! |------------|-------------------------------------------|------------------|
//! | resolution | pixel count                               | 1920x1080        |
//! | sharpness  | Laplacian variance                        | 500              |
//! | brightness | distance of mean luma from mid-grey (127) | exactly 127      |
//! | contrast   | luma standard deviation                   | 50               |
//! | noise      | 1 - variance of a high-pass filter / 1000 | variance 0       |
//!
//! The overall score is their weighted sum (0.30, 0.25, 0.20, 0.15, 0.10).
//! All filters run on Rec.601 luma (see [`crate::core::source::luma`]).

use crate::core::source::to_gray;
use image::{imageops::FilterType, DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// Pixel count treated as "full resolution"
const REFERENCE_PIXELS: f64 = 1920.0 * 1080.0;
const SHARPNESS_SATURATION: f64 = 500.0;
const CONTRAST_SATURATION: f64 = 50.0;
const NOISE_SATURATION: f64 = 1000.0;
const MID_GREY: f64 = 127.0;

/// 4-neighbour Laplacian
const LAPLACIAN: [[f64; 3]; 3] = [[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]];

/// 8-neighbour high-pass filter used for the noise estimate
const HIGH_PASS: [[f64; 3]; 3] = [
    [-1.0, -1.0, -1.0],
    [-1.0, 8.0, -1.0],
    [-1.0, -1.0, -1.0],
];

/// Quality metrics for one image.
///
/// An image that could not be decoded carries only `overall_score = 0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub overall_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpness_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl QualityMetrics {
    /// Metrics for an image that could not be read
    pub fn unreadable() -> Self {
        Self {
            overall_score: 0.0,
            resolution_score: None,
            sharpness_score: None,
            brightness_score: None,
            contrast_score: None,
            noise_score: None,
            width: None,
            height: None,
        }
    }

    /// Whether the image was decoded and fully scored
    pub fn is_readable(&self) -> bool {
        self.resolution_score.is_some()
    }
}

/// Index of the highest-scoring member; ties go to the lowest index
pub fn best_of(members: &[usize], quality: &[QualityMetrics]) -> Option<usize> {
    members.iter().copied().min_by(|&a, &b| {
        quality[b]
            .overall_score
            .total_cmp(&quality[a].overall_score)
            .then(a.cmp(&b))
    })
}

/// Relative weight of each submetric in the overall score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub resolution: f64,
    pub sharpness: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub noise: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            resolution: 0.30,
            sharpness: 0.25,
            brightness: 0.20,
            contrast: 0.15,
            noise: 0.10,
        }
    }
}

impl QualityWeights {
    /// Scale the weights so they sum to 1, keeping the overall score in [0, 1].
    ///
    /// Negative or non-finite weights count as zero; all-zero weights fall
    /// back to the defaults.
    pub fn normalized(self) -> Self {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let parts = [
            clean(self.resolution),
            clean(self.sharpness),
            clean(self.brightness),
            clean(self.contrast),
            clean(self.noise),
        ];
        let total: f64 = parts.iter().sum();
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            resolution: parts[0] / total,
            sharpness: parts[1] / total,
            brightness: parts[2] / total,
            contrast: parts[3] / total,
            noise: parts[4] / total,
        }
    }
}

/// Computes [`QualityMetrics`] from decoded rasters. Pure and deterministic.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    weights: QualityWeights,
    /// Longest side to downsample to before filtering (None = full resolution)
    analysis_size: Option<u32>,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            analysis_size: None,
        }
    }
}

impl QualityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, weights: QualityWeights) -> Self {
        self.weights = weights.normalized();
        self
    }

    /// Downsample images whose longest side exceeds `size` before running
    /// the filters. Resolution is always scored on the true dimensions.
    pub fn with_analysis_size(mut self, size: Option<u32>) -> Self {
        self.analysis_size = size.filter(|s| *s > 0);
        self
    }

    pub fn weights(&self) -> QualityWeights {
        self.weights
    }

    /// Score a decoded image
    pub fn score(&self, image: &DynamicImage) -> QualityMetrics {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return QualityMetrics::unreadable();
        }

        let resolution = ((width as f64 * height as f64) / REFERENCE_PIXELS).min(1.0);

        let gray = match self.analysis_size {
            Some(size) if width.max(height) > size => {
                to_gray(&image.resize(size, size, FilterType::Triangle))
            }
            _ => to_gray(image),
        };

        let sharpness = (laplacian_variance(&gray) / SHARPNESS_SATURATION).min(1.0);
        let (mean, std_dev) = mean_and_std_dev(&gray);
        let brightness = (1.0 - (mean - MID_GREY).abs() / MID_GREY).clamp(0.0, 1.0);
        let contrast = (std_dev / CONTRAST_SATURATION).min(1.0);
        let noise = (1.0 - high_pass_variance(&gray) / NOISE_SATURATION).clamp(0.0, 1.0);

        let w = self.weights;
        let overall = (w.resolution * resolution
            + w.sharpness * sharpness
            + w.brightness * brightness
            + w.contrast * contrast
            + w.noise * noise)
            .clamp(0.0, 1.0);

        QualityMetrics {
            overall_score: overall,
            resolution_score: Some(resolution),
            sharpness_score: Some(sharpness),
            brightness_score: Some(brightness),
            contrast_score: Some(contrast),
            noise_score: Some(noise),
            width: Some(width),
            height: Some(height),
        }
    }
}

/// Mirror an out-of-range coordinate back inside `0..len` without repeating
/// the edge pixel (gfedcb|abcdefgh|gfedcba).
fn reflect_101(index: i64, len: i64) -> usize {
    if len == 1 {
        return 0;
    }
    let mut i = index;
    if i < 0 {
        i = -i;
    }
    if i >= len {
        i = 2 * len - 2 - i;
    }
    i.clamp(0, len - 1) as usize
}

/// Apply a 3x3 kernel to every pixel
fn convolve_3x3(gray: &GrayImage, kernel: &[[f64; 3]; 3]) -> Vec<f64> {
    let (width, height) = (gray.width() as i64, gray.height() as i64);
    let pixels = gray.as_raw();
    let mut output = Vec::with_capacity((width * height) as usize);

    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (ky, row) in kernel.iter().enumerate() {
                let sy = reflect_101(y + ky as i64 - 1, height);
                for (kx, weight) in row.iter().enumerate() {
                    if *weight == 0.0 {
                        continue;
                    }
                    let sx = reflect_101(x + kx as i64 - 1, width);
                    acc += weight * pixels[sy * width as usize + sx] as f64;
                }
            }
            output.push(acc);
        }
    }

    output
}

/// Population variance
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Sharpness: variance of the Laplacian response
fn laplacian_variance(gray: &GrayImage) -> f64 {
    variance(&convolve_3x3(gray, &LAPLACIAN))
}

/// Noise: variance of the high-pass response saturated to the 8-bit range
fn high_pass_variance(gray: &GrayImage) -> f64 {
    let response: Vec<f64> = convolve_3x3(gray, &HIGH_PASS)
        .into_iter()
        .map(|v| v.round().clamp(0.0, 255.0))
        .collect();
    variance(&response)
}

fn mean_and_std_dev(gray: &GrayImage) -> (f64, f64) {
    let pixels: Vec<f64> = gray.pixels().map(|p| p[0] as f64).collect();
    if pixels.is_empty() {
        return (MID_GREY, 0.0);
    }
    let n = pixels.len() as f64;
    let mean = pixels.iter().sum::<f64>() / n;
    (mean, variance(&pixels).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb};

    fn uniform(value: u8, size: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(size, size, |_, _| Luma([value])))
    }

    fn checkerboard(size: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        }))
    }

    fn gradient(size: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(size, size, |x, _| {
            Luma([(x % 256) as u8])
        }))
    }

    #[test]
    fn uniform_mid_grey_scores_only_brightness_and_noise() {
        let metrics = QualityScorer::new().score(&uniform(127, 64));
        let resolution = 64.0 * 64.0 / REFERENCE_PIXELS;

        assert_eq!(metrics.sharpness_score, Some(0.0));
        assert_eq!(metrics.contrast_score, Some(0.0));
        assert_eq!(metrics.brightness_score, Some(1.0));
        assert_eq!(metrics.noise_score, Some(1.0));
        assert!((metrics.overall_score - (0.30 * resolution + 0.20 + 0.10)).abs() < 1e-9);
    }

    #[test]
    fn pure_red_brightness_uses_rec601_luma() {
        let red = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(64, 64, Rgb([255, 0, 0])));
        let metrics = QualityScorer::new().score(&red);

        // Rec.601 luma of pure red is 76
        let expected = 1.0 - (76.0f64 - 127.0).abs() / 127.0;
        let brightness = metrics.brightness_score.unwrap();
        assert!((brightness - expected).abs() < 1e-9, "got {brightness}");
        assert_eq!(metrics.contrast_score, Some(0.0));
    }

    #[test]
    fn checkerboard_is_sharp_and_noisy() {
        let metrics = QualityScorer::new().score(&checkerboard(64));

        assert_eq!(metrics.sharpness_score, Some(1.0));
        assert_eq!(metrics.contrast_score, Some(1.0));
        assert_eq!(metrics.noise_score, Some(0.0));
    }

    #[test]
    fn white_image_brightness_is_clamped_to_zero() {
        let metrics = QualityScorer::new().score(&uniform(255, 16));
        assert_eq!(metrics.brightness_score, Some(0.0));
    }

    #[test]
    fn gradient_has_contrast() {
        let metrics = QualityScorer::new().score(&gradient(256));
        assert!(metrics.contrast_score.unwrap() > 0.9);
    }

    #[test]
    fn resolution_uses_true_dimensions_when_downsampling() {
        let full_hd = DynamicImage::ImageRgb8(ImageBuffer::from_fn(1920, 1080, |x, y| {
            Rgb([(x % 200) as u8, (y % 200) as u8, 40])
        }));
        let metrics = QualityScorer::new()
            .with_analysis_size(Some(64))
            .score(&full_hd);

        assert_eq!(metrics.resolution_score, Some(1.0));
        assert_eq!(metrics.width, Some(1920));
        assert_eq!(metrics.height, Some(1080));
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let scorer = QualityScorer::new();
        for image in [uniform(0, 8), uniform(255, 8), checkerboard(32), gradient(100)] {
            let metrics = scorer.score(&image);
            assert!((0.0..=1.0).contains(&metrics.overall_score));
            for sub in [
                metrics.resolution_score,
                metrics.sharpness_score,
                metrics.brightness_score,
                metrics.contrast_score,
                metrics.noise_score,
            ] {
                assert!((0.0..=1.0).contains(&sub.unwrap()));
            }
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = QualityScorer::new();
        let image = gradient(48);
        assert_eq!(scorer.score(&image), scorer.score(&image));
    }

    #[test]
    fn single_pixel_image_is_scored() {
        let metrics = QualityScorer::new().score(&uniform(127, 1));
        assert!(metrics.is_readable());
        assert_eq!(metrics.sharpness_score, Some(0.0));
    }

    #[test]
    fn unreadable_serializes_only_overall_score() {
        let metrics = QualityMetrics::unreadable();
        let json = serde_json::to_string(&metrics).unwrap();

        assert_eq!(metrics.overall_score, 0.0);
        assert!(!metrics.is_readable());
        assert_eq!(json, r#"{"overall_score":0.0}"#);
    }

    #[test]
    fn custom_weights_are_normalized() {
        let weights = QualityWeights {
            resolution: 2.0,
            sharpness: 2.0,
            brightness: 0.0,
            contrast: 0.0,
            noise: -1.0,
        }
        .normalized();

        assert_eq!(weights.resolution, 0.5);
        assert_eq!(weights.sharpness, 0.5);
        assert_eq!(weights.noise, 0.0);
    }

    #[test]
    fn reflect_101_mirrors_without_repeating_edge() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(2, 5), 2);
        assert_eq!(reflect_101(-1, 1), 0);
    }
}
