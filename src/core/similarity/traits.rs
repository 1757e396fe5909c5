//! Embedding vectors and the pluggable backend that produces them.

use crate::error::{CompareError, EmbeddingError};
use image::DynamicImage;

/// An L2-normalised feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// Normalise a raw feature vector.
    ///
    /// Zero and non-finite vectors have no direction and are rejected.
    pub fn new(raw: Vec<f32>) -> Result<Self, EmbeddingError> {
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite);
        }

        let norm = raw
            .iter()
            .map(|&v| f64::from(v) * f64::from(v))
            .sum::<f64>()
            .sqrt();
        if norm == 0.0 {
            return Err(EmbeddingError::ZeroVector);
        }

        let values = raw
            .into_iter()
            .map(|v| (f64::from(v) / norm) as f32)
            .collect();
        Ok(Self { values })
    }

    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Cosine similarity clamped to [0, 1]; opposed vectors count as 0
    pub fn cosine(&self, other: &Embedding) -> Result<f64, CompareError> {
        if self.values.len() != other.values.len() {
            return Err(CompareError::DimensionMismatch {
                left: self.values.len(),
                right: other.values.len(),
            });
        }

        let dot: f64 = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(&a, &b)| f64::from(a) * f64::from(b))
            .sum();

        Ok(dot.clamp(0.0, 1.0))
    }
}

/// Extracts comparable embeddings from decoded images.
///
/// Implementations must be deterministic: the same raster always gives the
/// same embedding.
pub trait EmbeddingBackend: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Compute the embedding of one image
    fn extract(&self, image: &DynamicImage) -> Result<Embedding, EmbeddingError>;

    /// Similarity of two embeddings in [0, 1]
    fn compare(&self, a: &Embedding, b: &Embedding) -> Result<f64, CompareError> {
        a.cosine(b)
    }
}
