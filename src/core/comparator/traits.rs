//! Comparison seams shared by pixel and embedding grouping.

use crate::error::CompareError;
use serde::{Deserialize, Serialize};

/// Pairwise similarity over a fixed, indexed set of items.
///
/// Implemented by pixel thumbnails for exact-duplicate detection and by
/// group representatives' embeddings for the semantic merge, so both run
/// through the same grouping algorithms.
pub trait SimilarityOracle: Sync {
    /// Number of items
    fn len(&self) -> usize;

    /// Whether an item can take part in comparisons at all.
    ///
    /// Items that cannot (undecodable images, failed embeddings) always end
    /// up as singletons and are never compared.
    fn is_comparable(&self, index: usize) -> bool;

    /// Similarity of two comparable items, in [0, 1]
    fn similarity(&self, a: usize, b: usize) -> Result<f64, CompareError>;
}

/// A minimum similarity for two items to be grouped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SimilarityThreshold(f64);

impl SimilarityThreshold {
    /// Default cut-off for pixel-level exact duplicates
    pub const EXACT_DUPLICATE: f64 = 0.96;
    /// Default cut-off for embedding similarity
    pub const SEMANTIC: f64 = 0.90;

    /// Create a threshold; must be a finite value in [0, 1]
    pub fn new(value: f64) -> Result<Self, String> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("Threshold {} must be between 0 and 1", value))
        }
    }

    /// The default exact-duplicate threshold
    pub const fn exact_duplicate() -> Self {
        Self(Self::EXACT_DUPLICATE)
    }

    /// The default semantic-merge threshold
    pub const fn semantic() -> Self {
        Self(Self::SEMANTIC)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Inclusive comparison: a similarity equal to the threshold matches
    pub fn is_match(&self, similarity: f64) -> bool {
        similarity >= self.0
    }
}

impl TryFrom<f64> for SimilarityThreshold {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SimilarityThreshold> for f64 {
    fn from(threshold: SimilarityThreshold) -> Self {
        threshold.0
    }
}
