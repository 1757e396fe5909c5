//! # Comparator Module
//!
//! Finds exact duplicates by comparing low-resolution grayscale thumbnails.
//!
//! ## How It Works
//! 1. Each image is reduced once to a square grayscale thumbnail (64×64)
//! 2. Two thumbnails are compared by mean-squared pixel error
//! 3. The error becomes a similarity: `1 − mse / 255²`
//! 4. Images are grouped with the configured [`GroupingStrategy`]
//!
//! ## Grouping
//! The default is seed-only: a later image joins a group when it matches the
//! group's *first* member. Members are not compared to each other, so a
//! chain A~B~C where A≁C splits into {A, B} and {C}. Set
//! [`GroupingStrategy::Transitive`] to merge whole connected components
//! instead.

mod fast_resize;
mod grouper;
mod traits;

pub use fast_resize::{thumbnail, FastResizer};
pub use grouper::{
    Cluster, GroupingOutcome, GroupingStrategy, SeedGrouper, TransitiveGrouper,
};
pub use traits::{SimilarityOracle, SimilarityThreshold};

use crate::error::CompareError;
use crate::events::{CompareEvent, Event, EventSender};
use image::GrayImage;
use tracing::info;

/// Default thumbnail edge length for pixel comparison
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 64;

/// Largest possible squared error for one 8-bit pixel
const MAX_SQUARED_ERROR: f64 = 255.0 * 255.0;

/// Pixel similarity of two thumbnails in [0, 1]
///
/// Thumbnails come from [`thumbnail`]: the colour raster is
/// resized with bilinear interpolation and no antialiasing, then reduced to
/// Rec.601 luma. This follows OpenCV's `INTER_LINEAR` + `BGR2GRAY` order.
/// Sample placement and rounding inside the resizer differ slightly from
/// OpenCV, so scores near a threshold can move by a few thousandths.
pub fn pixel_similarity(a: &GrayImage, b: &GrayImage) -> Result<f64, CompareError> {
    if a.dimensions() != b.dimensions() {
        return Err(CompareError::SizeMismatch {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }

    let pixels = a.as_raw().len();
    if pixels == 0 {
        return Ok(1.0);
    }

    let sum: f64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| {
            let diff = f64::from(x) - f64::from(y);
            diff * diff
        })
        .sum();
    let mse = sum / pixels as f64;

    Ok((1.0 - mse / MAX_SQUARED_ERROR).clamp(0.0, 1.0))
}

/// Thumbnails for a batch; `None` marks an image that could not be decoded
#[derive(Debug, Clone, Default)]
pub struct ThumbnailSet {
    thumbnails: Vec<Option<GrayImage>>,
}

impl ThumbnailSet {
    pub fn new(thumbnails: Vec<Option<GrayImage>>) -> Self {
        Self { thumbnails }
    }

    pub fn get(&self, index: usize) -> Option<&GrayImage> {
        self.thumbnails.get(index).and_then(Option::as_ref)
    }
}

impl SimilarityOracle for ThumbnailSet {
    fn len(&self) -> usize {
        self.thumbnails.len()
    }

    fn is_comparable(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    fn similarity(&self, a: usize, b: usize) -> Result<f64, CompareError> {
        let left = self.get(a).ok_or(CompareError::MissingData { index: a })?;
        let right = self.get(b).ok_or(CompareError::MissingData { index: b })?;
        pixel_similarity(left, right)
    }
}

/// Partitions a batch into exact-duplicate groups
#[derive(Debug, Clone, Copy)]
pub struct ExactDuplicateDetector {
    threshold: SimilarityThreshold,
    strategy: GroupingStrategy,
}

impl ExactDuplicateDetector {
    pub fn new(threshold: SimilarityThreshold, strategy: GroupingStrategy) -> Self {
        Self {
            threshold,
            strategy,
        }
    }

    pub fn threshold(&self) -> SimilarityThreshold {
        self.threshold
    }

    pub fn strategy(&self) -> GroupingStrategy {
        self.strategy
    }

    /// Group the oracle's items. Fewer than two items are returned as
    /// singletons without any comparison.
    pub fn group_duplicates(
        &self,
        oracle: &dyn SimilarityOracle,
        events: &EventSender,
    ) -> GroupingOutcome {
        let n = oracle.len();
        events.send(Event::Compare(CompareEvent::Started { total_images: n }));

        let outcome = if n < 2 {
            GroupingOutcome {
                clusters: (0..n).map(Cluster::singleton).collect(),
                ..GroupingOutcome::default()
            }
        } else {
            self.strategy.group(oracle, self.threshold, events)
        };

        info!(
            images = n,
            groups = outcome.clusters.len(),
            comparisons = outcome.comparisons,
            failures = outcome.failures,
            strategy = %self.strategy,
            "duplicate detection finished"
        );
        events.send(Event::Compare(CompareEvent::Completed {
            total_groups: outcome.clusters.len(),
            comparisons: outcome.comparisons,
        }));

        outcome
    }
}

impl Default for ExactDuplicateDetector {
    fn default() -> Self {
        Self {
            threshold: SimilarityThreshold::exact_duplicate(),
            strategy: GroupingStrategy::default(),
        }
    }
}
