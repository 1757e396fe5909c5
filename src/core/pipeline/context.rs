//! Per-run memo of decoded image facts.

use crate::core::comparator::{thumbnail, ThumbnailSet};
use crate::core::quality::{best_of, QualityMetrics, QualityScorer};
use crate::core::similarity::{Embedding, EmbeddingBackend};
use crate::core::source::{ImageRef, ImageSource};
use crate::error::EmbeddingError;
use crate::events::{Event, EventSender, QualityEvent, ScoreProgress};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Everything one analysis learns about its images.
///
/// Each image is decoded once up front to compute its quality and pixel
/// thumbnail; the full raster is then dropped. Embeddings are filled in
/// lazily and at most once, only for images that end up as group
/// representatives. Nothing here outlives the run.
pub struct AnalysisContext<'a> {
    images: &'a [ImageRef],
    source: &'a dyn ImageSource,
    quality: Vec<QualityMetrics>,
    thumbnails: ThumbnailSet,
    embeddings: Vec<OnceLock<Result<Embedding, EmbeddingError>>>,
}

impl<'a> AnalysisContext<'a> {
    /// Decode, score and thumbnail every image in parallel
    pub fn prepare(
        images: &'a [ImageRef],
        source: &'a dyn ImageSource,
        scorer: &QualityScorer,
        thumbnail_size: u32,
        events: &EventSender,
    ) -> Self {
        let total = images.len();
        events.send(Event::Quality(QualityEvent::Started {
            total_images: total,
        }));

        let completed = AtomicUsize::new(0);
        let prepared: Vec<(QualityMetrics, Option<image::GrayImage>)> = images
            .par_iter()
            .enumerate()
            .map(|(index, image_ref)| {
                let entry = match source.load(image_ref) {
                    Ok(decoded) => {
                        let metrics = scorer.score(&decoded);
                        let thumb = match thumbnail(&decoded, thumbnail_size) {
                            Ok(thumb) => Some(thumb),
                            Err(error) => {
                                warn!(index, content = %image_ref.content, %error, "thumbnail failed");
                                None
                            }
                        };
                        debug!(index, score = metrics.overall_score, "scored");
                        (metrics, thumb)
                    }
                    Err(error) => {
                        warn!(index, content = %image_ref.content, %error, "image unreadable");
                        events.send(Event::Quality(QualityEvent::Unreadable {
                            index,
                            content: image_ref.content.clone(),
                            message: error.to_string(),
                        }));
                        (QualityMetrics::unreadable(), None)
                    }
                };

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                events.send(Event::Quality(QualityEvent::Progress(ScoreProgress {
                    completed: done,
                    total,
                })));
                entry
            })
            .collect();

        let (quality, thumbnails): (Vec<_>, Vec<_>) = prepared.into_iter().unzip();
        let unreadable = quality.iter().filter(|q| !q.is_readable()).count();

        info!(images = total, unreadable, "quality scoring finished");
        events.send(Event::Quality(QualityEvent::Completed {
            scored: total - unreadable,
            unreadable,
        }));

        Self {
            images,
            source,
            quality,
            thumbnails: ThumbnailSet::new(thumbnails),
            embeddings: (0..total).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn image(&self, index: usize) -> &ImageRef {
        &self.images[index]
    }

    pub fn images(&self) -> &[ImageRef] {
        self.images
    }

    pub fn quality(&self, index: usize) -> &QualityMetrics {
        &self.quality[index]
    }

    pub fn qualities(&self) -> &[QualityMetrics] {
        &self.quality
    }

    pub fn thumbnails(&self) -> &ThumbnailSet {
        &self.thumbnails
    }

    /// Highest-quality member; ties go to the lowest index
    pub fn best_member(&self, members: &[usize]) -> Option<usize> {
        best_of(members, &self.quality)
    }

    /// Embedding of one image, extracted on first request
    pub fn embedding(
        &self,
        index: usize,
        backend: &dyn EmbeddingBackend,
    ) -> Result<&Embedding, &EmbeddingError> {
        self.embeddings[index]
            .get_or_init(|| self.extract(index, backend))
            .as_ref()
    }

    fn extract(
        &self,
        index: usize,
        backend: &dyn EmbeddingBackend,
    ) -> Result<Embedding, EmbeddingError> {
        let image_ref = &self.images[index];
        if !self.quality[index].is_readable() {
            return Err(EmbeddingError::Load {
                content: image_ref.content.clone(),
                reason: "image could not be decoded".to_string(),
            });
        }

        let decoded = self
            .source
            .load(image_ref)
            .map_err(|e| EmbeddingError::Load {
                content: image_ref.content.clone(),
                reason: e.to_string(),
            })?;
        debug!(index, backend = backend.name(), "extracting embedding");
        backend.extract(&decoded)
    }
}
