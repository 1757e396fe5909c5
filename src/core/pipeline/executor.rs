//! Pipeline execution implementation.

use super::context::AnalysisContext;
use crate::core::comparator::{
    ExactDuplicateDetector, GroupingStrategy, SimilarityThreshold, DEFAULT_THUMBNAIL_SIZE,
};
use crate::core::consolidator::{FinalGroup, GroupConsolidator, ImageGroup, Statistics};
use crate::core::quality::{QualityScorer, QualityWeights};
use crate::core::similarity::{BackendKind, EmbeddingBackend, SemanticSimilarityMerger};
use crate::core::source::{ImageRef, ImageSource};
use crate::error::{CullerError, Result};
use crate::events::{
    null_sender, Event, EventSender, PipelineEvent, PipelinePhase, PipelineSummary,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// How a batch is analysed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Exact pixel duplicates only
    #[default]
    Pixel,
    /// Pixel duplicates, then embedding-based merging
    Ai,
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisMode::Pixel => write!(f, "pixel"),
            AnalysisMode::Ai => write!(f, "ai"),
        }
    }
}

/// Configuration for the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: AnalysisMode,
    /// Minimum pixel similarity for two images to be duplicates
    pub duplicate_threshold: f64,
    /// Minimum embedding similarity for two groups to merge (AI mode)
    pub similarity_threshold: f64,
    pub grouping: GroupingStrategy,
    pub backend: BackendKind,
    /// Edge length of the comparison thumbnail
    pub thumbnail_size: u32,
    /// Downsample before quality filters (None = full resolution)
    pub analysis_size: Option<u32>,
    pub quality_weights: QualityWeights,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::default(),
            duplicate_threshold: SimilarityThreshold::EXACT_DUPLICATE,
            similarity_threshold: SimilarityThreshold::SEMANTIC,
            grouping: GroupingStrategy::default(),
            backend: BackendKind::default(),
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            analysis_size: None,
            quality_weights: QualityWeights::default(),
        }
    }
}

/// Outcome of one analysis, shaped for JSON output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub groups: Vec<ImageGroup>,
    /// Serialised as `{}` when absent
    #[serde(with = "statistics_or_empty")]
    pub statistics: Option<Statistics>,
    pub duration_ms: u64,
}

impl AnalysisResult {
    /// The payload for a batch with no images
    pub fn empty_input(duration_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(CullerError::EmptyInput.to_string()),
            groups: Vec::new(),
            statistics: None,
            duration_ms,
        }
    }

    pub fn total_images(&self) -> usize {
        self.statistics.as_ref().map_or(0, |s| s.total_images)
    }

    /// Groups with more than one image
    pub fn redundant_groups(&self) -> impl Iterator<Item = &ImageGroup> {
        self.groups.iter().filter(|g| g.is_redundant())
    }
}

mod statistics_or_empty {
    use super::Statistics;
    use serde::de::IgnoredAny;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Statistics>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(stats) => stats.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MaybeStatistics {
        Full(Statistics),
        Empty(IgnoredAny),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<Statistics>, D::Error> {
        Ok(match MaybeStatistics::deserialize(deserializer)? {
            MaybeStatistics::Full(stats) => Some(stats),
            MaybeStatistics::Empty(_) => None,
        })
    }
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    config: PipelineConfig,
    backend: Option<Arc<dyn EmbeddingBackend>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            backend: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mode(mut self, mode: AnalysisMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn duplicate_threshold(mut self, threshold: f64) -> Self {
        self.config.duplicate_threshold = threshold;
        self
    }

    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    pub fn grouping(mut self, grouping: GroupingStrategy) -> Self {
        self.config.grouping = grouping;
        self
    }

    /// Use one of the built-in embedding backends
    pub fn backend_kind(mut self, kind: BackendKind) -> Self {
        self.config.backend = kind;
        self
    }

    /// Use a custom embedding backend; overrides `backend_kind`
    pub fn backend(mut self, backend: Arc<dyn EmbeddingBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn thumbnail_size(mut self, size: u32) -> Self {
        self.config.thumbnail_size = size;
        self
    }

    pub fn analysis_size(mut self, size: Option<u32>) -> Self {
        self.config.analysis_size = size;
        self
    }

    pub fn quality_weights(mut self, weights: QualityWeights) -> Self {
        self.config.quality_weights = weights;
        self
    }

    /// Validate the configuration and build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config;

        let duplicate = SimilarityThreshold::new(config.duplicate_threshold)
            .map_err(|e| CullerError::Config(format!("duplicate_threshold: {}", e)))?;
        let similarity = SimilarityThreshold::new(config.similarity_threshold)
            .map_err(|e| CullerError::Config(format!("similarity_threshold: {}", e)))?;
        if config.thumbnail_size == 0 {
            return Err(CullerError::Config(
                "thumbnail_size must be greater than 0".to_string(),
            ));
        }

        let backend = self.backend.unwrap_or_else(|| config.backend.build());
        let scorer = QualityScorer::new()
            .with_weights(config.quality_weights)
            .with_analysis_size(config.analysis_size);
        let detector = ExactDuplicateDetector::new(duplicate, config.grouping);
        let merger = SemanticSimilarityMerger::new(backend)
            .with_threshold(similarity)
            .with_strategy(config.grouping);

        Ok(Pipeline {
            config,
            scorer,
            detector,
            merger,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Scores, groups and consolidates one batch of images
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    scorer: QualityScorer,
    detector: ExactDuplicateDetector,
    merger: SemanticSimilarityMerger,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyse without events
    pub fn analyze(&self, images: &[ImageRef], source: &dyn ImageSource) -> AnalysisResult {
        self.analyze_with_events(images, source, &null_sender())
    }

    /// Analyse with event reporting.
    ///
    /// Never fails: unreadable images become singletons and an empty batch
    /// produces an error payload with `success = false`.
    pub fn analyze_with_events(
        &self,
        images: &[ImageRef],
        source: &dyn ImageSource,
        events: &EventSender,
    ) -> AnalysisResult {
        let start_time = Instant::now();
        events.send(Event::Pipeline(PipelineEvent::Started {
            total_images: images.len(),
        }));

        if images.is_empty() {
            let result = AnalysisResult::empty_input(start_time.elapsed().as_millis() as u64);
            warn!("analysis requested for an empty batch");
            events.send(Event::Pipeline(PipelineEvent::Error {
                message: CullerError::EmptyInput.to_string(),
            }));
            return result;
        }

        info!(
            images = images.len(),
            mode = %self.config.mode,
            grouping = %self.config.grouping,
            "analysis started"
        );

        // Phase 1: decode, score and thumbnail
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Scoring,
        }));
        let context = AnalysisContext::prepare(
            images,
            source,
            &self.scorer,
            self.config.thumbnail_size,
            events,
        );

        // Phase 2: exact duplicates
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Grouping,
        }));
        let clusters = self
            .detector
            .group_duplicates(context.thumbnails(), events)
            .clusters;

        // Phase 3: semantic merge
        let (final_groups, consolidator): (Vec<FinalGroup>, _) = match self.config.mode {
            AnalysisMode::Pixel => (
                clusters.into_iter().map(FinalGroup::from).collect(),
                GroupConsolidator::duplicates(),
            ),
            AnalysisMode::Ai => {
                events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
                    phase: PipelinePhase::Merging,
                }));
                let merged = self.merger.merge_groups(&clusters, &context, events);
                (
                    merged.into_iter().map(FinalGroup::from).collect(),
                    GroupConsolidator::similar(),
                )
            }
        };

        // Phase 4: labels, best images, statistics
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Consolidating,
        }));
        let (groups, statistics) =
            consolidator.consolidate(final_groups, context.images(), context.qualities());

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let redundant_groups = groups.iter().filter(|g| g.is_redundant()).count();

        info!(
            groups = groups.len(),
            redundant_groups,
            space_saved_bytes = statistics.estimated_space_saved_bytes,
            duration_ms,
            "analysis finished"
        );
        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: PipelineSummary {
                total_images: images.len(),
                total_groups: groups.len(),
                redundant_groups,
                space_saved_bytes: statistics.estimated_space_saved_bytes,
                duration_ms,
            },
        }));

        AnalysisResult {
            success: true,
            error: None,
            groups,
            statistics: Some(statistics),
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::consolidator::GroupKind;
    use crate::core::source::InMemorySource;
    use crate::events::EventChannel;
    use image::{DynamicImage, ImageBuffer, Luma};

    fn gradient(offset: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(32, 32, |x, y| {
            Luma([((x * 4 + y * 3) as u8).wrapping_add(offset)])
        }))
    }

    #[test]
    fn builder_rejects_out_of_range_thresholds() {
        assert!(Pipeline::builder().duplicate_threshold(1.5).build().is_err());
        assert!(Pipeline::builder().similarity_threshold(-0.2).build().is_err());
        assert!(Pipeline::builder().thumbnail_size(0).build().is_err());
    }

    #[test]
    fn builder_defaults_match_config_defaults() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert_eq!(pipeline.config(), &PipelineConfig::default());
        assert_eq!(pipeline.config().duplicate_threshold, 0.96);
        assert_eq!(pipeline.config().similarity_threshold, 0.90);
    }

    #[test]
    fn config_deserializes_partial_json() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"mode": "ai", "grouping": "transitive"}"#).unwrap();

        assert_eq!(config.mode, AnalysisMode::Ai);
        assert_eq!(config.grouping, GroupingStrategy::Transitive);
        assert_eq!(config.thumbnail_size, 64);
    }

    #[test]
    fn empty_batch_is_an_error_payload() {
        let pipeline = Pipeline::builder().build().unwrap();
        let result = pipeline.analyze(&[], &InMemorySource::new());

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("No valid image paths found"));
        assert!(result.groups.is_empty());
        assert!(result.statistics.is_none());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["statistics"], serde_json::json!({}));
    }

    #[test]
    fn result_round_trips_through_json() {
        let source = InMemorySource::new();
        let images = vec![source.insert_image("a.png", &gradient(0)).unwrap()];
        let result = Pipeline::builder().build().unwrap().analyze(&images, &source);

        let json = serde_json::to_string(&result).unwrap();
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.groups.len(), 1);
        assert_eq!(back.total_images(), 1);

        let empty: AnalysisResult =
            serde_json::from_str(&serde_json::to_string(&AnalysisResult::empty_input(0)).unwrap())
                .unwrap();
        assert!(empty.statistics.is_none());
    }

    #[test]
    fn ai_mode_labels_duplicates_as_similar() {
        let source = InMemorySource::new();
        let images = vec![
            source.insert_image("a.png", &gradient(0)).unwrap(),
            source.insert_image("b.png", &gradient(0)).unwrap(),
        ];
        let pipeline = Pipeline::builder().mode(AnalysisMode::Ai).build().unwrap();

        let result = pipeline.analyze(&images, &source);

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].kind, GroupKind::Similar);
        assert_eq!(result.groups[0].id, "similar_0");
    }

    #[test]
    fn emits_phases_in_order() {
        let source = InMemorySource::new();
        let images = vec![
            source.insert_image("a.png", &gradient(0)).unwrap(),
            source.insert_image("b.png", &gradient(90)).unwrap(),
        ];
        let pipeline = Pipeline::builder().mode(AnalysisMode::Ai).build().unwrap();
        let (sender, receiver) = EventChannel::new();

        pipeline.analyze_with_events(&images, &source, &sender);
        drop(sender);

        let phases: Vec<_> = receiver
            .iter()
            .filter_map(|e| match e {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                PipelinePhase::Scoring,
                PipelinePhase::Grouping,
                PipelinePhase::Merging,
                PipelinePhase::Consolidating,
            ]
        );
    }
}
