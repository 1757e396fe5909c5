//! Merging duplicate groups whose representatives look alike.

use super::backends::{ColorLayoutBackend, HistogramBackend};
use super::traits::{Embedding, EmbeddingBackend};
use crate::core::comparator::{Cluster, GroupingStrategy, SimilarityOracle, SimilarityThreshold};
use crate::core::pipeline::AnalysisContext;
use crate::error::CompareError;
use crate::events::{null_sender, Event, EventSender, MergeEvent};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Which built-in embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Normalised luma histogram
    #[default]
    Histogram,
    /// Downsampled spatial colour layout
    ColorLayout,
}

impl BackendKind {
    pub fn build(self) -> Arc<dyn EmbeddingBackend> {
        match self {
            BackendKind::Histogram => Arc::new(HistogramBackend::new()),
            BackendKind::ColorLayout => Arc::new(ColorLayoutBackend::new()),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Histogram => write!(f, "histogram"),
            BackendKind::ColorLayout => write!(f, "color-layout"),
        }
    }
}

/// A group after the semantic merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergedGroup {
    /// Image indices; each absorbed group's members follow in order
    pub members: Vec<usize>,
    /// Weakest embedding link that joined this group, if any
    pub merge_similarity: Option<f64>,
}

impl MergedGroup {
    fn from_cluster(cluster: &Cluster) -> Self {
        Self {
            members: cluster.members.clone(),
            merge_similarity: None,
        }
    }
}

/// Embeddings of group representatives, indexed by group
struct RepresentativeSet<'a> {
    embeddings: Vec<Option<&'a Embedding>>,
    backend: &'a dyn EmbeddingBackend,
}

impl SimilarityOracle for RepresentativeSet<'_> {
    fn len(&self) -> usize {
        self.embeddings.len()
    }

    fn is_comparable(&self, index: usize) -> bool {
        matches!(self.embeddings.get(index), Some(Some(_)))
    }

    fn similarity(&self, a: usize, b: usize) -> Result<f64, CompareError> {
        let left = self
            .embeddings
            .get(a)
            .copied()
            .flatten()
            .ok_or(CompareError::MissingData { index: a })?;
        let right = self
            .embeddings
            .get(b)
            .copied()
            .flatten()
            .ok_or(CompareError::MissingData { index: b })?;
        self.backend.compare(left, right)
    }
}

/// Merges exact-duplicate groups using embedding similarity of their
/// quality-best members.
///
/// Only one embedding per input group is ever computed. The pass over
/// representatives uses the same grouping strategy as duplicate detection,
/// so with the default seed-only strategy a group is merged into the first
/// earlier group whose representative matches its own, and chains are not
/// followed.
#[derive(Clone)]
pub struct SemanticSimilarityMerger {
    threshold: SimilarityThreshold,
    strategy: GroupingStrategy,
    backend: Arc<dyn EmbeddingBackend>,
}

impl SemanticSimilarityMerger {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            threshold: SimilarityThreshold::semantic(),
            strategy: GroupingStrategy::default(),
            backend,
        }
    }

    pub fn with_threshold(mut self, threshold: SimilarityThreshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_strategy(mut self, strategy: GroupingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn backend(&self) -> &dyn EmbeddingBackend {
        self.backend.as_ref()
    }

    pub fn threshold(&self) -> SimilarityThreshold {
        self.threshold
    }

    pub fn merge_groups(
        &self,
        clusters: &[Cluster],
        context: &AnalysisContext<'_>,
        events: &EventSender,
    ) -> Vec<MergedGroup> {
        events.send(Event::Merge(MergeEvent::Started {
            candidate_groups: clusters.len(),
        }));

        if clusters.len() < 2 {
            events.send(Event::Merge(MergeEvent::Completed {
                groups_before: clusters.len(),
                groups_after: clusters.len(),
                embeddings_computed: 0,
            }));
            return clusters.iter().map(MergedGroup::from_cluster).collect();
        }

        let backend = self.backend.as_ref();
        let representatives: Vec<Option<usize>> = clusters
            .iter()
            .map(|cluster| context.best_member(&cluster.members))
            .collect();

        // Warm the memo in parallel; each representative is extracted once.
        representatives.par_iter().flatten().for_each(|&index| {
            let _ = context.embedding(index, backend);
        });

        let embeddings: Vec<Option<&Embedding>> = representatives
            .iter()
            .enumerate()
            .map(|(group, representative)| {
                let index = (*representative)?;
                match context.embedding(index, backend) {
                    Ok(embedding) => Some(embedding),
                    Err(error) => {
                        let content = context.image(index).content.clone();
                        warn!(group, %content, %error, "embedding failed, group kept as is");
                        events.send(Event::Merge(MergeEvent::EmbeddingFailed {
                            group,
                            content,
                            message: error.to_string(),
                        }));
                        None
                    }
                }
            })
            .collect();
        let embeddings_computed = embeddings.iter().flatten().count();

        let oracle = RepresentativeSet {
            embeddings,
            backend,
        };
        let outcome = self
            .strategy
            .group(&oracle, self.threshold, &null_sender());

        let merged: Vec<MergedGroup> = outcome
            .clusters
            .iter()
            .map(|meta| MergedGroup {
                members: meta
                    .members
                    .iter()
                    .flat_map(|&group| clusters[group].members.iter().copied())
                    .collect(),
                merge_similarity: meta.link_similarity,
            })
            .collect();

        info!(
            backend = backend.name(),
            groups_before = clusters.len(),
            groups_after = merged.len(),
            embeddings_computed,
            "semantic merge finished"
        );
        events.send(Event::Merge(MergeEvent::Completed {
            groups_before: clusters.len(),
            groups_after: merged.len(),
            embeddings_computed,
        }));

        merged
    }
}

impl Default for SemanticSimilarityMerger {
    fn default() -> Self {
        Self::new(BackendKind::default().build())
    }
}

impl std::fmt::Debug for SemanticSimilarityMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticSimilarityMerger")
            .field("threshold", &self.threshold)
            .field("strategy", &self.strategy)
            .field("backend", &self.backend.name())
            .finish()
    }
}
