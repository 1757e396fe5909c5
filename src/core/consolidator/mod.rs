//! # Consolidator Module
//!
//! Turns the final partition into labelled groups with a best image each,
//! plus batch statistics.
//!
//! ## Labels
//! | Size | Pixel mode  | AI mode   |
//! |------|-------------|-----------|
//! | 1    | `unique`    | `unique`  |
//! | > 1  | `duplicate` | `similar` |
//!
//! Group ids are `{type}_{position}`, where position is the group's place
//! in the output order.

use crate::core::comparator::Cluster;
use crate::core::quality::{best_of, QualityMetrics};
use crate::core::similarity::MergedGroup;
use crate::core::source::ImageRef;
use serde::{Deserialize, Serialize};

/// Similarity reported for a pixel-level duplicate group
pub const DUPLICATE_SIMILARITY: f64 = 0.98;
/// Similarity reported for a single image
pub const UNIQUE_SIMILARITY: f64 = 1.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Type of a final group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Unique,
    Duplicate,
    Similar,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Unique => "unique",
            GroupKind::Duplicate => "duplicate",
            GroupKind::Similar => "similar",
        }
    }
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image within a reported group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Position in the input batch
    pub index: usize,
    /// The image's content handle
    pub path: String,
    pub quality: QualityMetrics,
    pub file_size: u64,
}

/// A labelled group in the final result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGroup {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: GroupKind,
    /// Members in first-seen order
    pub images: Vec<GroupMember>,
    /// The member to keep
    pub best_image: GroupMember,
    pub count: usize,
    pub similarity_score: f64,
    /// Bytes freed by keeping only the best image
    pub space_saved_bytes: u64,
}

impl ImageGroup {
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.images.iter().map(|m| m.index)
    }

    /// Whether this group has anything to cull
    pub fn is_redundant(&self) -> bool {
        self.count > 1
    }
}

/// Batch-level counts and savings.
///
/// The per-type counts are numbers of groups, not images.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_images: usize,
    pub total_groups: usize,
    pub duplicate_count: usize,
    pub similar_count: usize,
    pub unique_count: usize,
    pub estimated_space_saved_bytes: u64,
    pub estimated_space_saved_mb: f64,
}

/// A group as handed to the consolidator
#[derive(Debug, Clone, PartialEq)]
pub struct FinalGroup {
    pub members: Vec<usize>,
    /// Weakest embedding link, when the group was formed by merging
    pub merge_similarity: Option<f64>,
}

impl From<Cluster> for FinalGroup {
    fn from(cluster: Cluster) -> Self {
        Self {
            members: cluster.members,
            merge_similarity: None,
        }
    }
}

impl From<MergedGroup> for FinalGroup {
    fn from(group: MergedGroup) -> Self {
        Self {
            members: group.members,
            merge_similarity: group.merge_similarity,
        }
    }
}

/// Labels groups, picks best images and totals the savings
#[derive(Debug, Clone, Copy)]
pub struct GroupConsolidator {
    multi_kind: GroupKind,
}

impl GroupConsolidator {
    /// Multi-image groups are reported as `duplicate`
    pub fn duplicates() -> Self {
        Self {
            multi_kind: GroupKind::Duplicate,
        }
    }

    /// Multi-image groups are reported as `similar`
    pub fn similar() -> Self {
        Self {
            multi_kind: GroupKind::Similar,
        }
    }

    pub fn consolidate(
        &self,
        groups: Vec<FinalGroup>,
        images: &[ImageRef],
        quality: &[QualityMetrics],
    ) -> (Vec<ImageGroup>, Statistics) {
        let member = |index: usize| GroupMember {
            index,
            path: images[index].content.clone(),
            quality: quality[index],
            file_size: images[index].file_size,
        };

        let mut result = Vec::with_capacity(groups.len());
        let mut stats = Statistics {
            total_images: images.len(),
            ..Statistics::default()
        };

        for (position, group) in groups.into_iter().filter(|g| !g.members.is_empty()).enumerate() {
            let Some(best) = best_of(&group.members, quality) else {
                continue;
            };

            let (kind, similarity_score) = if group.members.len() == 1 {
                (GroupKind::Unique, UNIQUE_SIMILARITY)
            } else if self.multi_kind == GroupKind::Similar {
                (
                    GroupKind::Similar,
                    group.merge_similarity.unwrap_or(DUPLICATE_SIMILARITY),
                )
            } else {
                (self.multi_kind, DUPLICATE_SIMILARITY)
            };

            let total_bytes: u64 = group
                .members
                .iter()
                .map(|&i| images[i].file_size)
                .sum();
            let space_saved_bytes = total_bytes.saturating_sub(images[best].file_size);

            match kind {
                GroupKind::Unique => stats.unique_count += 1,
                GroupKind::Duplicate => stats.duplicate_count += 1,
                GroupKind::Similar => stats.similar_count += 1,
            }
            stats.estimated_space_saved_bytes += space_saved_bytes;

            result.push(ImageGroup {
                id: format!("{}_{}", kind, position),
                kind,
                images: group.members.iter().map(|&i| member(i)).collect(),
                best_image: member(best),
                count: group.members.len(),
                similarity_score,
                space_saved_bytes,
            });
        }

        stats.total_groups = result.len();
        stats.estimated_space_saved_mb = stats.estimated_space_saved_bytes as f64 / BYTES_PER_MB;

        (result, stats)
    }
}

impl Default for GroupConsolidator {
    fn default() -> Self {
        Self::duplicates()
    }
}
