//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};

/// All events emitted while analysing a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Quality scoring phase events
    Quality(QualityEvent),
    /// Exact-duplicate comparison phase events
    Compare(CompareEvent),
    /// Semantic merge phase events
    Merge(MergeEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events during decoding and quality scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QualityEvent {
    /// Scoring has started
    Started { total_images: usize },
    /// Progress update during scoring
    Progress(ScoreProgress),
    /// An image could not be decoded; it will be reported as its own group
    Unreadable {
        index: usize,
        content: String,
        message: String,
    },
    /// Scoring completed
    Completed { scored: usize, unreadable: usize },
}

/// Progress information during scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreProgress {
    /// Number of images scored so far
    pub completed: usize,
    /// Total number of images in the batch
    pub total: usize,
}

/// Events during exact-duplicate comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompareEvent {
    /// Comparison has started
    Started { total_images: usize },
    /// Progress update, emitted once per seed
    Progress(CompareProgress),
    /// A single comparison failed and was treated as a non-match
    Failed {
        left: usize,
        right: usize,
        message: String,
    },
    /// Comparison completed
    Completed {
        total_groups: usize,
        comparisons: usize,
    },
}

/// Progress information during comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareProgress {
    /// Number of pairwise comparisons performed so far
    pub comparisons_completed: usize,
    /// Items already assigned to a group
    pub items_grouped: usize,
    /// Total number of items
    pub total_items: usize,
}

/// Events during the semantic merge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MergeEvent {
    /// Merge has started over this many input groups
    Started { candidate_groups: usize },
    /// Feature extraction failed for a group representative
    EmbeddingFailed {
        group: usize,
        content: String,
        message: String,
    },
    /// Merge completed
    Completed {
        groups_before: usize,
        groups_after: usize,
        embeddings_computed: usize,
    },
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started { total_images: usize },
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed
    Completed { summary: PipelineSummary },
    /// Pipeline produced an error payload instead of groups
    Error { message: String },
}

/// Phases of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Scoring,
    Grouping,
    Merging,
    Consolidating,
}

/// Summary of pipeline results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Total images in the batch
    pub total_images: usize,
    /// Number of final groups
    pub total_groups: usize,
    /// Groups with more than one member
    pub redundant_groups: usize,
    /// Bytes freed by keeping only the best image of each group
    pub space_saved_bytes: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Scoring => write!(f, "Scoring quality"),
            PipelinePhase::Grouping => write!(f, "Finding duplicates"),
            PipelinePhase::Merging => write!(f, "Merging similar shots"),
            PipelinePhase::Consolidating => write!(f, "Consolidating"),
        }
    }
}
