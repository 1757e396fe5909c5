//! # Core Module
//!
//! The front-end-agnostic culling engine.
//!
//! ## Modules
//! - `source` - Image references and storage collaborators
//! - `scanner` - Collects a batch from local directories
//! - `quality` - Scores each photo's technical quality
//! - `comparator` - Pixel similarity and exact-duplicate grouping
//! - `similarity` - Embedding backends and the semantic merge
//! - `consolidator` - Typed groups, best pick and statistics
//! - `pipeline` - Orchestrates the full workflow
//! - `session` - Tracks background analyses by id

pub mod comparator;
pub mod consolidator;
pub mod pipeline;
pub mod quality;
pub mod scanner;
pub mod session;
pub mod similarity;
pub mod source;

// Re-export commonly used types
pub use comparator::{ExactDuplicateDetector, GroupingStrategy, SimilarityThreshold};
pub use consolidator::{GroupKind, ImageGroup, Statistics};
pub use pipeline::{AnalysisMode, AnalysisResult, Pipeline, PipelineConfig};
pub use quality::{QualityMetrics, QualityScorer, QualityWeights};
pub use session::{AnalysisTask, SessionId, SessionStatus, SessionStore};
pub use similarity::{BackendKind, EmbeddingBackend, SemanticSimilarityMerger};
pub use source::{FileSystemSource, ImageRef, ImageSource, InMemorySource};
