//! # Pipeline Module
//!
//! Orchestrates one analysis of a batch.
//!
//! ## Pipeline Stages
//! 1. **Score** - Decode each image once; compute quality and a thumbnail
//! 2. **Group** - Find exact pixel duplicates
//! 3. **Merge** - (AI mode) merge groups whose best images look alike
//! 4. **Consolidate** - Label groups, pick best images, total the savings
//!
//! ## Parallelism
//! Uses rayon for parallel decoding and scoring, and for the candidate
//! comparisons of each grouping pass. Results do not depend on scheduling.

mod context;
mod executor;

pub use context::AnalysisContext;
pub use executor::{AnalysisMode, AnalysisResult, Pipeline, PipelineBuilder, PipelineConfig};
