//! # Similarity Module
//!
//! Embedding-based merging of exact-duplicate groups ("same shot, different
//! take").
//!
//! ## Backends
//! Feature extraction sits behind [`EmbeddingBackend`]. Two backends ship
//! with the crate and are chosen through [`BackendKind`]; anything else,
//! such as a vision model, can be supplied as `Arc<dyn EmbeddingBackend>`
//! without touching the merge logic.
//!
//! | Backend | Captures |
//! |---------|----------|
//! | `histogram` | Tonal distribution, no layout |
//! | `color_layout` | Where colours sit in the frame |

mod backends;
mod merger;
mod traits;

pub use backends::{ColorLayoutBackend, HistogramBackend};
pub use merger::{BackendKind, MergedGroup, SemanticSimilarityMerger};
pub use traits::{Embedding, EmbeddingBackend};
