//! # Photo Culler
//!
//! Groups a batch of photos into exact duplicates and near-identical shots,
//! and picks the best-looking photo of every group.
//!
//! ## Core Philosophy
//! - **Never delete** - the engine only recommends which photo to keep
//! - **Per-photo failures stay local** - a corrupt file becomes its own group
//! - **Deterministic** - the same batch always yields the same groups
//!
//! ## Architecture
//! - `core` - Scoring, grouping, merging and consolidation
//! - `events` - Channel-based progress reporting
//! - `error` - Error types
//!
//! ## Example
//! ```rust,ignore
//! use photo_culler::core::pipeline::Pipeline;
//! use photo_culler::core::source::{FileSystemSource, ImageRef};
//!
//! let pipeline = Pipeline::builder().build()?;
//! let images = vec![ImageRef::from_path("a.jpg".as_ref())?];
//! let result = pipeline.analyze(&images, &FileSystemSource::new());
//! ```

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{CullerError, Result};

/// Initialize tracing for the library
///
/// Reads the filter from `RUST_LOG`. Calling this twice, or after another
/// subscriber was installed, leaves the existing subscriber in place.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
