//! # Scanner Module
//!
//! Collects a batch of image references from files and directories.
//!
//! ## Accepted Files
//! - Extensions: .jpg .jpeg .png .gif .bmp .webp .tiff (any case)
//! - At most 50 MiB each; larger files are skipped and reported
//! - Hidden files and directories are skipped unless asked for
//!
//! The batch is sorted by path, so the same tree always yields the same
//! input order and therefore the same groups.

mod filter;
mod walker;

pub use filter::ImageFilter;
pub use walker::{ScanConfig, WalkDirScanner};

use crate::core::source::ImageRef;
use crate::error::ScanError;

/// Extensions accepted by default
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];

/// Largest file accepted by default (50 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Result of a scan operation
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Accepted images, sorted by path
    pub images: Vec<ImageRef>,
    /// Files or directories that were skipped (non-fatal)
    pub skipped: Vec<ScanError>,
}
