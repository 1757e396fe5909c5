//! Directory walking implementation using walkdir.

use super::{filter::ImageFilter, ScanResult, DEFAULT_MAX_FILE_SIZE};
use crate::core::source::ImageRef;
use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Configuration for the directory scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Files larger than this are skipped
    pub max_file_size: u64,
    /// Custom extensions to include (None = use defaults)
    pub extensions: Option<Vec<String>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: false,
            max_depth: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            extensions: None,
        }
    }
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: ImageFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let mut filter = ImageFilter::new().with_hidden(config.include_hidden);

        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions);
        }

        Self { config, filter }
    }

    /// Collect images from files and directories.
    ///
    /// Missing paths and unreadable entries are reported in
    /// [`ScanResult::skipped`]; they never abort the scan.
    pub fn scan(&self, paths: &[PathBuf]) -> ScanResult {
        let mut result = ScanResult::default();

        for path in paths {
            if !path.exists() {
                warn!(path = %path.display(), "path not found");
                result
                    .skipped
                    .push(ScanError::PathNotFound { path: path.clone() });
            } else if path.is_dir() {
                self.scan_directory(path, &mut result);
            } else if self.filter.should_include(path) {
                self.accept(path, &mut result);
            } else {
                debug!(path = %path.display(), "not a supported image, skipped");
            }
        }

        result.images.sort_by(|a, b| a.content.cmp(&b.content));
        result.images.dedup_by(|a, b| a.content == b.content);

        info!(
            images = result.images.len(),
            skipped = result.skipped.len(),
            "scan finished"
        );
        result
    }

    fn scan_directory(&self, root: &Path, result: &mut ScanResult) {
        let mut walker = WalkDir::new(root).follow_links(self.config.follow_symlinks);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let include_hidden = self.config.include_hidden;
        let entries = walker.into_iter().filter_entry(|entry| {
            include_hidden || entry.depth() == 0 || !ImageFilter::is_hidden(entry.path())
        });

        for entry_result in entries {
            match entry_result {
                Ok(entry) => {
                    if entry.file_type().is_dir() {
                        continue;
                    }
                    if self.filter.should_include(entry.path()) {
                        self.accept(entry.path(), result);
                    }
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    let error = if e.io_error().map(io::Error::kind)
                        == Some(io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path }
                    } else {
                        ScanError::ReadFailed {
                            path,
                            source: io::Error::new(io::ErrorKind::Other, e.to_string()),
                        }
                    };
                    warn!(%error, "skipping entry");
                    result.skipped.push(error);
                }
            }
        }
    }

    fn accept(&self, path: &Path, result: &mut ScanResult) {
        match fs::metadata(path) {
            Ok(metadata) if metadata.len() > self.config.max_file_size => {
                let error = ScanError::FileTooLarge {
                    path: path.to_path_buf(),
                    size: metadata.len(),
                    limit: self.config.max_file_size,
                };
                warn!(%error, "skipping file");
                result.skipped.push(error);
            }
            Ok(metadata) => {
                result
                    .images
                    .push(ImageRef::new(path.display().to_string(), metadata.len()));
            }
            Err(e) => {
                let error = ScanError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                };
                warn!(%error, "skipping file");
                result.skipped.push(error);
            }
        }
    }
}

impl Default for WalkDirScanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}
