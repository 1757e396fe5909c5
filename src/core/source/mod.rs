//! # Source Module
//!
//! Image references and the storage collaborators that resolve them.
//!
//! The engine only ever sees an [`ImageRef`]: an opaque content handle and
//! the byte size of the stored file. Turning a handle into pixels is the
//! job of an [`ImageSource`], which may read the local filesystem, an
//! object-storage bucket, or a test fixture.

pub mod fast_decode;
pub mod luma;

pub use fast_decode::FastDecoder;
pub use luma::to_gray;

use crate::error::ImageError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::RwLock;

/// A reference to one photo in the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Opaque handle understood by the [`ImageSource`]
    pub content: String,
    /// Size of the stored file in bytes
    pub file_size: u64,
}

impl ImageRef {
    /// Create a reference from a handle and size
    pub fn new(content: impl Into<String>, file_size: u64) -> Self {
        Self {
            content: content.into(),
            file_size,
        }
    }

    /// Create a reference to a local file, reading its size from disk
    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let metadata = fs::metadata(path).map_err(|e| ImageError::IoError {
            content: path.display().to_string(),
            source: e,
        })?;
        Ok(Self::new(path.display().to_string(), metadata.len()))
    }
}

/// Resolves image references to decoded rasters
pub trait ImageSource: Send + Sync {
    /// Load and decode the referenced image
    fn load(&self, image: &ImageRef) -> Result<DynamicImage, ImageError>;
}

/// Reads images from the local filesystem; `content` is a path
#[derive(Debug, Clone, Default)]
pub struct FileSystemSource;

impl FileSystemSource {
    pub fn new() -> Self {
        Self
    }
}

impl ImageSource for FileSystemSource {
    fn load(&self, image: &ImageRef) -> Result<DynamicImage, ImageError> {
        FastDecoder::decode_file(Path::new(&image.content))
    }
}

/// Holds encoded image bytes in memory, keyed by handle.
///
/// Stands in for an object-storage bucket whose downloads have already
/// been fetched.
#[derive(Default)]
pub struct InMemorySource {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store encoded bytes under a handle and return a reference to them
    pub fn insert_bytes(&self, content: impl Into<String>, bytes: Vec<u8>) -> ImageRef {
        let content = content.into();
        let image_ref = ImageRef::new(content.clone(), bytes.len() as u64);
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(content, bytes);
        }
        image_ref
    }

    /// Encode a raster as PNG and store it under a handle
    pub fn insert_image(
        &self,
        content: impl Into<String>,
        image: &DynamicImage,
    ) -> Result<ImageRef, ImageError> {
        let content = content.into();
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .map_err(|e| ImageError::DecodeError {
                content: content.clone(),
                reason: format!("Failed to encode PNG: {}", e),
            })?;
        Ok(self.insert_bytes(content, buffer.into_inner()))
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageSource for InMemorySource {
    fn load(&self, image: &ImageRef) -> Result<DynamicImage, ImageError> {
        let objects = self.objects.read().map_err(|_| ImageError::NotFound {
            content: image.content.clone(),
        })?;
        let bytes = objects
            .get(&image.content)
            .ok_or_else(|| ImageError::NotFound {
                content: image.content.clone(),
            })?;
        FastDecoder::decode_bytes(bytes, &image.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use std::io::Write;
    use tempfile::TempDir;

    fn gray(value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(8, 8, |_, _| Luma([value])))
    }

    #[test]
    fn in_memory_source_round_trips_pixels() {
        let source = InMemorySource::new();
        let image_ref = source.insert_image("session/a.png", &gray(77)).unwrap();

        let loaded = source.load(&image_ref).unwrap();

        assert_eq!(loaded.to_luma8().get_pixel(3, 3)[0], 77);
        assert!(image_ref.file_size > 0);
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn in_memory_source_unknown_handle_is_not_found() {
        let source = InMemorySource::new();
        let result = source.load(&ImageRef::new("missing.png", 10));
        assert!(matches!(result, Err(ImageError::NotFound { .. })));
    }

    #[test]
    fn image_ref_from_path_reads_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpg");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[0u8; 1234]).unwrap();

        let image_ref = ImageRef::from_path(&path).unwrap();

        assert_eq!(image_ref.file_size, 1234);
        assert!(image_ref.content.ends_with("photo.jpg"));
    }

    #[test]
    fn filesystem_source_reports_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.jpg");
        fs::write(&path, b"not really a jpeg").unwrap();

        let image_ref = ImageRef::from_path(&path).unwrap();
        let result = FileSystemSource::new().load(&image_ref);

        assert!(matches!(result, Err(ImageError::DecodeError { .. })));
    }
}
