//! Fast image decoding with format-specific optimizations.
//!
//! Uses zune-jpeg for JPEG data (1.5-2x faster than image crate),
//! falls back to image crate for other formats. Works on byte buffers so
//! the same path serves local files and object-storage downloads.

use crate::error::ImageError;
use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgba};
use std::fs;
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Fast image decoder that uses optimized decoders per format
pub struct FastDecoder;

impl FastDecoder {
    /// Read and decode an image file.
    pub fn decode_file(path: &Path) -> Result<DynamicImage, ImageError> {
        let content = path.display().to_string();
        let bytes = fs::read(path).map_err(|e| ImageError::IoError {
            content: content.clone(),
            source: e,
        })?;
        Self::decode_bytes(&bytes, &content)
    }

    /// Decode an in-memory image, sniffing the format from its magic bytes.
    ///
    /// `content` only labels errors.
    pub fn decode_bytes(bytes: &[u8], content: &str) -> Result<DynamicImage, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::EmptyImage {
                content: content.to_string(),
            });
        }

        let image = match image::guess_format(bytes) {
            Ok(image::ImageFormat::Jpeg) => Self::decode_jpeg(bytes, content)
                .or_else(|_| Self::decode_fallback(bytes, content))?,
            _ => Self::decode_fallback(bytes, content)?,
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(ImageError::EmptyImage {
                content: content.to_string(),
            });
        }

        Ok(image)
    }

    /// Fast JPEG decoding using zune-jpeg
    fn decode_jpeg(bytes: &[u8], content: &str) -> Result<DynamicImage, ImageError> {
        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
        let mut decoder = JpegDecoder::new_with_options(bytes, options);

        let pixels = decoder.decode().map_err(|e| ImageError::DecodeError {
            content: content.to_string(),
            reason: format!("zune-jpeg decode failed: {:?}", e),
        })?;

        let info = decoder.info().ok_or_else(|| ImageError::DecodeError {
            content: content.to_string(),
            reason: "Failed to get image info".to_string(),
        })?;

        let width = info.width as u32;
        let height = info.height as u32;
        let buffer_error = || ImageError::DecodeError {
            content: content.to_string(),
            reason: "Decoded buffer does not match image dimensions".to_string(),
        };

        let out_colorspace = decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB);

        let image = match out_colorspace {
            ColorSpace::RGB => {
                let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(buffer_error)?;
                DynamicImage::ImageRgb8(buffer)
            }
            ColorSpace::RGBA => {
                let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(buffer_error)?;
                DynamicImage::ImageRgba8(buffer)
            }
            ColorSpace::Luma => {
                let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(buffer_error)?;
                DynamicImage::ImageLuma8(buffer)
            }
            _ => return Self::decode_fallback(bytes, content),
        };

        Ok(image)
    }

    fn decode_fallback(bytes: &[u8], content: &str) -> Result<DynamicImage, ImageError> {
        image::load_from_memory(bytes).map_err(|e| ImageError::DecodeError {
            content: content.to_string(),
            reason: e.to_string(),
        })
    }
}
