//! Grayscale conversion shared by scoring, thumbnails and histograms.
//!
//! Uses Rec.601 weights (0.299, 0.587, 0.114) in 14-bit fixed point with
//! round-half-up, the same integer arithmetic OpenCV's `BGR2GRAY` uses for
//! 8-bit images. The `image` crate's `to_luma8` uses Rec.709 instead, which
//! darkens reds and brightens greens noticeably.

use image::{DynamicImage, GrayImage, RgbImage};

const SHIFT: u32 = 14;
const RED: u32 = 4899;
const GREEN: u32 = 9617;
const BLUE: u32 = 1868;
const HALF: u32 = 1 << (SHIFT - 1);

/// Rec.601 luma of one 8-bit RGB pixel
#[inline]
pub fn rgb_to_luma([r, g, b]: [u8; 3]) -> u8 {
    ((u32::from(r) * RED + u32::from(g) * GREEN + u32::from(b) * BLUE + HALF) >> SHIFT) as u8
}

/// Convert an RGB raster to Rec.601 luma
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        image::Luma([rgb_to_luma(rgb.get_pixel(x, y).0)])
    })
}

/// Rec.601 luma of any decoded image. Alpha is ignored.
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => rgb_to_gray(&other.to_rgb8()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, Rgba};

    #[test]
    fn primaries_use_rec601_weights() {
        assert_eq!(rgb_to_luma([255, 0, 0]), 76);
        assert_eq!(rgb_to_luma([0, 255, 0]), 150);
        assert_eq!(rgb_to_luma([0, 0, 255]), 29);
    }

    #[test]
    fn neutral_greys_are_unchanged() {
        for v in [0u8, 1, 77, 127, 128, 254, 255] {
            assert_eq!(rgb_to_luma([v, v, v]), v);
        }
    }

    #[test]
    fn differs_from_rec709_on_red() {
        let red = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(4, 4, Rgb([255, 0, 0])));
        assert_eq!(to_gray(&red).get_pixel(0, 0)[0], 76);
        assert_ne!(red.to_luma8().get_pixel(0, 0)[0], 76);
    }

    #[test]
    fn luma_input_passes_through() {
        let gray = DynamicImage::ImageLuma8(ImageBuffer::from_fn(3, 3, |x, y| Luma([(x * 40 + y) as u8])));
        assert_eq!(to_gray(&gray), gray.to_luma8());
    }

    #[test]
    fn alpha_is_ignored() {
        let translucent =
            DynamicImage::ImageRgba8(ImageBuffer::from_pixel(2, 2, Rgba([0, 255, 0, 10])));
        assert_eq!(to_gray(&translucent).get_pixel(1, 1)[0], 150);
    }
}
