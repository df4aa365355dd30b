use image::{Rgb, RgbImage};
use palette::{Hsv, IntoColor, Srgb};

use crate::{
    algorithms::morphology::{apply_all, Close, Open},
    config::{SegmentationConfig, SkinRange},
    types::Mask,
};

/// Convert one pixel to 8-bit HSV: hue as `degrees / 2`, saturation and value scaled to 255
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0;
    let hsv: Hsv = Srgb::new(r, g, b).into_format::<f32>().into_color();

    // Hues within half a step of 360 degrees wrap to 0
    let hue = if hsv.saturation > 0.0 {
        (hsv.hue.into_positive_degrees() / 2.0).round() as u32 % 180
    } else {
        0
    };
    [
        hue as u8,
        (hsv.saturation * 255.0).round().clamp(0.0, 255.0) as u8,
        (hsv.value * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// HSV copy of an RGB image, channel order `[h, s, v]`. The source is left untouched.
pub fn to_hsv(image: &RgbImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb(rgb_to_hsv(*image.get_pixel(x, y)))
    })
}

/// Builds the candidate skin mask: HSV range test, then open and close
#[derive(Debug, Clone)]
pub struct SkinMaskBuilder {
    pub range: SkinRange,
    pub kernel_radius: u8,
}

impl Default for SkinMaskBuilder {
    fn default() -> Self {
        Self::from_config(&SegmentationConfig::default())
    }
}

impl SkinMaskBuilder {
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            range: config.skin,
            kernel_radius: config.kernel_radius,
        }
    }

    /// Raw range test, before any morphology
    pub fn threshold(&self, image: &RgbImage) -> Mask {
        Mask::from_fn(image.width(), image.height(), |x, y| {
            self.range.contains(rgb_to_hsv(*image.get_pixel(x, y)))
        })
    }

    /// Same dimensions as `image`. An empty result is valid.
    pub fn build(&self, image: &RgbImage) -> Mask {
        let raw = self.threshold(image);
        let mask = apply_all(
            raw,
            &[&Open::new(self.kernel_radius), &Close::new(self.kernel_radius)],
        );
        tracing::debug!(
            skin_pixels = mask.foreground_count(),
            total = mask.pixel_count(),
            "Skin mask built"
        );
        mask
    }
}
