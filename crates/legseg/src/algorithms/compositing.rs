use image::{imageops, Rgb, RgbImage};

use crate::{
    error::Result,
    types::{Mask, Rect},
};

/// Keeps masked pixels and paints everything else with a solid backdrop
#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    pub backdrop: Rgb<u8>,
}

impl Compositor {
    pub fn new(backdrop: Rgb<u8>) -> Self {
        Self { backdrop }
    }

    pub fn composite(&self, image: &RgbImage, mask: &Mask) -> Result<RgbImage> {
        mask.ensure_matches(image)?;
        Ok(RgbImage::from_fn(image.width(), image.height(), |x, y| {
            if mask.is_set(x, y) {
                *image.get_pixel(x, y)
            } else {
                self.backdrop
            }
        }))
    }
}

/// Copy of the pixels inside `rect`
pub fn crop(image: &RgbImage, rect: Rect) -> RgbImage {
    imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image()
}
