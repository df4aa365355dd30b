use image::{imageops, GrayImage};
use tracing::{debug, info};

use crate::{
    algorithms::{
        contours::{external_contours, largest},
        morphology::otsu_binarize,
    },
    config::SegmentationConfig,
    error::Result,
    strategies::{StageContext, StrategyInput},
    traits::SegmentationStrategy,
    types::{Region, Stage, StrategyResult},
};

/// Terminal fallback: Otsu-binarize the blurred grayscale image and crop to
/// the padded bounding rectangle of the largest region.
///
/// Finding no region is not an error; the orchestrator then returns the input
/// unchanged.
#[derive(Debug, Clone)]
pub struct BoundingBoxCrop {
    pub blur_sigma: f32,
    pub padding: u32,
}

impl BoundingBoxCrop {
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            blur_sigma: config.bbox_blur_sigma,
            padding: config.bbox_padding,
        }
    }
}

// Blurring a flat image can introduce off-by-one rounding that Otsu would split on.
fn is_flat(gray: &GrayImage) -> bool {
    let raw = gray.as_raw();
    raw.first().is_none_or(|&first| raw.iter().all(|&v| v == first))
}

impl SegmentationStrategy for BoundingBoxCrop {
    fn stage(&self) -> Stage {
        Stage::BoundingBox
    }

    fn gate(&self) -> f64 {
        0.0
    }

    fn is_terminal(&self) -> bool {
        true
    }

    fn run(&self, input: &StrategyInput<'_>, _ctx: &mut StageContext<'_>)
        -> Result<Option<StrategyResult>> {
        let image = input.image;
        let (width, height) = image.dimensions();

        let gray = imageops::grayscale(image);
        if is_flat(&gray) {
            info!("Image has a single intensity, keeping the original image");
            return Ok(None);
        }
        let blurred = imageproc::filter::gaussian_blur_f32(&gray, self.blur_sigma);
        let binary = otsu_binarize(&blurred);

        let contours = external_contours(&binary);
        let Some((dominant, area)) = largest(&contours) else {
            info!("No contours detected, keeping the original image");
            return Ok(None);
        };

        let rect = dominant.bounding_rect().padded(self.padding, width, height);
        debug!(?rect, "Bounding box crop");

        Ok(Some(StrategyResult {
            region: Region::Cropped(rect),
            area_ratio: area / input.total_pixels(),
        }))
    }
}
