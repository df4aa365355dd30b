use tracing::{debug, info};

use crate::{
    algorithms::{
        contours::{external_contours, largest},
        flood_fill::FloodFiller,
        morphology::{apply_all, Close, Open},
    },
    config::SegmentationConfig,
    error::Result,
    strategies::{StageContext, StrategyInput},
    traits::SegmentationStrategy,
    types::{Mask, Region, SeedPoint, Stage, StrategyResult},
};

/// First fallback: flood the background in from the four corners and keep
/// the largest region that was never reached.
///
/// Assumes the subject does not touch every corner; close-ups that fill the
/// frame fail the gate and fall through to the bounding box.
#[derive(Debug, Clone)]
pub struct CornerFloodFill {
    pub tolerance: u8,
    pub gate: f64,
    pub kernel_radius: u8,
    pub close_iterations: u32,
}

impl CornerFloodFill {
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            tolerance: config.corner_tolerance,
            gate: config.area_gate_corner,
            kernel_radius: config.kernel_radius,
            close_iterations: config.corner_close_iterations,
        }
    }

    /// Cells reachable from any corner
    pub fn background(&self, image: &image::RgbImage) -> Mask {
        let (width, height) = image.dimensions();
        let mut background = Mask::new(width, height);
        if width == 0 || height == 0 {
            return background;
        }
        let mut filler = FloodFiller::new(width, height);

        let corners = [
            SeedPoint::new(0, 0),
            SeedPoint::new(0, height - 1),
            SeedPoint::new(width - 1, 0),
            SeedPoint::new(width - 1, height - 1),
        ];
        for corner in corners {
            if background.is_set(corner.x, corner.y) {
                continue;
            }
            let filled = filler.fill(image, corner, self.tolerance, Some(&background));
            filler.merge_into(&mut background);
            debug!(x = corner.x, y = corner.y, filled, "Corner fill");
        }
        background
    }
}

impl SegmentationStrategy for CornerFloodFill {
    fn stage(&self) -> Stage {
        Stage::CornerFallback
    }

    fn gate(&self) -> f64 {
        self.gate
    }

    fn run(&self, input: &StrategyInput<'_>, _ctx: &mut StageContext<'_>)
        -> Result<Option<StrategyResult>> {
        let image = input.image;
        let (width, height) = image.dimensions();

        let foreground = apply_all(
            self.background(image).inverted(),
            &[
                &Close::with_iterations(self.kernel_radius, self.close_iterations),
                &Open::new(self.kernel_radius),
            ],
        );

        let contours = external_contours(&foreground);
        let Some((dominant, area)) = largest(&contours) else {
            info!("Corner flood fill left no foreground");
            return Ok(None);
        };

        Ok(Some(StrategyResult {
            region: Region::Masked(dominant.rasterize(width, height)),
            area_ratio: area / input.total_pixels(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullSink;
    use image::{Rgb, RgbImage};

    fn run(image: &RgbImage) -> Option<StrategyResult> {
        let skin = Mask::new(image.width(), image.height());
        let strategy = CornerFloodFill::from_config(&SegmentationConfig::default());
        let mut sink = NullSink;
        let mut ctx = StageContext::new(&mut sink);
        strategy
            .run(&StrategyInput { image, skin: &skin }, &mut ctx)
            .expect("strategy should not fault")
    }

    #[test]
    fn test_centered_subject_is_found() {
        let image = RgbImage::from_fn(80, 80, |x, y| {
            if (20..60).contains(&x) && (15..65).contains(&y) {
                Rgb([90, 140, 60])
            } else {
                Rgb([240, 240, 240])
            }
        });
        let result = run(&image).expect("subject should be found");
        assert!(result.area_ratio >= 0.10);
        let Region::Masked(mask) = result.region else {
            panic!("corner fill must produce a mask");
        };
        assert_eq!(mask.foreground_count(), 40 * 50);
        assert!(!mask.is_set(0, 0));
    }

    #[test]
    fn test_subject_touching_all_corners_fails_gate() {
        // Fills the frame except a small patch
        let image = RgbImage::from_fn(80, 80, |x, y| {
            if (35..45).contains(&x) && (35..45).contains(&y) {
                Rgb([240, 240, 240])
            } else {
                Rgb([90, 140, 60])
            }
        });
        let strategy = CornerFloodFill::from_config(&SegmentationConfig::default());
        let result = run(&image).expect("the patch is still a region");
        assert_eq!(result.area_ratio, 9.0 * 9.0 / 6400.0);
        assert!(result.area_ratio < strategy.gate);
    }

    #[test]
    fn test_subject_on_left_edge_is_found() {
        let image = RgbImage::from_fn(100, 100, |x, y| {
            if x < 40 && (20..80).contains(&y) {
                Rgb([90, 140, 60])
            } else {
                Rgb([240, 240, 240])
            }
        });
        let result = run(&image).expect("edge subject should be found");
        assert!(result.area_ratio >= 0.10);
        let Region::Masked(mask) = result.region else {
            panic!("corner fill must produce a mask");
        };
        assert!(mask.is_set(0, 50));
        assert!(mask.is_set(39, 50));
        assert!(!mask.is_set(0, 0));
        assert!(!mask.is_set(60, 50));
    }

    #[test]
    fn test_background_covers_uniform_image() {
        let image = RgbImage::from_pixel(30, 20, Rgb([128, 128, 128]));
        let strategy = CornerFloodFill::from_config(&SegmentationConfig::default());
        assert_eq!(strategy.background(&image).foreground_count(), 600);
        assert!(run(&image).is_none());
    }

    #[test]
    fn test_single_pixel_image() {
        let image = RgbImage::from_pixel(1, 1, Rgb([10, 10, 10]));
        let strategy = CornerFloodFill::from_config(&SegmentationConfig::default());
        assert_eq!(strategy.background(&image).foreground_count(), 1);
    }
}
