use image::{DynamicImage, GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

use crate::{
    diagnostics::Artifact,
    error::{Result, SegmentError},
};

/// Cell value of a set mask pixel.
pub const FOREGROUND: u8 = 255;
/// Cell value of an unset mask pixel.
pub const BACKGROUND: u8 = 0;

/// Binary single-channel raster. Every cell is either [`FOREGROUND`] or [`BACKGROUND`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    /// Create an empty (all background) mask
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Wrap a grayscale raster, mapping every non-zero cell to foreground
    pub fn from_gray(mut image: GrayImage) -> Self {
        for value in image.iter_mut() {
            if *value != BACKGROUND {
                *value = FOREGROUND;
            }
        }
        Self(image)
    }

    /// Build a mask that is set wherever the predicate holds
    pub fn from_fn(width: u32, height: u32, mut predicate: impl FnMut(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(width, height, |x, y| {
            Luma([if predicate(x, y) { FOREGROUND } else { BACKGROUND }])
        }))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn pixel_count(&self) -> usize {
        self.0.as_raw().len()
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y)[0] == FOREGROUND
    }

    pub fn set(&mut self, x: u32, y: u32) {
        self.0.put_pixel(x, y, Luma([FOREGROUND]));
    }

    /// Raw row-major cells
    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    pub fn foreground_count(&self) -> usize {
        self.0.as_raw().iter().filter(|&&v| v == FOREGROUND).count()
    }

    /// Fraction of cells that are foreground, in `[0, 1]`
    pub fn foreground_ratio(&self) -> f64 {
        if self.pixel_count() == 0 {
            return 0.0;
        }
        self.foreground_count() as f64 / self.pixel_count() as f64
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_raw().iter().all(|&v| v == BACKGROUND)
    }

    /// Foreground coordinates in row-major order
    pub fn foreground_points(&self) -> impl Iterator<Item = SeedPoint> + '_ {
        self.0
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == FOREGROUND)
            .map(|(x, y, _)| SeedPoint { x, y })
    }

    /// Logical OR of `other` into `self`
    pub fn union_with(&mut self, other: &Mask) -> Result<()> {
        if self.dimensions() != other.dimensions() {
            return Err(SegmentError::DimensionMismatch {
                mask_width: other.width(),
                mask_height: other.height(),
                image_width: self.width(),
                image_height: self.height(),
            });
        }
        for (dst, &src) in self.0.iter_mut().zip(other.0.iter()) {
            *dst |= src;
        }
        Ok(())
    }

    pub fn inverted(&self) -> Mask {
        let mut out = self.0.clone();
        for value in out.iter_mut() {
            *value = FOREGROUND - *value;
        }
        Self(out)
    }

    /// Fail unless the mask has the same spatial dimensions as `image`
    pub fn ensure_matches(&self, image: &RgbImage) -> Result<()> {
        if self.dimensions() != image.dimensions() {
            return Err(SegmentError::DimensionMismatch {
                mask_width: self.width(),
                mask_height: self.height(),
                image_width: image.width(),
                image_height: image.height(),
            });
        }
        Ok(())
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_gray(self) -> GrayImage {
        self.0
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageLuma8(self.0.clone())
    }
}

/// Integer pixel coordinate used to start a flood fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeedPoint {
    pub x: u32,
    pub y: u32,
}

impl SeedPoint {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Grow by `padding` on every side, clamped to a `bound_width` x `bound_height` image
    pub fn padded(&self, padding: u32, bound_width: u32, bound_height: u32) -> Rect {
        let x = self.x.saturating_sub(padding);
        let y = self.y.saturating_sub(padding);
        let right = (self.x + self.width).saturating_add(padding).min(bound_width);
        let bottom = (self.y + self.height).saturating_add(padding).min(bound_height);
        Rect {
            x,
            y,
            width: right.saturating_sub(x),
            height: bottom.saturating_sub(y),
        }
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}

/// Pipeline tier that produced (or attempted to produce) the output
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize,
    Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    FloodFill,
    CornerFallback,
    BoundingBox,
    Identity,
}

/// The region a strategy settled on
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Keep the masked pixels, replace the rest with a backdrop
    Masked(Mask),
    /// Crop the image to the rectangle
    Cropped(Rect),
}

/// Output of one strategy: its region plus the evidence used to gate it
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyResult {
    pub region: Region,
    /// Area of the dominant contour divided by the total pixel count
    pub area_ratio: f64,
}

/// What happened when the orchestrator ran a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted { area_ratio: f64 },
    Rejected { area_ratio: f64, gate: f64 },
    NoEvidence,
    Faulted { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageAttempt {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Work done by the multi-seed aggregator during one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloodFillStats {
    /// Skin pixels eligible as seeds
    pub candidates: usize,
    /// Seeds picked by stride sampling
    pub seeds_sampled: usize,
    /// Sampled seeds that were already covered by an earlier fill
    pub seeds_skipped: usize,
    /// Flood fills actually executed
    pub fills: usize,
    /// Pixels written across all fills
    pub filled_pixels: usize,
}

/// Result of one segmentation call
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub image: RgbImage,
    pub stage: Stage,
    pub attempts: Vec<StageAttempt>,
    pub flood_fill: FloodFillStats,
    /// Diagnostic rasters, only populated when requested
    pub artifacts: Vec<Artifact>,
}

impl Segmentation {
    /// Whether the returned image kept the input's dimensions
    pub fn preserves_dimensions(&self, input: &RgbImage) -> bool {
        self.image.dimensions() == input.dimensions()
    }

    pub fn attempt(&self, stage: Stage) -> Option<&AttemptOutcome> {
        self.attempts
            .iter()
            .find(|a| a.stage == stage)
            .map(|a| &a.outcome)
    }
}
