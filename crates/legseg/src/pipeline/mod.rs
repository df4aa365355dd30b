pub mod builder;

use std::path::Path;

use image::RgbImage;
use tracing::{debug, info, instrument, warn};

use crate::{
    algorithms::{color::SkinMaskBuilder, compositing::{crop, Compositor}},
    config::SegmentationConfig,
    diagnostics::{compose_panel, ArtifactKind, MemorySink, NullSink},
    error::{Result, SegmentError},
    strategies::{StageContext, Strategy, StrategyInput},
    traits::{DiagnosticsSink, SegmentationStrategy},
    types::{AttemptOutcome, Region, Segmentation, Stage, StageAttempt, StrategyResult},
};

/// Runs the strategy cascade on one image at a time.
///
/// Holds only immutable configuration, so one instance can serve concurrent
/// callers; every call allocates its own buffers.
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmentationConfig,
    strategies: Vec<Strategy>,
}

impl Default for Segmenter {
    fn default() -> Self {
        let config = SegmentationConfig::default();
        let strategies = Strategy::default_chain(&config);
        Self { config, strategies }
    }
}

impl Segmenter {
    /// Create a new segmenter builder
    pub fn builder() -> builder::SegmenterBuilder {
        builder::SegmenterBuilder::new()
    }

    /// Segmenter with the standard cascade for `config`
    pub fn new(config: SegmentationConfig) -> Result<Self> {
        config.validate()?;
        let strategies = Strategy::default_chain(&config);
        Ok(Self { config, strategies })
    }

    pub(crate) fn with_strategies(config: SegmentationConfig, strategies: Vec<Strategy>) -> Self {
        Self { config, strategies }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Stages in the order they are tried
    pub fn stages(&self) -> Vec<Stage> {
        self.strategies.iter().map(|s| s.stage()).collect()
    }

    /// Segment `image`. With `emit_diagnostics` the artifacts are returned in
    /// [`Segmentation::artifacts`].
    pub fn segment(&self, image: &RgbImage, emit_diagnostics: bool) -> Result<Segmentation> {
        if emit_diagnostics {
            let mut sink = MemorySink::new();
            let mut segmentation = self.segment_with_sink(image, &mut sink)?;
            segmentation.artifacts = sink.into_artifacts();
            Ok(segmentation)
        } else {
            self.segment_with_sink(image, &mut NullSink)
        }
    }

    /// Decode a file, then segment it
    pub fn segment_path<P: AsRef<Path>>(&self, path: P, emit_diagnostics: bool) -> Result<Segmentation> {
        let image = image::open(path.as_ref())?.to_rgb8();
        self.segment(&image, emit_diagnostics)
    }

    /// Decode an in-memory image, then segment it
    pub fn segment_bytes(&self, bytes: &[u8], emit_diagnostics: bool) -> Result<Segmentation> {
        let image = image::load_from_memory(bytes)?.to_rgb8();
        self.segment(&image, emit_diagnostics)
    }

    /// Segment `image`, sending artifacts to `sink`
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn segment_with_sink(
        &self,
        image: &RgbImage,
        sink: &mut dyn DiagnosticsSink,
    ) -> Result<Segmentation> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(SegmentError::EmptyImage { width, height });
        }

        let mut ctx = StageContext::new(sink);
        let skin = SkinMaskBuilder::from_config(&self.config).build(image);
        ctx.emit_with(ArtifactKind::SkinMask, || skin.to_dynamic());

        let input = StrategyInput { image, skin: &skin };
        let mut attempts = Vec::with_capacity(self.strategies.len());
        let mut accepted: Option<(Stage, StrategyResult)> = None;

        for strategy in &self.strategies {
            let stage = strategy.stage();
            let gate = strategy.gate();
            let outcome = match strategy.run(&input, &mut ctx) {
                Ok(Some(result)) if result.area_ratio >= gate => {
                    info!(%stage, area_ratio = result.area_ratio, "Stage accepted");
                    attempts.push(StageAttempt {
                        stage,
                        outcome: AttemptOutcome::Accepted { area_ratio: result.area_ratio },
                    });
                    accepted = Some((stage, result));
                    break;
                }
                Ok(Some(result)) => {
                    info!(%stage, area_ratio = result.area_ratio, gate, "Region too small, falling back");
                    AttemptOutcome::Rejected { area_ratio: result.area_ratio, gate }
                }
                Ok(None) => {
                    debug!(%stage, "No evidence");
                    AttemptOutcome::NoEvidence
                }
                Err(e) if !strategy.is_terminal() => {
                    warn!(%stage, "Stage failed, falling back: {e}");
                    AttemptOutcome::Faulted { message: e.to_string() }
                }
                Err(e) => return Err(e),
            };
            attempts.push(StageAttempt { stage, outcome });
            if strategy.is_terminal() {
                break;
            }
        }

        let (stage, output) = match accepted {
            Some((stage, result)) => (stage, self.render(image, stage, result.region)?),
            None => {
                info!("No stage found a region, returning the original image");
                (Stage::Identity, image.clone())
            }
        };

        if ctx.wants_artifacts() {
            ctx.emit_with(ArtifactKind::FinalResult, || output.clone());
            let panel = compose_panel(image, ctx.panel_tiles());
            ctx.emit_with(ArtifactKind::Panel, || panel);
        }

        Ok(Segmentation {
            image: output,
            stage,
            attempts,
            flood_fill: ctx.fill_stats,
            artifacts: Vec::new(),
        })
    }

    fn render(&self, image: &RgbImage, stage: Stage, region: Region) -> Result<RgbImage> {
        match region {
            Region::Masked(mask) => {
                let backdrop = match stage {
                    Stage::CornerFallback => self.config.backdrop.corner_rgb(),
                    _ => self.config.backdrop.primary_rgb(),
                };
                Compositor::new(backdrop).composite(image, &mask)
            }
            Region::Cropped(rect) => Ok(crop(image, rect)),
        }
    }
}

/// Segment with the default configuration
pub fn segment(image: &RgbImage, emit_diagnostics: bool) -> Result<Segmentation> {
    Segmenter::default().segment(image, emit_diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_empty_image_is_an_input_error() {
        let err = Segmenter::default()
            .segment(&RgbImage::new(0, 10), false)
            .expect_err("zero width must fail");
        assert!(matches!(err, SegmentError::EmptyImage { width: 0, height: 10 }));
    }

    #[test]
    fn test_undecodable_bytes_are_an_input_error() {
        let err = Segmenter::default()
            .segment_bytes(b"definitely not an image", false)
            .expect_err("garbage must fail");
        assert!(matches!(err, SegmentError::ImageLoad(_)));
    }

    #[test]
    fn test_segment_path_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("flat.png");
        RgbImage::from_pixel(24, 24, Rgb([128, 128, 128]))
            .save(&path)
            .expect("save");

        let result = Segmenter::default().segment_path(&path, false).expect("segment");
        assert_eq!(result.stage, Stage::Identity);
        assert_eq!(result.image.dimensions(), (24, 24));
    }

    #[test]
    fn test_default_stage_order() {
        assert_eq!(
            Segmenter::default().stages(),
            vec![Stage::FloodFill, Stage::CornerFallback, Stage::BoundingBox]
        );
    }
}
