//! The three tiers of the segmentation cascade.

pub mod bounding_box;
pub mod corner;
pub mod flood_fill;

pub use bounding_box::BoundingBoxCrop;
pub use corner::CornerFloodFill;
pub use flood_fill::MultiSeedFloodFill;

use image::{DynamicImage, RgbImage};

use crate::{
    config::SegmentationConfig,
    diagnostics::{Artifact, ArtifactKind},
    error::Result,
    traits::{DiagnosticsSink, SegmentationStrategy},
    types::{FloodFillStats, Mask, Stage, StrategyResult},
};

/// Read-only view handed to every tier
#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    pub image: &'a RgbImage,
    pub skin: &'a Mask,
}

impl StrategyInput<'_> {
    pub fn total_pixels(&self) -> f64 {
        self.image.width() as f64 * self.image.height() as f64
    }
}

/// Per-call mutable state shared by the tiers: the diagnostics sink and work counters
pub struct StageContext<'s> {
    sink: &'s mut dyn DiagnosticsSink,
    panel_tiles: Vec<Artifact>,
    pub fill_stats: FloodFillStats,
}

impl<'s> StageContext<'s> {
    pub fn new(sink: &'s mut dyn DiagnosticsSink) -> Self {
        Self {
            sink,
            panel_tiles: Vec::new(),
            fill_stats: FloodFillStats::default(),
        }
    }

    pub fn wants_artifacts(&self) -> bool {
        self.sink.enabled()
    }

    /// Build and forward an artifact, only if the sink wants it.
    ///
    /// A sink failure is logged and dropped; artifacts never change the result.
    pub fn emit_with<F, I>(&mut self, kind: ArtifactKind, build: F)
    where
        F: FnOnce() -> I,
        I: Into<DynamicImage>,
    {
        if !self.sink.enabled() {
            return;
        }
        let artifact = Artifact::new(kind, build());
        if ArtifactKind::PANEL_TILES.contains(&kind) {
            self.panel_tiles.retain(|a| a.kind != kind);
            self.panel_tiles.push(artifact.clone());
        }
        if let Err(e) = self.sink.emit(artifact) {
            tracing::warn!("Failed to emit {kind} artifact: {e}");
        }
    }

    /// Artifacts retained for the overview panel
    pub fn panel_tiles(&self) -> &[Artifact] {
        &self.panel_tiles
    }
}

/// Tagged set of the available tiers
#[derive(Debug, Clone)]
pub enum Strategy {
    FloodFill(MultiSeedFloodFill),
    CornerFallback(CornerFloodFill),
    BoundingBox(BoundingBoxCrop),
}

impl Strategy {
    /// The standard cascade: multi-seed fill, corner fill, bounding box
    pub fn default_chain(config: &SegmentationConfig) -> Vec<Strategy> {
        vec![
            Strategy::FloodFill(MultiSeedFloodFill::from_config(config)),
            Strategy::CornerFallback(CornerFloodFill::from_config(config)),
            Strategy::BoundingBox(BoundingBoxCrop::from_config(config)),
        ]
    }

    /// Tier for `stage`; `Identity` has no tier
    pub fn for_stage(stage: Stage, config: &SegmentationConfig) -> Option<Strategy> {
        match stage {
            Stage::FloodFill => Some(Strategy::FloodFill(MultiSeedFloodFill::from_config(config))),
            Stage::CornerFallback => {
                Some(Strategy::CornerFallback(CornerFloodFill::from_config(config)))
            }
            Stage::BoundingBox => Some(Strategy::BoundingBox(BoundingBoxCrop::from_config(config))),
            Stage::Identity => None,
        }
    }

    fn inner(&self) -> &dyn SegmentationStrategy {
        match self {
            Strategy::FloodFill(s) => s,
            Strategy::CornerFallback(s) => s,
            Strategy::BoundingBox(s) => s,
        }
    }
}

impl SegmentationStrategy for Strategy {
    fn stage(&self) -> Stage {
        self.inner().stage()
    }

    fn gate(&self) -> f64 {
        self.inner().gate()
    }

    fn is_terminal(&self) -> bool {
        self.inner().is_terminal()
    }

    fn run(&self, input: &StrategyInput<'_>, ctx: &mut StageContext<'_>)
        -> Result<Option<StrategyResult>> {
        self.inner().run(input, ctx)
    }
}
