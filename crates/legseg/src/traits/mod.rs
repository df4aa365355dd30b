use crate::{
    diagnostics::Artifact,
    error::Result,
    strategies::{StageContext, StrategyInput},
    types::{Mask, Stage, StrategyResult},
};

/// Trait for binary mask refinement steps (open, close, dilate, smooth)
pub trait MaskFilter: Send + Sync {
    /// Produce a refined mask with the same dimensions
    fn apply(&self, mask: &Mask) -> Mask;
}

/// Trait for one tier of the segmentation cascade
pub trait SegmentationStrategy: Send + Sync {
    /// Stage reported for this tier
    fn stage(&self) -> Stage;

    /// Minimum area ratio the orchestrator accepts from this tier
    fn gate(&self) -> f64;

    /// Terminal tiers end the cascade even without evidence
    fn is_terminal(&self) -> bool {
        false
    }

    /// Find a region. `Ok(None)` means the tier found no usable evidence.
    fn run(&self, input: &StrategyInput<'_>, ctx: &mut StageContext<'_>)
        -> Result<Option<StrategyResult>>;
}

/// Receiver for optional diagnostic rasters
pub trait DiagnosticsSink {
    /// Sinks that return `false` never receive artifacts, so producers can skip building them
    fn enabled(&self) -> bool {
        true
    }

    fn emit(&mut self, artifact: Artifact) -> Result<()>;
}
