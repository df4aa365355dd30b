use crate::{
    config::{BackdropConfig, SegmentationConfig},
    error::{Result, SegmentError},
    pipeline::Segmenter,
    strategies::Strategy,
    types::Stage,
};

/// Builder for creating segmenters with a fluent API
#[derive(Debug, Clone, Default)]
pub struct SegmenterBuilder {
    config: SegmentationConfig,
    stages: Option<Vec<Stage>>,
}

impl SegmenterBuilder {
    /// Create a new builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: SegmentationConfig) -> Self {
        self.config = config;
        self
    }

    /// Maximum number of flood fill seeds
    pub fn seed_cap(mut self, cap: usize) -> Self {
        self.config.seed_cap = cap;
        self
    }

    pub fn flood_tolerance(mut self, tolerance: u8) -> Self {
        self.config.flood_tolerance = tolerance;
        self
    }

    pub fn corner_tolerance(mut self, tolerance: u8) -> Self {
        self.config.corner_tolerance = tolerance;
        self
    }

    /// Minimum area fraction for the primary and corner tiers
    pub fn area_gates(mut self, primary: f64, corner: f64) -> Self {
        self.config.area_gate_primary = primary;
        self.config.area_gate_corner = corner;
        self
    }

    /// Use the same backdrop color for both masked tiers
    pub fn backdrop(mut self, color: [u8; 3]) -> Self {
        self.config.backdrop = BackdropConfig::uniform(color);
        self
    }

    pub fn primary_backdrop(mut self, color: [u8; 3]) -> Self {
        self.config.backdrop.primary = color;
        self
    }

    pub fn corner_backdrop(mut self, color: [u8; 3]) -> Self {
        self.config.backdrop.corner = color;
        self
    }

    /// Run only `stages`, in the given order
    pub fn with_stages(mut self, stages: &[Stage]) -> Self {
        self.stages = Some(stages.to_vec());
        self
    }

    /// Validate the configuration and build the segmenter
    pub fn build(self) -> Result<Segmenter> {
        self.config.validate()?;
        let strategies = match self.stages {
            None => Strategy::default_chain(&self.config),
            Some(stages) => {
                if stages.is_empty() {
                    return Err(SegmentError::InvalidConfig(
                        "at least one stage is required".to_string(),
                    ));
                }
                let mut strategies = Vec::with_capacity(stages.len());
                for stage in stages {
                    let strategy = Strategy::for_stage(stage, &self.config).ok_or_else(|| {
                        SegmentError::InvalidConfig(format!("stage `{stage}` cannot be scheduled"))
                    })?;
                    strategies.push(strategy);
                }
                strategies
            }
        };
        Ok(Segmenter::with_strategies(self.config, strategies))
    }
}
