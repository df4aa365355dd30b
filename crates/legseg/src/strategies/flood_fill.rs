use tracing::{debug, info};

use crate::{
    algorithms::{
        contours::{external_contours, largest},
        flood_fill::FloodFiller,
        morphology::{apply_all, Dilate, Smooth},
    },
    config::SegmentationConfig,
    diagnostics::{seed_overlay, ArtifactKind},
    error::Result,
    strategies::{StageContext, StrategyInput},
    traits::SegmentationStrategy,
    types::{Mask, Region, SeedPoint, Stage, StrategyResult},
};

/// Primary tier: flood fill from seeds sampled on the skin mask, keep the
/// dominant region, then dilate and smooth it.
#[derive(Debug, Clone)]
pub struct MultiSeedFloodFill {
    pub seed_cap: usize,
    pub tolerance: u8,
    pub gate: f64,
    pub kernel_radius: u8,
    pub dilate_iterations: u32,
    pub smoothing_sigma: f32,
}

impl MultiSeedFloodFill {
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            seed_cap: config.seed_cap,
            tolerance: config.flood_tolerance,
            gate: config.area_gate_primary,
            kernel_radius: config.kernel_radius,
            dilate_iterations: config.dilate_iterations,
            smoothing_sigma: config.smoothing_sigma,
        }
    }
}

/// Pick at most `cap` seeds from `candidates` with a uniform stride.
///
/// The stride is `len / min(cap, len)`, starting at index 0.
pub fn sample_seeds(candidates: &[SeedPoint], cap: usize) -> Vec<SeedPoint> {
    let count = cap.min(candidates.len());
    if count == 0 {
        return Vec::new();
    }
    let stride = candidates.len() / count;
    candidates.iter().step_by(stride).take(count).copied().collect()
}

impl SegmentationStrategy for MultiSeedFloodFill {
    fn stage(&self) -> Stage {
        Stage::FloodFill
    }

    fn gate(&self) -> f64 {
        self.gate
    }

    fn run(&self, input: &StrategyInput<'_>, ctx: &mut StageContext<'_>)
        -> Result<Option<StrategyResult>> {
        let image = input.image;
        input.skin.ensure_matches(image)?;
        let (width, height) = image.dimensions();

        let candidates: Vec<SeedPoint> = input.skin.foreground_points().collect();
        ctx.fill_stats.candidates = candidates.len();
        if candidates.is_empty() {
            info!("No skin pixels detected, skipping multi-seed flood fill");
            return Ok(None);
        }

        let seeds = sample_seeds(&candidates, self.seed_cap);
        ctx.fill_stats.seeds_sampled = seeds.len();
        debug!(candidates = candidates.len(), seeds = seeds.len(), "Sampled flood fill seeds");

        let mut filler = FloodFiller::new(width, height);
        let mut aggregate = Mask::new(width, height);
        for &seed in &seeds {
            if aggregate.is_set(seed.x, seed.y) {
                ctx.fill_stats.seeds_skipped += 1;
                continue;
            }
            let filled = filler.fill(image, seed, self.tolerance, Some(&aggregate));
            filler.merge_into(&mut aggregate);
            ctx.fill_stats.fills += 1;
            ctx.fill_stats.filled_pixels += filled;
        }
        debug!(
            fills = ctx.fill_stats.fills,
            skipped = ctx.fill_stats.seeds_skipped,
            filled_pixels = ctx.fill_stats.filled_pixels,
            "Aggregated flood fills"
        );
        ctx.emit_with(ArtifactKind::SeedOverlay, || seed_overlay(image, &seeds));

        let contours = external_contours(&aggregate);
        let Some((dominant, area)) = largest(&contours) else {
            info!("Multi-seed flood fill produced no contours");
            return Ok(None);
        };
        let area_ratio = area / input.total_pixels();

        let clean = dominant.rasterize(width, height);
        ctx.emit_with(ArtifactKind::FloodFillMask, || clean.to_dynamic());
        // The hull over-includes background, so it is only reported.
        ctx.emit_with(ArtifactKind::ConvexHullMask, || {
            dominant.convex_hull().rasterize(width, height).to_dynamic()
        });

        let refined = apply_all(
            clean,
            &[
                &Dilate {
                    radius: self.kernel_radius,
                    iterations: self.dilate_iterations,
                },
                &Smooth { sigma: self.smoothing_sigma },
            ],
        );

        Ok(Some(StrategyResult {
            region: Region::Masked(refined),
            area_ratio,
        }))
    }
}
