//! Optional side artifacts of a segmentation call.
//!
//! The core never touches the filesystem; it hands rasters to a
//! [`DiagnosticsSink`] supplied by the caller.

use std::fs;
use std::path::{Path, PathBuf};

use image::{imageops, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

use crate::{error::Result, traits::DiagnosticsSink, types::SeedPoint};

pub const SEED_RADIUS: i32 = 3;
pub const SEED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize,
    Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    /// Skin-color candidate mask after open/close
    SkinMask,
    /// Input with the sampled seeds drawn on top
    SeedOverlay,
    /// Dominant region of the aggregated flood fill
    FloodFillMask,
    /// Convex hull of the dominant region
    ConvexHullMask,
    /// The image returned to the caller
    FinalResult,
    /// Six-tile overview of the whole run
    Panel,
}

impl ArtifactKind {
    /// Tile order of [`ArtifactKind::Panel`], after the original image
    pub const PANEL_TILES: [ArtifactKind; 5] = [
        ArtifactKind::SkinMask,
        ArtifactKind::SeedOverlay,
        ArtifactKind::FloodFillMask,
        ArtifactKind::ConvexHullMask,
        ArtifactKind::FinalResult,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub image: DynamicImage,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, image: impl Into<DynamicImage>) -> Self {
        Self {
            kind,
            image: image.into(),
        }
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn enabled(&self) -> bool {
        false
    }

    fn emit(&mut self, _artifact: Artifact) -> Result<()> {
        Ok(())
    }
}

/// Collects artifacts in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    artifacts: Vec<Artifact>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }
}

impl DiagnosticsSink for MemorySink {
    fn emit(&mut self, artifact: Artifact) -> Result<()> {
        self.artifacts.push(artifact);
        Ok(())
    }
}

/// Writes each artifact as `<dir>/<stem>_<kind>.png`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    stem: String,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            written: Vec::new(),
        }
    }

    /// Use the file stem of `input` as prefix
    pub fn for_input(dir: impl Into<PathBuf>, input: &Path) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Self::new(dir, stem)
    }

    pub fn path_for(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(format!("{}_{}.png", self.stem, kind))
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl DiagnosticsSink for DirectorySink {
    fn emit(&mut self, artifact: Artifact) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(artifact.kind);
        artifact.image.save(&path)?;
        tracing::debug!(path = %path.display(), "Wrote {} artifact", artifact.kind);
        self.written.push(path);
        Ok(())
    }
}

/// Copy of `image` with every seed drawn as a small red disc
pub fn seed_overlay(image: &RgbImage, seeds: &[SeedPoint]) -> RgbImage {
    let mut overlay = image.clone();
    for seed in seeds {
        draw_filled_circle_mut(
            &mut overlay,
            (seed.x as i32, seed.y as i32),
            SEED_RADIUS,
            SEED_COLOR,
        );
    }
    overlay
}

/// 3x2 grid: original, then the [`ArtifactKind::PANEL_TILES`] in order.
///
/// Every cell is the size of `original`; missing tiles stay black and larger
/// tiles are clipped.
pub fn compose_panel(original: &RgbImage, artifacts: &[Artifact]) -> RgbImage {
    let (w, h) = original.dimensions();
    let mut panel = RgbImage::new(w * 3, h * 2);

    let tiles = std::iter::once(Some(original.clone())).chain(
        ArtifactKind::PANEL_TILES.iter().map(|kind| {
            artifacts
                .iter()
                .find(|a| a.kind == *kind)
                .map(|a| a.image.to_rgb8())
        }),
    );

    for (slot, tile) in tiles.enumerate() {
        let Some(tile) = tile else { continue };
        let col = (slot % 3) as u32;
        let row = (slot / 3) as u32;
        let tile = imageops::crop_imm(&tile, 0, 0, w.min(tile.width()), h.min(tile.height()))
            .to_image();
        imageops::replace(&mut panel, &tile, (col * w) as i64, (row * h) as i64);
    }
    panel
}
