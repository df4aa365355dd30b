//! # Leg Region Segmentation Library
//!
//! Classical, model-free segmentation of the leg region in a photograph.
//! Three tiers are tried in order and the first one whose evidence passes
//! its area gate produces the output:
//!
//! - **Multi-seed flood fill**: seeds sampled from a skin-color mask grow
//!   into a region that is kept on a black backdrop
//! - **Corner flood fill**: the background is flooded in from the four
//!   corners and the remainder kept on a white backdrop
//! - **Bounding box crop**: an Otsu-binarized copy of the image decides a
//!   padded crop rectangle
//!
//! If nothing is found the input comes back unchanged.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use legseg::{Segmenter, Stage};
//!
//! let segmenter = Segmenter::default();
//! let result = segmenter.segment_path("leg.jpg", false)?;
//! if result.stage != Stage::Identity {
//!     result.image.save("leg_segmented.png")?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Segmenter
//!
//! ```rust,no_run
//! use legseg::{Segmenter, Stage};
//!
//! let segmenter = Segmenter::builder()
//!     .seed_cap(80)
//!     .flood_tolerance(12)
//!     .backdrop([0, 0, 0])
//!     .with_stages(&[Stage::FloodFill, Stage::BoundingBox])
//!     .build()?;
//! let image = image::open("leg.jpg")?.to_rgb8();
//! let result = segmenter.segment(&image, true)?;
//! for artifact in &result.artifacts {
//!     println!("{}", artifact.kind);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod config;
pub mod traits;
pub mod algorithms;
pub mod strategies;
pub mod pipeline;
pub mod diagnostics;

// Re-exports for convenience
pub use error::{Result, SegmentError};
pub use types::*;
pub use config::{BackdropConfig, SegmentationConfig, SkinRange};
pub use traits::*;
pub use diagnostics::{Artifact, ArtifactKind, DirectorySink, MemorySink, NullSink};
pub use pipeline::{segment, Segmenter, builder::SegmenterBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    const SKIN: Rgb<u8> = Rgb([220, 170, 140]);
    const BLUE: Rgb<u8> = Rgb([40, 80, 180]);
    const GREEN: Rgb<u8> = Rgb([90, 140, 60]);
    const PALE: Rgb<u8> = Rgb([240, 240, 240]);

    fn square(size: u32, from: u32, to: u32, inside: Rgb<u8>, outside: Rgb<u8>) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) { inside } else { outside }
        })
    }

    fn non_black(image: &RgbImage) -> usize {
        image.pixels().filter(|p| p.0 != [0, 0, 0]).count()
    }

    #[test]
    fn test_skin_blob_uses_primary_tier() {
        let image = square(200, 40, 160, SKIN, BLUE);
        let result = segment(&image, false).expect("segment");

        assert_eq!(result.stage, Stage::FloodFill);
        assert!(result.preserves_dimensions(&image));
        assert!(matches!(
            result.attempt(Stage::FloodFill),
            Some(AttemptOutcome::Accepted { .. })
        ));
        assert_eq!(result.flood_fill.fills, 1);

        // Dilation only grows the region by a few pixels per side
        let kept = non_black(&result.image);
        let blob = 120 * 120;
        assert!(kept >= blob && kept * 10 <= blob * 13, "kept = {kept}");

        assert_eq!(*result.image.get_pixel(100, 100), SKIN);
        assert_eq!(*result.image.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*result.image.get_pixel(199, 199), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_no_skin_falls_back_to_corners() {
        let image = square(100, 25, 75, GREEN, PALE);
        let result = segment(&image, false).expect("segment");

        assert_eq!(result.flood_fill.fills, 0);
        assert_eq!(result.attempt(Stage::FloodFill), Some(&AttemptOutcome::NoEvidence));
        assert_eq!(result.stage, Stage::CornerFallback);
        assert!(result.preserves_dimensions(&image));
        assert_eq!(*result.image.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*result.image.get_pixel(50, 50), GREEN);
    }

    #[test]
    fn test_frame_filling_subject_is_cropped() {
        // Corner fill reaches everything except a small patch
        let image = square(80, 35, 45, PALE, GREEN);
        let result = segment(&image, false).expect("segment");

        assert!(matches!(
            result.attempt(Stage::CornerFallback),
            Some(AttemptOutcome::Rejected { .. })
        ));
        assert_eq!(result.stage, Stage::BoundingBox);
        assert!(result.image.width() <= 80 && result.image.height() <= 80);
        assert!(result.image.width() < 80);
    }

    #[test]
    fn test_skin_in_top_left_corner_uses_primary_tier() {
        let image = RgbImage::from_fn(100, 100, |x, y| if x < 60 && y < 60 { SKIN } else { BLUE });
        let result = segment(&image, false).expect("segment");

        assert_eq!(result.stage, Stage::FloodFill);
        assert_eq!(*result.image.get_pixel(0, 0), SKIN);
        assert_eq!(*result.image.get_pixel(30, 30), SKIN);
        assert_eq!(*result.image.get_pixel(99, 99), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_skin_strip_on_left_edge_uses_primary_tier() {
        let image = RgbImage::from_fn(100, 100, |x, _| if x < 40 { SKIN } else { BLUE });
        let result = segment(&image, false).expect("segment");

        assert_eq!(result.stage, Stage::FloodFill);
        assert_eq!(*result.image.get_pixel(0, 50), SKIN);
        assert_eq!(*result.image.get_pixel(99, 50), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_bright_subject_at_origin_is_cropped() {
        // The corner fill from (0, 0) swallows the subject, leaving no foreground
        let image = RgbImage::from_fn(50, 50, |x, y| {
            if x < 20 && y < 20 { Rgb([250, 250, 250]) } else { Rgb([5, 5, 5]) }
        });
        let result = segment(&image, false).expect("segment");

        assert_eq!(result.attempt(Stage::CornerFallback), Some(&AttemptOutcome::NoEvidence));
        assert_eq!(result.stage, Stage::BoundingBox);
        assert!(result.image.width() < 50 && result.image.height() < 50);
        assert!(result.image.width() >= 20 && result.image.height() >= 20);
        assert_eq!(*result.image.get_pixel(0, 0), Rgb([250, 250, 250]));
    }

    #[test]
    fn test_featureless_image_is_returned_unchanged() {
        let image = RgbImage::from_pixel(64, 48, Rgb([128, 128, 128]));
        let result = segment(&image, false).expect("segment");

        assert_eq!(result.stage, Stage::Identity);
        assert_eq!(result.image, image);
        assert_eq!(result.attempts.len(), 3);
        assert!(result
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::NoEvidence));
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let image = square(120, 30, 90, SKIN, BLUE);
        let first = segment(&image, false).expect("first");
        let second = segment(&image, false).expect("second");
        assert_eq!(first.image, second.image);
        assert_eq!(first.stage, second.stage);
        assert_eq!(first.attempts, second.attempts);
        assert_eq!(first.flood_fill, second.flood_fill);
    }

    #[test]
    fn test_diagnostics_do_not_change_the_result() {
        let image = square(90, 20, 70, SKIN, BLUE);
        let plain = segment(&image, false).expect("plain");
        let traced = segment(&image, true).expect("traced");

        assert!(plain.artifacts.is_empty());
        assert_eq!(plain.image, traced.image);

        let kinds: Vec<_> = traced.artifacts.iter().map(|a| a.kind).collect();
        for kind in [
            ArtifactKind::SkinMask,
            ArtifactKind::SeedOverlay,
            ArtifactKind::FloodFillMask,
            ArtifactKind::ConvexHullMask,
            ArtifactKind::FinalResult,
            ArtifactKind::Panel,
        ] {
            assert!(kinds.contains(&kind), "missing {kind}");
        }
        let panel = traced
            .artifacts
            .iter()
            .find(|a| a.kind == ArtifactKind::Panel)
            .expect("panel");
        assert_eq!((panel.image.width(), panel.image.height()), (270, 180));
    }

    #[test]
    fn test_segmenter_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Segmenter>();

        let segmenter = std::sync::Arc::new(Segmenter::default());
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let segmenter = segmenter.clone();
                std::thread::spawn(move || {
                    let image = square(60, 15, 45, SKIN, BLUE);
                    segmenter.segment(&image, false).map(|r| r.stage)
                })
            })
            .collect();
        for handle in handles {
            let stage = handle.join().expect("thread").expect("segment");
            assert_eq!(stage, Stage::FloodFill);
        }
    }
}
