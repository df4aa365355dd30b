use std::fs;
use std::path::Path;

use image::Rgb;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentError};

/// Inclusive HSV bounds for candidate skin pixels.
///
/// Hue uses the 8-bit convention `degrees / 2` (range `0..180`); saturation and
/// value span `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SkinRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl Default for SkinRange {
    fn default() -> Self {
        Self {
            lower: [0, 20, 70],
            upper: [20, 150, 255],
        }
    }
}

impl SkinRange {
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

/// Backdrop colors used when compositing, one per masking tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BackdropConfig {
    /// Backdrop behind the multi-seed flood fill result
    pub primary: [u8; 3],
    /// Backdrop behind the corner flood fill result
    pub corner: [u8; 3],
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            primary: [0, 0, 0],
            corner: [255, 255, 255],
        }
    }
}

impl BackdropConfig {
    /// Same color behind both tiers
    pub fn uniform(color: [u8; 3]) -> Self {
        Self {
            primary: color,
            corner: color,
        }
    }

    pub fn primary_rgb(&self) -> Rgb<u8> {
        Rgb(self.primary)
    }

    pub fn corner_rgb(&self) -> Rgb<u8> {
        Rgb(self.corner)
    }
}

/// Largest accepted structuring element radius, keep in sync with the schema range
pub const MAX_KERNEL_RADIUS: u8 = 16;

/// Every tunable of the segmentation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Radius of the square structuring element (2 gives 5x5)
    #[schemars(range(min = 1, max = 16))]
    pub kernel_radius: u8,
    /// Maximum number of seeds sampled from the skin mask
    #[schemars(range(min = 1))]
    pub seed_cap: usize,
    /// Per-channel tolerance of the multi-seed fill, relative to the seed color
    pub flood_tolerance: u8,
    /// Per-channel tolerance of the corner background fill
    pub corner_tolerance: u8,
    /// Minimum dominant-region area ratio accepted from the multi-seed fill
    #[schemars(range(min = 0.0, max = 1.0))]
    pub area_gate_primary: f64,
    /// Minimum dominant-region area ratio accepted from the corner fill
    #[schemars(range(min = 0.0, max = 1.0))]
    pub area_gate_corner: f64,
    /// Dilation passes used to bridge gaps in the flood fill region
    pub dilate_iterations: u32,
    /// Gaussian sigma used to smooth the dilated mask edge
    pub smoothing_sigma: f32,
    /// Closing passes applied to the corner fill foreground
    pub corner_close_iterations: u32,
    /// Gaussian sigma applied before Otsu binarization
    pub bbox_blur_sigma: f32,
    /// Padding added on each side of the bounding rectangle
    pub bbox_padding: u32,
    pub skin: SkinRange,
    pub backdrop: BackdropConfig,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            kernel_radius: 2,
            seed_cap: 50,
            flood_tolerance: 15,
            corner_tolerance: 10,
            area_gate_primary: 0.05,
            area_gate_corner: 0.10,
            dilate_iterations: 3,
            // sigma of a 9x9 kernel
            smoothing_sigma: 1.7,
            corner_close_iterations: 2,
            // sigma of a 5x5 kernel
            bbox_blur_sigma: 1.1,
            bbox_padding: 10,
            skin: SkinRange::default(),
            backdrop: BackdropConfig::default(),
        }
    }
}

impl SegmentationConfig {
    /// Check ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SegmentError::InvalidConfig(msg));

        for c in 0..3 {
            if self.skin.lower[c] > self.skin.upper[c] {
                return invalid(format!(
                    "skin.lower[{c}] ({}) exceeds skin.upper[{c}] ({})",
                    self.skin.lower[c], self.skin.upper[c]
                ));
            }
        }
        if !(1..=MAX_KERNEL_RADIUS).contains(&self.kernel_radius) {
            return invalid(format!(
                "kernel_radius must lie in [1, {MAX_KERNEL_RADIUS}], got {}",
                self.kernel_radius
            ));
        }
        if self.seed_cap == 0 {
            return invalid("seed_cap must be at least 1".into());
        }
        for (name, gate) in [
            ("area_gate_primary", self.area_gate_primary),
            ("area_gate_corner", self.area_gate_corner),
        ] {
            if !(0.0..=1.0).contains(&gate) {
                return invalid(format!("{name} must lie in [0, 1], got {gate}"));
            }
        }
        for (name, sigma) in [
            ("smoothing_sigma", self.smoothing_sigma),
            ("bbox_blur_sigma", self.bbox_blur_sigma),
        ] {
            if !sigma.is_finite() || sigma <= 0.0 {
                return invalid(format!("{name} must be positive, got {sigma}"));
            }
        }
        Ok(())
    }

    /// Get the JSON schema of the configuration
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SegmentationConfig)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SegmentationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: SegmentationConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = || fs::read_to_string(path_ref);
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content()?),
            Some("json") => Self::from_json(&content()?),
            other => Err(SegmentError::UnsupportedConfigFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        SegmentationConfig::default()
            .validate()
            .expect("defaults should validate");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SegmentationConfig::from_toml(
            r#"
            seed_cap = 10
            flood_tolerance = 20

            [backdrop]
            primary = [255, 255, 255]
            corner = [255, 255, 255]
            "#,
        )
        .expect("Should parse");

        assert_eq!(config.seed_cap, 10);
        assert_eq!(config.flood_tolerance, 20);
        assert_eq!(config.corner_tolerance, 10);
        assert_eq!(config.backdrop, BackdropConfig::uniform([255, 255, 255]));
    }

    #[test]
    fn test_rejects_out_of_range_gate() {
        let err = SegmentationConfig::from_json(r#"{ "area_gate_corner": 1.5 }"#)
            .expect_err("gate above 1 must fail");
        assert!(matches!(err, SegmentError::InvalidConfig(_)));
    }

    #[test]
    fn test_kernel_radius_bounds_match_schema() {
        let mut config = SegmentationConfig::default();
        config.kernel_radius = 0;
        assert!(config.validate().is_err());
        config.kernel_radius = MAX_KERNEL_RADIUS;
        assert!(config.validate().is_ok());
        config.kernel_radius = MAX_KERNEL_RADIUS + 1;
        assert!(matches!(config.validate(), Err(SegmentError::InvalidConfig(_))));

        let schema = serde_json::to_value(SegmentationConfig::schema()).expect("schema");
        let radius = &schema["properties"]["kernel_radius"];
        assert_eq!(radius["maximum"].as_f64(), Some(MAX_KERNEL_RADIUS as f64));
    }

    #[test]
    fn test_rejects_inverted_skin_range() {
        let mut config = SegmentationConfig::default();
        config.skin.lower[1] = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_dispatches_on_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let toml_path = dir.path().join("seg.toml");
        let json_path = dir.path().join("seg.json");
        let yaml_path = dir.path().join("seg.yaml");

        let mut config = SegmentationConfig::default();
        config.bbox_padding = 4;
        fs::write(&toml_path, config.to_toml().expect("toml")).expect("write");
        fs::write(&json_path, config.to_json().expect("json")).expect("write");
        fs::write(&yaml_path, "bbox_padding: 4").expect("write");

        assert_eq!(SegmentationConfig::from_file(&toml_path).expect("toml"), config);
        assert_eq!(SegmentationConfig::from_file(&json_path).expect("json"), config);
        assert!(matches!(
            SegmentationConfig::from_file(&yaml_path),
            Err(SegmentError::UnsupportedConfigFormat(_))
        ));
    }

    #[test]
    fn test_skin_range_is_inclusive() {
        let range = SkinRange::default();
        assert!(range.contains([0, 20, 70]));
        assert!(range.contains([20, 150, 255]));
        assert!(!range.contains([21, 100, 100]));
        assert!(!range.contains([10, 19, 100]));
    }
}
