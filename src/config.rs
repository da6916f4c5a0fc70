//! Tunable parameters of the locator and the classifier.
//!
//! Every struct implements `Default` with the values the thresholds were tuned
//! for, and every field is optional when read from TOML.

use serde::{Deserialize, Serialize};

use std::fs;
use std::path::Path;

use crate::error::LprError;
use crate::svm::SvmParams;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Size { width, height }
    }
}

/// Layout of the gradient-histogram descriptor.
///
/// Changing any field changes the descriptor length, so a model trained with
/// one layout can't be used with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub window: Size,
    pub block: Size,
    pub block_stride: Size,
    pub cell: Size,
    pub bins: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            window: Size::new(96, 32),
            block: Size::new(16, 16),
            block_stride: Size::new(8, 8),
            cell: Size::new(8, 8),
            bins: 9,
        }
    }
}

impl FeatureConfig {
    /// Checks that the layout describes a square-cell grid the descriptor can
    /// be computed on.
    pub fn validate(&self) -> Result<(), LprError> {
        let invalid = |msg: String| Err(LprError::InvalidConfig(msg));
        let FeatureConfig { window, block, block_stride, cell, bins } = *self;

        if bins == 0 {
            return invalid("orientation bin count must be positive".into());
        }
        if cell.width == 0 || cell.width != cell.height {
            return invalid(format!("cell {}x{} must be a non-empty square", cell.width, cell.height));
        }
        if block.width != block.height || block_stride.width != block_stride.height {
            return invalid("block size and block stride must be square".into());
        }
        let side = cell.width;
        for (name, size) in [("window", window), ("block", block), ("block stride", block_stride)] {
            if size.width == 0 || size.width % side != 0 || size.height % side != 0 {
                return invalid(format!(
                    "{} {}x{} is not a multiple of the {}px cell",
                    name, size.width, size.height, side
                ));
            }
        }
        if block.width > window.width || block.height > window.height {
            return invalid("block does not fit inside the window".into());
        }
        if (window.width - block.width) % block_stride.width != 0
            || (window.height - block.height) % block_stride.height != 0
        {
            return invalid("block stride does not tile the window".into());
        }
        Ok(())
    }

    /// Number of values in one descriptor.
    pub fn descriptor_len(&self) -> usize {
        let blocks_x = (self.window.width - self.block.width) / self.block_stride.width + 1;
        let blocks_y = (self.window.height - self.block.height) / self.block_stride.height + 1;
        let cells_per_block = (self.block.width / self.cell.width) * (self.block.height / self.cell.height);
        (blocks_x * blocks_y * cells_per_block) as usize * self.bins
    }
}

/// Open bounds on a candidate's bounding rectangle.
///
/// `min_aspect`/`max_aspect` bound height divided by width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryBounds {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl Default for GeometryBounds {
    fn default() -> Self {
        GeometryBounds {
            min_width: 60,
            max_width: 180,
            min_height: 18,
            max_height: 80,
            min_aspect: 0.15,
            max_aspect: 0.70,
        }
    }
}

impl GeometryBounds {
    /// Looser maxima used while adjusting a camera.
    pub fn calibration() -> Self {
        GeometryBounds {
            max_width: 250,
            max_height: 100,
            ..Default::default()
        }
    }
}

/// Inclusive range on the 8-bit HSV scale (hue 0..180, saturation and value
/// 0..255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub low: [u8; 3],
    pub high: [u8; 3],
}

impl HsvRange {
    pub const BLUE: HsvRange = HsvRange { low: [100, 70, 70], high: [140, 255, 255] };
    pub const YELLOW: HsvRange = HsvRange { low: [15, 70, 70], high: [40, 255, 255] };

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.low[c] <= hsv[c] && hsv[c] <= self.high[c])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Plate background colors; pixels matching any range are foreground.
    pub ranges: Vec<HsvRange>,
    pub close: Size,
    pub erode: Size,
}

impl Default for ColorConfig {
    fn default() -> Self {
        ColorConfig {
            ranges: vec![HsvRange::BLUE, HsvRange::YELLOW],
            close: Size::new(17, 3),
            erode: Size::new(3, 3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Side of the square Gaussian kernel, odd.
    pub blur_size: u32,
    pub x_weight: f32,
    pub y_weight: f32,
    pub close: Size,
    pub erode: Size,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        EdgeConfig {
            blur_size: 5,
            x_weight: 1.0,
            y_weight: 0.0,
            close: Size::new(17, 3),
            erode: Size::new(5, 5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub bounds: GeometryBounds,
    pub color: ColorConfig,
    pub edge: EdgeConfig,
}

impl LocatorConfig {
    pub fn general() -> Self {
        Self::default()
    }

    pub fn auto_sample() -> Self {
        Self::default()
    }

    pub fn calibration() -> Self {
        LocatorConfig {
            bounds: GeometryBounds::calibration(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), LprError> {
        let b = &self.bounds;
        if b.min_width >= b.max_width || b.min_height >= b.max_height || !(b.min_aspect < b.max_aspect) {
            return Err(LprError::InvalidConfig(format!("empty geometry bounds {:?}", b)));
        }
        if self.edge.blur_size == 0 || self.edge.blur_size % 2 == 0 {
            return Err(LprError::InvalidConfig(format!(
                "blur kernel size {} must be odd",
                self.edge.blur_size
            )));
        }
        for element in [self.color.close, self.color.erode, self.edge.close, self.edge.erode] {
            if element.width == 0 || element.height == 0 {
                return Err(LprError::InvalidConfig("structuring element has no area".into()));
            }
            if element.width >= 512 || element.height >= 512 {
                return Err(LprError::InvalidConfig(format!(
                    "structuring element {}x{} is too large",
                    element.width, element.height
                )));
            }
        }
        Ok(())
    }
}

/// Everything the `lpr` binary can read from a TOML file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feature: FeatureConfig,
    pub svm: SvmParams,
    pub locator: LocatorConfig,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LprError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, LprError> {
        let config: AppConfig = toml::from_str(text)?;
        config.feature.validate()?;
        config.locator.validate()?;
        if !(config.svm.c > 0.0 && config.svm.epsilon > 0.0) {
            return Err(LprError::InvalidConfig(format!(
                "svm penalty {} and tolerance {} must be positive",
                config.svm.c, config.svm.epsilon
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_descriptor_len() {
        let config = FeatureConfig::default();
        config.validate().unwrap();
        // 11 x 3 blocks, 4 cells each, 9 bins
        assert_eq!(config.descriptor_len(), 1188);
    }

    #[test]
    fn rejects_misaligned_layout() {
        let config = FeatureConfig {
            window: Size::new(100, 32),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LprError::InvalidConfig(_))));

        let config = FeatureConfig {
            cell: Size::new(8, 4),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [locator.bounds]
            max_width = 250

            [locator.edge]
            blur_size = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.locator.bounds.max_width, 250);
        assert_eq!(config.locator.bounds.min_width, 60);
        assert_eq!(config.locator.edge.blur_size, 7);
        assert_eq!(config.locator.edge.erode, Size::new(5, 5));
        assert_eq!(config.locator.color.ranges, vec![HsvRange::BLUE, HsvRange::YELLOW]);
        assert_eq!(config.feature, FeatureConfig::default());
    }

    #[test]
    fn even_blur_kernel_is_rejected() {
        let result = AppConfig::from_toml("[locator.edge]\nblur_size = 4\n");
        assert!(matches!(result, Err(LprError::InvalidConfig(_))));
    }

    #[test]
    fn structuring_elements_are_bounded() {
        let mut config = LocatorConfig::general();
        config.color.erode = Size::new(0, 3);
        assert!(matches!(config.validate(), Err(LprError::InvalidConfig(_))));
        config.color.erode = Size::new(600, 3);
        assert!(matches!(config.validate(), Err(LprError::InvalidConfig(_))));
        config.color.erode = Size::new(511, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn svm_section_is_read_and_checked() {
        let config = AppConfig::from_toml("[svm]\nc = 10.0\n").unwrap();
        assert_eq!(config.svm.c, 10.0);
        assert_eq!(config.svm.epsilon, 1e-10);
        assert!(AppConfig::from_toml("[svm]\nc = 0.0\n").is_err());
    }

    #[test]
    fn calibration_loosens_maxima() {
        let config = LocatorConfig::calibration();
        assert_eq!(config.bounds.max_width, 250);
        assert_eq!(config.bounds.max_height, 100);
        assert_eq!(config.bounds.min_width, LocatorConfig::general().bounds.min_width);
    }
}
