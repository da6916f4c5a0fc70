use image::RgbImage;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use error::LprError;

pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod hog;
pub mod image_process;
pub mod locator;
pub mod svm;
pub mod utils;

pub use classifier::PlateClassifier;
pub use config::{FeatureConfig, LocatorConfig};
pub use geometry::{is_plausible_plate_shape, RotatedRect};
pub use locator::PlateLocator;

/// Plate class a region was classified as.
///
/// The discriminant is the label the classifier is trained with, so the order
/// of the variants is part of the model format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlateCategory {
    NonPlate = 0,
    Blue = 1,
    Yellow = 2,
    White = 3,
    Black = 4,
    Green = 5,
}

impl PlateCategory {
    pub const ALL: [PlateCategory; 6] = [
        PlateCategory::NonPlate,
        PlateCategory::Blue,
        PlateCategory::Yellow,
        PlateCategory::White,
        PlateCategory::Black,
        PlateCategory::Green,
    ];

    pub fn label(self) -> i32 {
        self as i32
    }

    pub fn from_label(label: i32) -> Option<Self> {
        usize::try_from(label).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Folder name of this category in a sample library.
    pub fn dir_name(self) -> &'static str {
        match self {
            PlateCategory::NonPlate => "non_plate",
            PlateCategory::Blue => "blue",
            PlateCategory::Yellow => "yellow",
            PlateCategory::White => "white",
            PlateCategory::Black => "black",
            PlateCategory::Green => "green",
        }
    }

    pub fn is_plate(self) -> bool {
        self != PlateCategory::NonPlate
    }
}

impl fmt::Display for PlateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.dir_name())
    }
}

impl FromStr for PlateCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.dir_name() == s)
            .ok_or_else(|| format!("unknown plate category `{}`", s))
    }
}

/// Strategy that found a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionMethod {
    Color,
    Edge,
}

/// A region that may hold a plate.
///
/// Candidates only come out of the locator after classification, so there is
/// no unclassified state to confuse with `NonPlate`.
#[derive(Debug, Clone)]
pub struct PlateCandidate {
    /// Bounding box in source image coordinates.
    pub bounds: Rect,
    /// Not used to rectify `image`.
    pub rotated: RotatedRect,
    /// Copy of the source pixels inside `bounds`.
    pub image: RgbImage,
    pub category: PlateCategory,
    pub method: DetectionMethod,
}

/// A loaded classifier together with the locator settings to run it with.
pub struct Lpr {
    classifier: PlateClassifier,
    config: LocatorConfig,
}

impl Lpr {
    /// Loads the model at `model_path` with the default feature layout and
    /// general locator bounds.
    pub fn new(model_path: impl AsRef<Path>) -> Result<Self, LprError> {
        Self::with_config(model_path, FeatureConfig::default(), LocatorConfig::general())
    }

    pub fn with_config(
        model_path: impl AsRef<Path>,
        feature: FeatureConfig,
        config: LocatorConfig,
    ) -> Result<Self, LprError> {
        config.validate()?;
        let classifier = PlateClassifier::new(feature)?;
        classifier.load(model_path)?;
        Ok(Lpr { classifier, config })
    }

    pub fn classifier(&self) -> &PlateClassifier {
        &self.classifier
    }

    pub fn locator(&self) -> PlateLocator<'_> {
        PlateLocator::with_valid_config(&self.classifier, self.config.clone())
    }

    /// Plates from the color strategy, or from the edge strategy when color
    /// finds none.
    pub fn locate(&self, img: &RgbImage) -> Result<Vec<PlateCandidate>, LprError> {
        self.locator().locate(img)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn labels_round_trip_through_the_table() {
        for (i, category) in PlateCategory::ALL.iter().enumerate() {
            assert_eq!(category.label(), i as i32);
            assert_eq!(PlateCategory::from_label(category.label()), Some(*category));
            assert_eq!(category.dir_name().parse::<PlateCategory>(), Ok(*category));
        }
        assert_eq!(PlateCategory::from_label(-1), None);
        assert_eq!(PlateCategory::from_label(PlateCategory::ALL.len() as i32), None);
        assert!("plate".parse::<PlateCategory>().is_err());
    }

    #[test]
    fn only_non_plate_is_rejected() {
        assert!(!PlateCategory::NonPlate.is_plate());
        assert!(PlateCategory::ALL[1..].iter().all(|c| c.is_plate()));
    }

    #[test]
    fn missing_model_fails_construction() {
        let result = Lpr::new("./models/does-not-exist.json");
        assert!(matches!(result, Err(LprError::ModelLoad { .. })));
    }
}
