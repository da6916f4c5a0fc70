//! Labelled plate samples stored as `<root>/plates/<category>/<name>.<ext>`.
//!
//! Writing samples into the tree is left to other tools; this module only
//! reads it back for training.

use tracing::{debug, info};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

use crate::classifier::PlateClassifier;
use crate::error::LprError;
use crate::utils;
use crate::PlateCategory;

pub const PLATES_DIR: &str = "plates";

/// Descriptor rows with the category label of each row.
#[derive(Debug, Default)]
pub struct TrainingSet {
    pub samples: Vec<Vec<f32>>,
    pub labels: Vec<i32>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples labelled `category`.
    pub fn count(&self, category: PlateCategory) -> usize {
        self.labels.iter().filter(|l| **l == category.label()).count()
    }
}

pub fn category_dir(root: &Path, category: PlateCategory) -> PathBuf {
    root.join(PLATES_DIR).join(category.dir_name())
}

/// Whether every category has its folder under `<root>/plates`.
pub fn is_training_directory(root: impl AsRef<Path>) -> bool {
    PlateCategory::ALL
        .iter()
        .all(|c| category_dir(root.as_ref(), *c).is_dir())
}

/// Image files directly inside the folder of `category`, sorted by path.
pub fn sample_files(root: &Path, category: PlateCategory) -> Result<Vec<PathBuf>, LprError> {
    let dir = category_dir(root, category);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| LprError::Dataset(e.to_string()))?;
        if entry.file_type().is_file() && utils::is_image_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Reads every sample as grayscale and computes its descriptor.
pub fn load_training_set(root: impl AsRef<Path>, classifier: &PlateClassifier) -> Result<TrainingSet, LprError> {
    let root = root.as_ref();
    if !root.join(PLATES_DIR).is_dir() {
        return Err(LprError::Dataset(format!(
            "{} has no {} folder",
            root.display(),
            PLATES_DIR
        )));
    }

    let mut set = TrainingSet::default();
    for category in PlateCategory::ALL.iter().copied() {
        let files = sample_files(root, category)?;
        debug!(%category, files = files.len(), "reading plate samples");
        for path in files {
            let gray = utils::open_gray(&path)?;
            set.samples.push(classifier.compute_descriptor(&gray)?);
            set.labels.push(category.label());
        }
    }
    if set.is_empty() {
        return Err(LprError::Dataset(format!("no samples under {}", root.display())));
    }
    info!(samples = set.len(), "plate samples loaded");
    Ok(set)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::FeatureConfig;
    use image::{GrayImage, Luma};
    use std::error::Error;
    use std::fs;

    #[test]
    fn detects_complete_tree() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        assert!(!is_training_directory(dir.path()));
        for category in PlateCategory::ALL {
            fs::create_dir_all(category_dir(dir.path(), category))?;
        }
        assert!(is_training_directory(dir.path()));
        fs::remove_dir(category_dir(dir.path(), PlateCategory::Green))?;
        assert!(!is_training_directory(dir.path()));
        Ok(())
    }

    #[test]
    fn loads_labelled_samples() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let classifier = PlateClassifier::new(FeatureConfig::default())?;
        for (category, n) in [(PlateCategory::Blue, 3), (PlateCategory::NonPlate, 2)] {
            let folder = category_dir(dir.path(), category);
            fs::create_dir_all(&folder)?;
            for i in 0..n {
                let img = GrayImage::from_fn(80, 24, |x, _| Luma([((x * (i + 3)) % 255) as u8]));
                img.save(folder.join(format!("sample-{}.png", i)))?;
            }
            fs::write(folder.join("readme.txt"), "not an image")?;
        }

        let set = load_training_set(dir.path(), &classifier)?;
        assert_eq!(set.len(), 5);
        assert_eq!(set.count(PlateCategory::Blue), 3);
        assert_eq!(set.count(PlateCategory::NonPlate), 2);
        let len = classifier.feature_config().descriptor_len();
        assert!(set.samples.iter().all(|s| s.len() == len));
        Ok(())
    }

    #[test]
    fn missing_or_empty_tree_is_an_error() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let classifier = PlateClassifier::new(FeatureConfig::default())?;
        assert!(matches!(load_training_set(dir.path(), &classifier), Err(LprError::Dataset(_))));
        fs::create_dir_all(category_dir(dir.path(), PlateCategory::Blue))?;
        assert!(matches!(load_training_set(dir.path(), &classifier), Err(LprError::Dataset(_))));
        Ok(())
    }
}
