//! Plate category classifier: a linear SVM over gradient-histogram features.
//!
//! The model lives behind a reader-writer lock. Classification clones the
//! current snapshot and scores without holding the lock; `train` and `load`
//! build a complete model first and then replace the snapshot in one write.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::FeatureConfig;
use crate::error::LprError;
use crate::hog;
use crate::svm::{LinearSvm, SvmParams};
use crate::utils;
use crate::PlateCategory;

const MODEL_FORMAT: &str = "lpr-plate-category-svm";
const MODEL_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ModelFile<S> {
    format: String,
    version: u32,
    feature: FeatureConfig,
    svm: S,
}

pub struct PlateClassifier {
    feature: FeatureConfig,
    params: SvmParams,
    model: RwLock<Option<Arc<LinearSvm>>>,
}

impl PlateClassifier {
    /// An untrained classifier for descriptors laid out by `feature`.
    pub fn new(feature: FeatureConfig) -> Result<Self, LprError> {
        Self::with_params(feature, SvmParams::default())
    }

    pub fn with_params(feature: FeatureConfig, params: SvmParams) -> Result<Self, LprError> {
        feature.validate()?;
        Ok(PlateClassifier {
            feature,
            params,
            model: RwLock::new(None),
        })
    }

    pub fn feature_config(&self) -> &FeatureConfig {
        &self.feature
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }

    fn snapshot(&self) -> Option<Arc<LinearSvm>> {
        self.model.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(&self, model: LinearSvm) {
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(model));
    }

    pub fn compute_descriptor(&self, image: &GrayImage) -> Result<Vec<f32>, LprError> {
        hog::compute_descriptor(image, &self.feature)
    }

    /// Trains a new model from descriptor rows and their category labels.
    ///
    /// Returns false, leaving the current model in place, when the input is
    /// inconsistent or the solver fails.
    pub fn train(&self, samples: &[Vec<f32>], labels: &[i32]) -> bool {
        let expected = self.feature.descriptor_len();
        if let Some(row) = samples.iter().position(|s| s.len() != expected) {
            warn!(row, len = samples[row].len(), expected, "training sample has the wrong descriptor length");
            return false;
        }
        if let Some(label) = labels.iter().find(|l| PlateCategory::from_label(**l).is_none()) {
            warn!(label, "training label has no plate category");
            return false;
        }

        match LinearSvm::train(samples, labels, &self.params) {
            Ok(model) => {
                info!(
                    samples = samples.len(),
                    classes = model.classes().len(),
                    "plate classifier trained"
                );
                self.replace(model);
                true
            }
            Err(e) => {
                warn!("plate classifier training failed: {}", e);
                false
            }
        }
    }

    /// Writes the current model to `path`. Does nothing when no model is ready.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LprError> {
        let model = match self.snapshot() {
            Some(model) => model,
            None => {
                debug!("no plate classifier to save");
                return Ok(());
            }
        };
        let file = ModelFile {
            format: MODEL_FORMAT.to_string(),
            version: MODEL_VERSION,
            feature: self.feature,
            svm: model.as_ref(),
        };
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(&mut writer, &file)?;
        writer.flush()?;
        info!(path = %path.as_ref().display(), "plate classifier saved");
        Ok(())
    }

    /// Replaces the model with the one stored at `path`.
    ///
    /// On failure the previous model, if any, stays in use.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), LprError> {
        let path = path.as_ref();
        let reader = File::open(path).map(BufReader::new).map_err(|e| LprError::model_load(path, e))?;
        let file: ModelFile<LinearSvm> = serde_json::from_reader(reader).map_err(|e| LprError::model_load(path, e))?;

        if file.format != MODEL_FORMAT || file.version != MODEL_VERSION {
            return Err(LprError::model_load(
                path,
                format!("unsupported model format {} v{}", file.format, file.version),
            ));
        }
        if file.feature != self.feature {
            return Err(LprError::model_load(
                path,
                format!("model was trained with feature layout {:?}", file.feature),
            ));
        }
        file.svm.check().map_err(|e| LprError::model_load(path, e))?;
        if file.svm.var_count() != self.feature.descriptor_len() {
            return Err(LprError::model_load(
                path,
                format!(
                    "model expects {} features, descriptor has {}",
                    file.svm.var_count(),
                    self.feature.descriptor_len()
                ),
            ));
        }
        if let Some(label) = file.svm.classes().iter().find(|l| PlateCategory::from_label(**l).is_none()) {
            return Err(LprError::model_load(path, format!("model contains unknown label {}", label)));
        }

        self.replace(file.svm);
        info!(path = %path.display(), "plate classifier loaded");
        Ok(())
    }

    /// Classifies a color region.
    pub fn test(&self, region: &RgbImage) -> Result<PlateCategory, LprError> {
        self.test_luma(&image::imageops::grayscale(region))
    }

    pub fn test_luma(&self, image: &GrayImage) -> Result<PlateCategory, LprError> {
        let model = self.snapshot().ok_or(LprError::ClassifierNotReady)?;
        let descriptor = self.compute_descriptor(image)?;
        let label = model.predict(&descriptor);
        PlateCategory::from_label(label).ok_or(LprError::UnknownCategory(label))
    }

    /// Classifies the image file at `path`, read as grayscale.
    pub fn test_file(&self, path: impl AsRef<Path>) -> Result<PlateCategory, LprError> {
        self.test_luma(&utils::open_gray(path)?)
    }
}
