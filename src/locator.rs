//! Plate region locator.
//!
//! Two strategies turn the source into a binary mask whose external contours
//! are plate hypotheses:
//!
//! * color: HSV with an equalized value channel, thresholded against the
//!   plate background ranges, then closed and eroded;
//! * edge: Gaussian blur, grayscale, weighted Sobel magnitude, Otsu
//!   binarization, then closed and eroded.
//!
//! Each contour whose bounding box passes the geometry filter is cropped and
//! classified. Classifier errors are returned to the caller as they are.
//! Regions classified as `NonPlate` only come out of the auto-sample entry
//! point, which keeps them for inspection.

use image::{imageops, GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use tracing::debug;

use crate::classifier::PlateClassifier;
use crate::config::LocatorConfig;
use crate::error::LprError;
use crate::geometry::{bounding_rect, is_plausible_plate_shape, RotatedRect};
use crate::image_process::{close_rect, color_mask, equalized_hsv, erode_rect, gaussian_blur, otsu_binarize, sobel_magnitude};
use crate::utils;
use crate::{DetectionMethod, PlateCandidate};

/// Candidates together with the final binary mask they were traced from.
pub type WithMask = (Vec<PlateCandidate>, GrayImage);

pub struct PlateLocator<'a> {
    classifier: &'a PlateClassifier,
    config: LocatorConfig,
}

/// Outer borders not nested inside another outer border.
fn is_external(contours: &[Contour<i32>], index: usize) -> bool {
    if !matches!(contours[index].border_type, BorderType::Outer) {
        return false;
    }
    let mut parent = contours[index].parent;
    while let Some(p) = parent {
        if matches!(contours[p].border_type, BorderType::Outer) {
            return false;
        }
        parent = contours[p].parent;
    }
    true
}

impl<'a> PlateLocator<'a> {
    /// Fails with `InvalidConfig` when `config` doesn't describe usable bounds
    /// and structuring elements.
    pub fn new(classifier: &'a PlateClassifier, config: LocatorConfig) -> Result<Self, LprError> {
        config.validate()?;
        Ok(Self::with_valid_config(classifier, config))
    }

    pub(crate) fn with_valid_config(classifier: &'a PlateClassifier, config: LocatorConfig) -> Self {
        PlateLocator { classifier, config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Binary mask of plate-colored areas.
    pub fn color_mask(&self, source: &RgbImage) -> GrayImage {
        let color = &self.config.color;
        let hsv = equalized_hsv(source);
        let binary = otsu_binarize(&color_mask(&hsv, &color.ranges));
        erode_rect(&close_rect(&binary, color.close), color.erode)
    }

    /// Binary mask of areas dense in gradient.
    pub fn edge_mask(&self, source: &RgbImage) -> GrayImage {
        let edge = &self.config.edge;
        let gray = imageops::grayscale(&gaussian_blur(source, edge.blur_size));
        let binary = otsu_binarize(&sobel_magnitude(&gray, edge.x_weight, edge.y_weight));
        erode_rect(&close_rect(&binary, edge.close), edge.erode)
    }

    fn candidates(
        &self,
        source: &RgbImage,
        mask: &GrayImage,
        method: DetectionMethod,
    ) -> Result<Vec<PlateCandidate>, LprError> {
        let contours = find_contours::<i32>(mask);
        let mut candidates = Vec::new();
        for (index, contour) in contours.iter().enumerate() {
            if !is_external(&contours, index) {
                continue;
            }
            let bounds = match bounding_rect(&contour.points) {
                Some(bounds) => bounds,
                None => continue,
            };
            if !is_plausible_plate_shape(bounds.width(), bounds.height(), &self.config.bounds) {
                continue;
            }
            let image = utils::crop(source, bounds);
            let category = self.classifier.test(&image)?;
            candidates.push(PlateCandidate {
                bounds,
                rotated: RotatedRect::of_contour(&contour.points),
                image,
                category,
                method,
            });
        }
        debug!(
            ?method,
            contours = contours.len(),
            candidates = candidates.len(),
            "plate candidates traced"
        );
        Ok(candidates)
    }

    fn run(
        &self,
        source: &RgbImage,
        method: DetectionMethod,
    ) -> Result<WithMask, LprError> {
        if source.width() == 0 || source.height() == 0 {
            return Ok((Vec::new(), GrayImage::new(0, 0)));
        }
        let mask = match method {
            DetectionMethod::Color => self.color_mask(source),
            DetectionMethod::Edge => self.edge_mask(source),
        };
        let candidates = self.candidates(source, &mask, method)?;
        Ok((candidates, mask))
    }

    /// Runs one strategy and drops the regions classified as `NonPlate`.
    fn run_plates(&self, source: &RgbImage, method: DetectionMethod) -> Result<WithMask, LprError> {
        let (mut candidates, mask) = self.run(source, method)?;
        candidates.retain(|c| c.category.is_plate());
        Ok((candidates, mask))
    }

    /// Plates found in the color mask.
    pub fn locate_by_color(&self, source: &RgbImage) -> Result<Vec<PlateCandidate>, LprError> {
        Ok(self.run_plates(source, DetectionMethod::Color)?.0)
    }

    pub fn locate_by_color_with_mask(&self, source: &RgbImage) -> Result<WithMask, LprError> {
        self.run_plates(source, DetectionMethod::Color)
    }

    /// Plates found in the edge mask.
    pub fn locate_by_edge(&self, source: &RgbImage) -> Result<Vec<PlateCandidate>, LprError> {
        Ok(self.run_plates(source, DetectionMethod::Edge)?.0)
    }

    pub fn locate_by_edge_with_mask(&self, source: &RgbImage) -> Result<WithMask, LprError> {
        self.run_plates(source, DetectionMethod::Edge)
    }

    /// Plates from the color strategy, or from the edge strategy when color
    /// finds none.
    pub fn locate(&self, source: &RgbImage) -> Result<Vec<PlateCandidate>, LprError> {
        Ok(self.locate_with_mask(source)?.0)
    }

    pub fn locate_with_mask(&self, source: &RgbImage) -> Result<WithMask, LprError> {
        let color = self.run_plates(source, DetectionMethod::Color)?;
        if !color.0.is_empty() {
            return Ok(color);
        }
        self.run_plates(source, DetectionMethod::Edge)
    }

    /// Every color candidate when at least one of them is a plate, otherwise
    /// every edge candidate. Non-plates are kept for inspection.
    pub fn locate_for_auto_sample(&self, source: &RgbImage) -> Result<Vec<PlateCandidate>, LprError> {
        Ok(self.locate_for_auto_sample_with_mask(source)?.0)
    }

    pub fn locate_for_auto_sample_with_mask(&self, source: &RgbImage) -> Result<WithMask, LprError> {
        let color = self.run(source, DetectionMethod::Color)?;
        if color.0.iter().any(|c| c.category.is_plate()) {
            return Ok(color);
        }
        self.run(source, DetectionMethod::Edge)
    }

    /// Like `locate_for_auto_sample` but keeps plates only.
    pub fn locate_for_calibration(&self, source: &RgbImage) -> Result<Vec<PlateCandidate>, LprError> {
        Ok(self.locate_for_calibration_with_mask(source)?.0)
    }

    pub fn locate_for_calibration_with_mask(&self, source: &RgbImage) -> Result<WithMask, LprError> {
        let (mut candidates, mask) = self.locate_for_auto_sample_with_mask(source)?;
        candidates.retain(|c| c.category.is_plate());
        Ok((candidates, mask))
    }
}
