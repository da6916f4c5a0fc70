use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::hog::{hog, HogOptions};

use crate::config::FeatureConfig;
use crate::error::LprError;

fn hog_options(config: &FeatureConfig) -> HogOptions {
    let cell = config.cell.width as usize;
    HogOptions::new(
        config.bins,
        false,
        cell,
        config.block.width as usize / cell,
        config.block_stride.width as usize / cell,
    )
}

/// Gradient-orientation histogram of `image` resized to the configured window.
///
/// Blocks are visited row by row and each contributes its normalized cell
/// histograms, so the length depends only on `config`.
pub fn compute_descriptor(image: &GrayImage, config: &FeatureConfig) -> Result<Vec<f32>, LprError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(LprError::InvalidRegion { width, height });
    }
    let window = imageops::resize(image, config.window.width, config.window.height, FilterType::Triangle);
    let mut descriptor = hog(&window, hog_options(config)).map_err(LprError::InvalidConfig)?;
    // flat blocks have no gradient to normalize by
    for v in descriptor.iter_mut().filter(|v| !v.is_finite()) {
        *v = 0.0;
    }
    Ok(descriptor)
}
