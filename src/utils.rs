use image::{imageops, GrayImage, Rgb, RgbImage};
use imageproc::drawing;
use imageproc::rect::Rect;

use std::path::Path;

use crate::error::LprError;
use crate::{DetectionMethod, PlateCandidate};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

pub fn open_gray(path: impl AsRef<Path>) -> Result<GrayImage, LprError> {
    Ok(image::open(path)?.to_luma8())
}

pub fn open_rgb(path: impl AsRef<Path>) -> Result<RgbImage, LprError> {
    Ok(image::open(path)?.to_rgb8())
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Owned copy of the pixels of `src` inside `rect`. `rect` must lie inside
/// the image.
pub fn crop(src: &RgbImage, rect: Rect) -> RgbImage {
    imageops::crop_imm(src, rect.left() as u32, rect.top() as u32, rect.width(), rect.height()).to_image()
}

/// Outlines every candidate: red for plates found by color, green for plates
/// found by edges and gray for regions classified as non-plates.
pub fn draw_candidates(img: &mut RgbImage, candidates: &[PlateCandidate]) {
    for candidate in candidates {
        let color = match (candidate.category.is_plate(), candidate.method) {
            (false, _) => Rgb([128, 128, 128]),
            (true, DetectionMethod::Color) => Rgb([255, 0, 0]),
            (true, DetectionMethod::Edge) => Rgb([0, 255, 0]),
        };
        drawing::draw_hollow_rect_mut(img, candidate.bounds, color);
    }
}
