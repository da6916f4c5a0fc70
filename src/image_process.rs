//! Image transforms shared by the two locating strategies.
//!
//! Binary masks are `GrayImage`s holding only 0 and 255.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::separable_filter_equal;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::map::map_colors;
use imageproc::morphology::{grayscale_close, grayscale_dilate, grayscale_erode, Mask};
use imageproc::stats::cumulative_histogram;
use palette::{FromColor, Hsv, Srgb};

use crate::config::{HsvRange, Size};

/// Converts to HSV stored in an `Rgb` buffer: hue halved into 0..180,
/// saturation and value scaled to 0..255.
pub fn to_hsv(src: &RgbImage) -> RgbImage {
    map_colors(src, |Rgb([r, g, b])| {
        let hsv: Hsv = Hsv::from_color(Srgb::new(r, g, b).into_format::<f32>());
        let hue = (hsv.hue.into_positive_degrees() / 2.0).round() as u32 % 180;
        Rgb([
            hue as u8,
            (hsv.saturation * 255.0).round() as u8,
            (hsv.value * 255.0).round() as u8,
        ])
    })
}

/// Histogram equalization stretched so the darkest level present maps to 0
/// and the brightest to 255. An image with a single level is returned as is.
pub fn equalize(gray: &GrayImage) -> GrayImage {
    let cdf = cumulative_histogram(gray).channels[0];
    let total = cdf[255];
    let darkest = cdf.iter().copied().find(|c| *c > 0).unwrap_or(0);
    if total == darkest {
        return gray.clone();
    }
    let scale = 255.0 / (total - darkest) as f32;
    map_colors(gray, |Luma([v]): Luma<u8>| {
        Luma([((cdf[v as usize] - darkest) as f32 * scale).round().min(255.0) as u8])
    })
}

/// HSV image whose value channel has been histogram-equalized.
pub fn equalized_hsv(src: &RgbImage) -> RgbImage {
    let mut hsv = to_hsv(src);
    let value = map_colors(&hsv, |p: Rgb<u8>| Luma([p[2]]));
    let value = equalize(&value);
    for (p, v) in hsv.pixels_mut().zip(value.pixels()) {
        p[2] = v[0];
    }
    hsv
}

/// Per-range in-range masks added together with saturation.
pub fn color_mask(hsv: &RgbImage, ranges: &[HsvRange]) -> GrayImage {
    map_colors(hsv, |p: Rgb<u8>| {
        let value = ranges
            .iter()
            .filter(|range| range.contains(p.0))
            .fold(0u8, |acc, _| acc.saturating_add(255));
        Luma([value])
    })
}

/// Binarizes with the level that maximizes between-class variance.
pub fn otsu_binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    threshold(gray, level, ThresholdType::Binary)
}

/// 1-D Gaussian kernel of `size` taps; sigma is derived from the size.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    match size {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
        _ => {
            let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
            let half = (size / 2) as f32;
            let taps: Vec<f32> = (0..size)
                .map(|i| {
                    let d = i as f32 - half;
                    (-(d * d) / (2.0 * sigma * sigma)).exp()
                })
                .collect();
            let sum: f32 = taps.iter().sum();
            taps.into_iter().map(|t| t / sum).collect()
        }
    }
}

pub fn gaussian_blur(src: &RgbImage, size: u32) -> RgbImage {
    separable_filter_equal(src, &gaussian_kernel(size))
}

/// Weighted sum of absolute 3x3 Sobel derivatives, saturated to 8 bits.
pub fn sobel_magnitude(gray: &GrayImage, x_weight: f32, y_weight: f32) -> GrayImage {
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);
    let abs = |v: i16| v.unsigned_abs().min(255) as f32;
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let sum = x_weight * abs(gx.get_pixel(x, y)[0]) + y_weight * abs(gy.get_pixel(x, y)[0]);
        Luma([sum.round().clamp(0.0, 255.0) as u8])
    })
}

/// Rectangular structuring element anchored at its center.
fn rect_mask(element: Size) -> Mask {
    let pixels = GrayImage::from_pixel(element.width, element.height, Luma([255]));
    Mask::from_image(&pixels, (element.width / 2) as u8, (element.height / 2) as u8)
}

/// Pixels outside the image don't take part in any of the rectangular
/// operators. Element sides must be in `1..512`.
pub fn dilate_rect(image: &GrayImage, element: Size) -> GrayImage {
    grayscale_dilate(image, &rect_mask(element))
}

pub fn erode_rect(image: &GrayImage, element: Size) -> GrayImage {
    grayscale_erode(image, &rect_mask(element))
}

/// Dilation followed by erosion with the same element.
pub fn close_rect(image: &GrayImage, element: Size) -> GrayImage {
    grayscale_close(image, &rect_mask(element))
}
