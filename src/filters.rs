// Pixel filters applied around the super-resolution step:
// the size guard, the optional pre-denoise and the smoothing + sharpening cleanup.

use image::{Rgb, RgbImage, imageops};
use imageproc::filter::{gaussian_blur_f32, median_filter};

/// Bilateral smoothing parameters used by the cleanup pass.
pub const BILATERAL_DIAMETER: u32 = 5;
pub const BILATERAL_SIGMA_COLOR: f32 = 75.0;
pub const BILATERAL_SIGMA_SPACE: f32 = 75.0;

/// Unsharp mask parameters: `amount * smoothed - (amount - 1) * blurred`.
pub const SHARPEN_SIGMA: f32 = 3.0;
pub const SHARPEN_AMOUNT: f32 = 1.5;

/// Returns the dimensions an image must be shrunk to so that neither side
/// exceeds `max_dim`, or `None` if it already fits.
pub fn bounded_dimensions(width: u32, height: u32, max_dim: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dim {
        return None;
    }
    // Uniform factor max_dim / longest, floored per side; the longest side lands exactly on max_dim.
    let shrink = |side: u32| ((side as u64 * max_dim as u64 / longest as u64) as u32).max(1);
    Some((shrink(width), shrink(height)))
}

/// Shrinks the image with area averaging if either side exceeds `max_dim`.
/// Never enlarges and keeps the aspect ratio.
pub fn limit_size(image: RgbImage, max_dim: u32) -> RgbImage {
    match bounded_dimensions(image.width(), image.height(), max_dim) {
        Some((width, height)) => imageops::thumbnail(&image, width, height),
        None => image,
    }
}

/// Light noise suppression before upscaling, so compression artifacts are not
/// amplified by the model.
pub fn pre_denoise(image: &RgbImage) -> RgbImage {
    median_filter(image, 1, 1)
}

// Index into a line of length `len` with reflect-101 border handling.
fn reflect_101(index: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as u32
}

/// Edge-preserving smoothing.
///
/// Each output pixel is a weighted mean over a circular neighbourhood of the
/// given diameter. The weight of a neighbour is the product of a spatial
/// Gaussian on its distance and a range Gaussian on the L1 distance between
/// the two colors, so averaging does not cross strong edges.
pub fn bilateral_filter(
    image: &RgbImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let radius = (diameter / 2) as i64;
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2.sqrt() > radius as f32 {
                continue;
            }
            offsets.push((dx, dy, (r2 * space_coeff).exp()));
        }
    }

    let color_weights: Vec<f32> = (0..=255 * 3)
        .map(|d| {
            let d = d as f32;
            (d * d * color_coeff).exp()
        })
        .collect();

    RgbImage::from_fn(width, height, |x, y| {
        let center = image.get_pixel(x, y).0;
        let mut sum = [0f32; 3];
        let mut weight_sum = 0f32;

        for &(dx, dy, space_weight) in &offsets {
            let nx = reflect_101(x as i64 + dx, width as i64);
            let ny = reflect_101(y as i64 + dy, height as i64);
            let neighbor = image.get_pixel(nx, ny).0;
            let distance: usize = (0..3)
                .map(|c| (neighbor[c] as i32 - center[c] as i32).unsigned_abs() as usize)
                .sum();
            let weight = space_weight * color_weights[distance];
            for c in 0..3 {
                sum[c] += neighbor[c] as f32 * weight;
            }
            weight_sum += weight;
        }

        Rgb(sum.map(|s| (s / weight_sum).round().clamp(0.0, 255.0) as u8))
    })
}

/// Sharpens by subtracting a Gaussian-blurred copy:
/// `out = amount * image - (amount - 1) * blur(image, sigma)`, clipped to 0..=255.
///
/// The blur kernel has radius `ceil(2 * sigma)` with replicated edges, so the
/// halo is narrower than a `3 * sigma` kernel with reflected borders.
pub fn unsharp_mask(image: &RgbImage, sigma: f32, amount: f32) -> RgbImage {
    let blurred = gaussian_blur_f32(image, sigma);
    let mut output = image.clone();
    for (out, blur) in output.iter_mut().zip(blurred.iter()) {
        let value = amount * *out as f32 - (amount - 1.0) * *blur as f32;
        *out = value.round().clamp(0.0, 255.0) as u8;
    }
    output
}

/// The fixed post-upscale cleanup: bilateral smoothing, then unsharp masking.
pub fn cleanup(image: &RgbImage) -> RgbImage {
    let smoothed = bilateral_filter(
        image,
        BILATERAL_DIAMETER,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPACE,
    );
    unsharp_mask(&smoothed, SHARPEN_SIGMA, SHARPEN_AMOUNT)
}
