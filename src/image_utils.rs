use std::io::Cursor;

use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, Luma, RgbImage, imageops::FilterType};
use ndarray::Array2;

use crate::error::Result;

pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lum =
            (0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64) as u8;
        gray.put_pixel(x, y, Luma([lum]));
    }

    gray
}

pub fn gray_to_array(image: &GrayImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    let mut arr = Array2::zeros((height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        arr[[y as usize, x as usize]] = pixel[0] as f64;
    }

    arr
}

/// Resamples to `min(w, max) x min(h, max)`, squashing the aspect ratio the
/// way a fixed-size canvas draw does.
pub fn sample_rgb(image: &DynamicImage, max: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width.min(max).max(1), height.min(max).max(1));

    if (w, h) == (width, height) {
        image.to_rgb8()
    } else {
        image.resize_exact(w, h, FilterType::Triangle).to_rgb8()
    }
}

/// Downscales to fit inside `max x max` keeping the aspect ratio.
pub fn fit_within(image: &DynamicImage, max: u32) -> RgbImage {
    let (width, height) = image.dimensions();

    if width <= max && height <= max {
        image.to_rgb8()
    } else {
        image.resize(max, max, FilterType::Triangle).to_rgb8()
    }
}

pub fn calculate_histogram(image: &GrayImage) -> [u32; 256] {
    let mut histogram = [0u32; 256];

    for pixel in image.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    histogram
}

pub fn channel_histograms(image: &RgbImage) -> [[u32; 256]; 3] {
    let mut histograms = [[0u32; 256]; 3];

    for pixel in image.pixels() {
        for c in 0..3 {
            histograms[c][pixel[c] as usize] += 1;
        }
    }

    histograms
}

/// Shannon entropy in bits, 0..=8 for a 256-bin histogram.
pub fn shannon_entropy(histogram: &[u32; 256]) -> f64 {
    let total = histogram.iter().map(|&c| c as f64).sum::<f64>();
    if total == 0.0 {
        return 0.0;
    }

    histogram
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Shrinks an image to fit `max_size` and re-encodes it as JPEG.
/// `quality` is a 0..1 fraction.
pub fn optimize_image(image: &DynamicImage, max_size: u32, quality: f64) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    let resized = if width > max_size || height > max_size {
        image.resize(max_size, max_size, FilterType::Lanczos3)
    } else {
        image.clone()
    };

    let quality = (quality.clamp(0.01, 1.0) * 100.0).round() as u8;
    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    DynamicImage::ImageRgb8(resized.to_rgb8()).write_with_encoder(encoder)?;

    Ok(buffer.into_inner())
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_entropy_bounds() {
        let flat = GrayImage::from_pixel(16, 16, Luma([128]));
        assert_eq!(shannon_entropy(&calculate_histogram(&flat)), 0.0);

        let mut ramp = GrayImage::new(256, 1);
        for x in 0..256 {
            ramp.put_pixel(x, 0, Luma([x as u8]));
        }
        let entropy = shannon_entropy(&calculate_histogram(&ramp));
        assert!((entropy - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_clamps_each_axis() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 50, Rgb([1, 2, 3])));
        assert_eq!(sample_rgb(&img, 200).dimensions(), (200, 50));
        assert_eq!(fit_within(&img, 200).dimensions(), (200, 25));
    }

    #[test]
    fn test_optimize_shrinks_large_images() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 150, Rgb([10, 200, 30])));
        let bytes = optimize_image(&img, 100, 0.9).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
    }
}
