use image::{DynamicImage, GenericImageView, GrayImage, RgbImage};
use imageproc::{filter::gaussian_blur_f32, gradients::sobel_gradients};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::image_utils::{gray_to_array, rgb_to_gray};

const BLOCK_SIZE: u32 = 8;
const BLOCK_EDGE_THRESHOLD: f64 = 0.3;
const LOW_BYTES_PER_PIXEL: f64 = 0.5;

/// Mean residual (in gray levels) that maps to a noise level of 1.0.
const NOISE_FULL_SCALE: f64 = 32.0;
/// Mean Sobel magnitude that maps to a sharpness of 1.0.
const SHARPNESS_FULL_SCALE: f64 = 128.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionArtifacts {
    pub has_artifacts: bool,
    pub confidence: f64,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 80 => QualityLevel::Excellent,
            s if s >= 60 => QualityLevel::Good,
            s if s >= 40 => QualityLevel::Fair,
            _ => QualityLevel::Poor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub artifacts: CompressionArtifacts,
    pub bytes_per_pixel: f64,
    /// File size as a percentage of the uncompressed 24-bit size.
    pub compression_ratio: f64,
    pub resolution: u64,
    pub file_size: u64,
    pub quality_score: u32,
    pub quality_level: QualityLevel,
}

pub struct QualityAnalyzer;

impl QualityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, image: &DynamicImage, file_size: u64) -> QualityMetrics {
        let (width, height) = image.dimensions();
        let resolution = width as u64 * height as u64;
        let bytes_per_pixel = file_size as f64 / resolution.max(1) as f64;
        let compression_ratio = bytes_per_pixel / 3.0 * 100.0;

        let artifacts = detect_compression_artifacts(&image.to_rgb8(), file_size);

        let mut score: i32 = 100;
        if artifacts.has_artifacts {
            score -= 20;
        }
        if bytes_per_pixel < LOW_BYTES_PER_PIXEL {
            score -= 15;
        }
        if compression_ratio > 50.0 {
            score -= 10;
        }
        let quality_score = score.clamp(0, 100) as u32;

        QualityMetrics {
            artifacts,
            bytes_per_pixel,
            compression_ratio,
            resolution,
            file_size,
            quality_score,
            quality_level: QualityLevel::from_score(quality_score),
        }
    }
}

impl Default for QualityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Looks for 8x8 block seams by comparing each block's top row with the row
/// one block further down.
pub fn detect_compression_artifacts(image: &RgbImage, file_size: u64) -> CompressionArtifacts {
    let (width, height) = image.dimensions();
    let mut details = Vec::new();
    let mut artifact_score: f64 = 0.0;

    for y in (0..height.saturating_sub(BLOCK_SIZE)).step_by(BLOCK_SIZE as usize) {
        for x in (0..width.saturating_sub(BLOCK_SIZE)).step_by(BLOCK_SIZE as usize) {
            if block_edge_variance(image, x, y) > BLOCK_EDGE_THRESHOLD {
                artifact_score += 0.1;
            }
        }
    }

    if artifact_score > 0.5 {
        details.push("Block artifacts detected (possible JPEG compression)".to_string());
    }

    let pixel_count = (width as u64 * height as u64).max(1);
    if (file_size as f64 / pixel_count as f64) < LOW_BYTES_PER_PIXEL {
        details.push("Low bytes-per-pixel ratio (possible heavy compression)".to_string());
        artifact_score += 0.3;
    }

    CompressionArtifacts {
        has_artifacts: artifact_score > 0.3,
        confidence: (artifact_score * 100.0).min(100.0),
        details,
    }
}

fn block_edge_variance(image: &RgbImage, x: u32, y: u32) -> f64 {
    let (width, height) = image.dimensions();
    let mut variance = 0.0;
    let mut count = 0;

    for i in 0..BLOCK_SIZE {
        let px = x + i;
        let below = y + BLOCK_SIZE;
        if px >= width || below >= height {
            continue;
        }

        let a = image.get_pixel(px, y);
        let b = image.get_pixel(px, below);
        let diff = (0..3)
            .map(|c| (a[c] as f64 - b[c] as f64).abs())
            .sum::<f64>();
        variance += diff / 3.0;
        count += 1;
    }

    if count > 0 {
        variance / count as f64 / 255.0
    } else {
        0.0
    }
}

/// Mean absolute high-frequency residual, scaled to 0..1.
pub fn estimate_noise_level(gray: &GrayImage) -> f64 {
    if gray.width() < 3 || gray.height() < 3 {
        return 0.0;
    }

    let blurred = gaussian_blur_f32(gray, 1.0);
    let residual = gray_to_array(gray) - gray_to_array(&blurred);
    let mean_abs = ndarray::ArrayRef::mean(&residual.mapv(f64::abs)).unwrap_or(0.0);

    (mean_abs / NOISE_FULL_SCALE).min(1.0)
}

/// Mean Sobel gradient magnitude, scaled to 0..1.
pub fn estimate_sharpness(gray: &GrayImage) -> f64 {
    if gray.width() < 3 || gray.height() < 3 {
        return 0.0;
    }

    let gradients = sobel_gradients(gray);
    let mean = gradients.pixels().map(|p| p[0] as f64).mean();
    if mean.is_nan() {
        return 0.0;
    }

    (mean / SHARPNESS_FULL_SCALE).min(1.0)
}

/// Noise and sharpness measured together from one grayscale conversion.
pub fn measure_noise_and_sharpness(image: &DynamicImage) -> (f64, f64) {
    let gray = rgb_to_gray(&image.to_rgb8());
    (estimate_noise_level(&gray), estimate_sharpness(&gray))
}
