use std::collections::HashSet;

use image::{DynamicImage, GenericImageView, RgbImage};
use serde::{Deserialize, Serialize};

use crate::image_utils::sample_rgb;

const EDGE_THRESHOLD: u32 = 30;
const SKIN_RATIO_FOR_FACES: f64 = 0.1;

/// Trivial pixel statistics the heuristic scorer keys off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCharacteristics {
    pub has_faces: bool,
    pub has_text: bool,
    pub color_complexity: f64,
    pub edge_density: f64,
    pub compression_level: f64,
    pub skin_tone_ratio: f64,
    pub width: u32,
    pub height: u32,
    pub decoded: bool,
}

impl Default for ImageCharacteristics {
    /// Values used when the image cannot be decoded.
    fn default() -> Self {
        Self {
            has_faces: false,
            has_text: false,
            color_complexity: 0.5,
            edge_density: 0.5,
            compression_level: 0.5,
            skin_tone_ratio: 0.0,
            width: 1920,
            height: 1080,
            decoded: false,
        }
    }
}

impl ImageCharacteristics {
    /// High color complexity, faces and soft edges together read as generated.
    pub fn likely_ai(&self) -> bool {
        self.color_complexity > 0.3 && self.has_faces && self.edge_density < 0.3
    }
}

pub struct CharacteristicsAnalyzer {
    sample_size: u32,
}

impl CharacteristicsAnalyzer {
    pub fn new() -> Self {
        Self { sample_size: 200 }
    }

    pub fn with_sample_size(mut self, size: u32) -> Self {
        self.sample_size = size.max(1);
        self
    }

    pub fn analyze(&self, image: &DynamicImage, file_size: u64) -> ImageCharacteristics {
        let (width, height) = image.dimensions();
        let sample = sample_rgb(image, self.sample_size);
        let total = (sample.width() * sample.height()) as f64;

        let skin_tone_ratio = count_skin_tone_pixels(&sample) as f64 / total;
        let compression_level = if width == 0 || height == 0 {
            1.0
        } else {
            file_size as f64 / (width as f64 * height as f64)
        };

        ImageCharacteristics {
            has_faces: skin_tone_ratio > SKIN_RATIO_FOR_FACES,
            has_text: false,
            color_complexity: (count_unique_colors(&sample) as f64 / total).min(1.0),
            edge_density: (count_edge_pixels(&sample) as f64 / total).min(1.0),
            compression_level: compression_level.min(1.0),
            skin_tone_ratio,
            width,
            height,
            decoded: true,
        }
    }
}

impl Default for CharacteristicsAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn count_unique_colors(image: &RgbImage) -> usize {
    image
        .pixels()
        .map(|p| (p[0], p[1], p[2]))
        .collect::<HashSet<_>>()
        .len()
}

/// Counts pixels that differ from their raster-order predecessor by more than
/// the edge threshold. The first and last pixels are never counted.
pub fn count_edge_pixels(image: &RgbImage) -> usize {
    let raw = image.as_raw();
    let pixel_count = raw.len() / 3;
    if pixel_count < 3 {
        return 0;
    }

    (1..pixel_count - 1)
        .filter(|&i| {
            let cur = &raw[i * 3..i * 3 + 3];
            let prev = &raw[(i - 1) * 3..i * 3];
            let diff = cur
                .iter()
                .zip(prev)
                .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs())
                .sum::<u32>();
            diff > EDGE_THRESHOLD
        })
        .count()
}

pub fn is_skin_tone(r: u8, g: u8, b: u8) -> bool {
    let in_range = r > 95 && r < 240 && g > 40 && g < 210 && b > 20 && b < 200;
    in_range && r > g && g > b && r as i32 - b as i32 > 15
}

pub fn count_skin_tone_pixels(image: &RgbImage) -> usize {
    image
        .pixels()
        .filter(|p| is_skin_tone(p[0], p[1], p[2]))
        .count()
}
