use std::collections::HashMap;

use image::{DynamicImage, GenericImageView, RgbImage};
use serde::{Deserialize, Serialize};

use crate::image_utils::{channel_histograms, fit_within, sample_rgb};

const QUANT_STEP: u8 = 32;

/// Per-channel histogram, each bin scaled so the tallest bin across all three
/// channels is 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorHistogram {
    pub r: Vec<f64>,
    pub g: Vec<f64>,
    pub b: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStats {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub file_size: u64,
    pub format: String,
    pub color_depth: u8,
    pub dominant_colors: Vec<String>,
    pub histogram: ColorHistogram,
}

pub struct StatisticsAnalyzer {
    sample_size: u32,
    dominant_colors: usize,
}

impl StatisticsAnalyzer {
    pub fn new() -> Self {
        Self {
            sample_size: 200,
            dominant_colors: 5,
        }
    }

    pub fn with_sample_size(mut self, size: u32) -> Self {
        self.sample_size = size.max(1);
        self
    }

    pub fn with_dominant_colors(mut self, count: usize) -> Self {
        self.dominant_colors = count;
        self
    }

    pub fn analyze(&self, image: &DynamicImage, file_size: u64, format: &str) -> ImageStats {
        let (width, height) = image.dimensions();

        ImageStats {
            width,
            height,
            aspect_ratio: if height == 0 { 0.0 } else { width as f64 / height as f64 },
            file_size,
            format: format.to_string(),
            color_depth: image.color().channel_count(),
            dominant_colors: dominant_colors(&fit_within(image, self.sample_size), self.dominant_colors),
            histogram: color_histogram(&sample_rgb(image, self.sample_size)),
        }
    }
}

impl Default for StatisticsAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Most frequent colors after quantizing each channel down to a multiple of
/// 32, as `#rrggbb`. Ties keep the order in which the colors first appear.
pub fn dominant_colors(image: &RgbImage, count: usize) -> Vec<String> {
    let mut counts: HashMap<(u8, u8, u8), (usize, usize)> = HashMap::new();

    for (order, pixel) in image.pixels().enumerate() {
        let key = (
            pixel[0] / QUANT_STEP * QUANT_STEP,
            pixel[1] / QUANT_STEP * QUANT_STEP,
            pixel[2] / QUANT_STEP * QUANT_STEP,
        );
        counts.entry(key).or_insert((0, order)).0 += 1;
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));

    ranked
        .into_iter()
        .take(count)
        .map(|((r, g, b), _)| format!("#{:02x}{:02x}{:02x}", r, g, b))
        .collect()
}

pub fn color_histogram(image: &RgbImage) -> ColorHistogram {
    let [r, g, b] = channel_histograms(image);
    let max = r.iter().chain(&g).chain(&b).copied().max().unwrap_or(0);

    let scale = |bins: [u32; 256]| -> Vec<f64> {
        bins.iter()
            .map(|&v| if max == 0 { 0.0 } else { v as f64 / max as f64 * 100.0 })
            .collect()
    };

    ColorHistogram {
        r: scale(r),
        g: scale(g),
        b: scale(b),
    }
}
