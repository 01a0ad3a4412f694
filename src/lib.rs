use std::{collections::BTreeMap, path::Path};

use image::DynamicImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{
        characteristics::{CharacteristicsAnalyzer, ImageCharacteristics},
        heuristic::HeuristicScorer,
        quality::{QualityAnalyzer, QualityMetrics},
        statistics::{ImageStats, StatisticsAnalyzer},
        technical::TechnicalDetailsBuilder,
    },
    error::{InsightError, Result},
    hash::HashService,
    metadata::exif::ExifExtractor,
    upload::Upload,
};

pub mod analysis;
pub mod config;
pub mod detection;
pub mod error;
pub mod hash;
pub mod history;
pub mod image_utils;
pub mod metadata;
pub mod report;
pub mod server;
pub mod service;
pub mod settings;
pub mod upload;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Longest side of the resampled image the pixel scans run on.
    pub sample_size: u32,
    pub dominant_colors: usize,
    /// Fixes the heuristic's random source; unset draws from entropy.
    pub seed: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_size: 200,
            dominant_colors: 5,
            seed: None,
        }
    }
}

/// Everything the pipeline computes about one upload, decoded once.
pub struct InsightAnalyzer {
    upload: Upload,
    image: Option<DynamicImage>,
    config: AnalysisConfig,
}

impl InsightAnalyzer {
    pub fn new(upload: Upload) -> Self {
        let image = match image::load_from_memory(&upload.bytes) {
            Ok(image) => Some(image),
            Err(err) => {
                log::warn!("could not decode {}: {}", upload.file_name, err);
                None
            }
        };

        Self {
            upload,
            image,
            config: AnalysisConfig::default(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Upload::from_path(path)?))
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn upload(&self) -> &Upload {
        &self.upload
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    fn require_image(&self) -> Result<&DynamicImage> {
        self.image.as_ref().ok_or_else(|| {
            InsightError::InvalidParameter(format!(
                "{} could not be decoded as an image",
                self.upload.file_name
            ))
        })
    }

    pub fn characteristics(&self) -> ImageCharacteristics {
        match &self.image {
            Some(image) => CharacteristicsAnalyzer::new()
                .with_sample_size(self.config.sample_size)
                .analyze(image, self.upload.size()),
            None => ImageCharacteristics::default(),
        }
    }

    /// Heuristic scores plus technical details.
    pub fn analyze<R: Rng + ?Sized>(&self, rng: &mut R) -> AnalysisResult {
        let characteristics = self.characteristics();
        let mut result = HeuristicScorer::score(&self.upload.file_name, &characteristics, rng);

        let details = TechnicalDetailsBuilder::new(&characteristics, self.upload.size(), result.overall)
            .with_image(self.image.as_ref())
            .with_sample_size(self.config.sample_size)
            .build(rng);
        result.technical_details = Some(details);

        result
    }

    pub fn extract_metadata(&self) -> MetadataResult {
        ExifExtractor::extract(&self.upload.bytes)
    }

    pub fn hashes(&self) -> ImageHashes {
        HashService::calculate_all(&self.upload.bytes, self.image.as_ref())
    }

    pub fn statistics(&self) -> Result<ImageStats> {
        let image = self.require_image()?;
        Ok(StatisticsAnalyzer::new()
            .with_sample_size(self.config.sample_size)
            .with_dominant_colors(self.config.dominant_colors)
            .analyze(image, self.upload.size(), &self.upload.content_type))
    }

    pub fn quality(&self) -> Result<QualityMetrics> {
        let image = self.require_image()?;
        Ok(QualityAnalyzer::new().analyze(image, self.upload.size()))
    }

    pub fn optimize(&self, max_size: u32, quality: f64) -> Result<Vec<u8>> {
        image_utils::optimize_image(self.require_image()?, max_size, quality)
    }
}

/// Model or manipulation name to a 0..=100 percentage.
pub type ModelScores = BTreeMap<String, u32>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    #[default]
    Heuristic,
    Sightengine,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryScores {
    pub genai: u32,
    pub face_manipulation: u32,
    pub body_manipulation: u32,
    pub deepfake: u32,
    pub inpainting: u32,
    pub style_transfer: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub overall: u32,
    pub categories: CategoryScores,
    #[serde(default)]
    pub diffusion: ModelScores,
    #[serde(default)]
    pub gan: ModelScores,
    #[serde(default)]
    pub llm: ModelScores,
    #[serde(default)]
    pub manipulation: ModelScores,
    #[serde(default)]
    pub other: ModelScores,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_details: Option<TechnicalDetails>,
    #[serde(default)]
    pub source: ScoreSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactScores {
    pub compression: f64,
    pub quantization: f64,
    pub blocking: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalDetails {
    pub image_dimensions: Dimensions,
    pub file_size: u64,
    pub color_depth: u32,
    pub compression_ratio: f64,
    pub entropy: f64,
    pub edge_density: f64,
    pub color_complexity: f64,
    pub has_faces: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_count: Option<u32>,
    pub has_text: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_regions: Option<u32>,
    pub noise_level: f64,
    pub sharpness: f64,
    pub artifacts: ArtifactScores,
    pub metadata_anomalies: Vec<String>,
    pub processing_history: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_number: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub all_tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suspicious_indicators: Vec<String>,
}

impl MetadataResult {
    pub fn camera(&self) -> Option<String> {
        let camera = format!(
            "{} {}",
            self.make.as_deref().unwrap_or(""),
            self.model.as_deref().unwrap_or("")
        );
        let camera = camera.trim();
        (!camera.is_empty()).then(|| camera.to_string())
    }

    pub fn dimensions(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageHashes {
    pub md5: String,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perceptual: Option<String>,
}
