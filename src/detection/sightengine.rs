//! Pass-through to the Sightengine `check.json` endpoint.
//!
//! The remote response is mapped onto [`AnalysisResult`] so callers cannot
//! tell the providers apart beyond [`ScoreSource`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{
    AnalysisResult, ScoreSource,
    detection::Detector,
    error::{InsightError, Result},
    upload::Upload,
};

pub const DEFAULT_ENDPOINT: &str = "https://api.sightengine.com/1.0/check.json";
const MODELS: &str = "genai,deepfake,face-attributes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SightengineCredentials {
    pub api_user: String,
    pub api_secret: String,
}

impl SightengineCredentials {
    /// Both halves must be present and non-blank.
    pub fn from_parts(api_user: Option<&str>, api_secret: Option<&str>) -> Option<Self> {
        let api_user = api_user.map(str::trim).filter(|s| !s.is_empty())?;
        let api_secret = api_secret.map(str::trim).filter(|s| !s.is_empty())?;

        Some(Self {
            api_user: api_user.to_string(),
            api_secret: api_secret.to_string(),
        })
    }
}

pub struct SightengineDetector {
    client: reqwest::Client,
    endpoint: String,
    credentials: SightengineCredentials,
    timeout: Duration,
}

impl SightengineDetector {
    pub fn new(client: reqwest::Client, credentials: SightengineCredentials) -> Self {
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credentials,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Detector for SightengineDetector {
    fn name(&self) -> &str {
        "sightengine"
    }

    async fn detect(&self, upload: &Upload) -> Result<AnalysisResult> {
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)?;
        let form = Form::new().part("media", part);

        log::debug!("sending {} to {}", upload.file_name, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("api_user", self.credentials.api_user.as_str()),
                ("api_secret", self.credentials.api_secret.as_str()),
                ("models", MODELS),
            ])
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InsightError::Provider(format!(
                "Sightengine API error: {}",
                status.canonical_reason().unwrap_or(status.as_str())
            )));
        }

        let body: SightengineResponse = response.json().await?;
        if body.status.as_deref() == Some("failure") {
            let message = body
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "request failed".to_string());
            return Err(InsightError::Provider(format!("Sightengine API error: {}", message)));
        }

        Ok(body.into_analysis())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SightengineResponse {
    pub status: Option<String>,
    pub error: Option<SightengineError>,
    pub genai: Option<GenAiSection>,
    pub deepfake: Option<ScoreSection>,
    pub face_attributes: Option<FaceAttributes>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SightengineError {
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScoreSection {
    pub score: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenAiSection {
    pub score: f64,
    pub diffusion: Option<DiffusionScores>,
    pub gan: Option<GanScores>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DiffusionScores {
    pub wan: Option<f64>,
    pub stable_diffusion: Option<f64>,
    pub midjourney: Option<f64>,
    pub dall_e: Option<f64>,
    pub flux: Option<f64>,
    pub firefly: Option<f64>,
    pub imagen: Option<f64>,
    pub reve: Option<f64>,
    pub qwen: Option<f64>,
    pub ideogram: Option<f64>,
    pub recraft: Option<f64>,
}

impl DiffusionScores {
    fn labelled(&self) -> [(&'static str, Option<f64>); 11] {
        [
            ("Wan", self.wan),
            ("Stable Diffusion", self.stable_diffusion),
            ("MidJourney", self.midjourney),
            ("DALL-E", self.dall_e),
            ("Flux", self.flux),
            ("Firefly", self.firefly),
            ("Imagen", self.imagen),
            ("Reve", self.reve),
            ("Qwen", self.qwen),
            ("Ideogram", self.ideogram),
            ("Recraft", self.recraft),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GanScores {
    pub stylegan: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FaceAttributes {
    pub manipulation: Option<f64>,
}

fn percent(probability: f64) -> u32 {
    (probability * 100.0).round().clamp(0.0, 100.0) as u32
}

impl SightengineResponse {
    pub fn into_analysis(self) -> AnalysisResult {
        let mut result = AnalysisResult {
            source: ScoreSource::Sightengine,
            ..AnalysisResult::default()
        };

        if let Some(genai) = &self.genai {
            result.categories.genai = percent(genai.score);

            if let Some(diffusion) = &genai.diffusion {
                for (label, score) in diffusion.labelled() {
                    if let Some(score) = score {
                        result.diffusion.insert(label.to_string(), percent(score));
                    }
                }
            }

            if let Some(stylegan) = genai.gan.as_ref().and_then(|g| g.stylegan) {
                result.gan.insert("StyleGAN".to_string(), percent(stylegan));
            }
        }

        if let Some(deepfake) = &self.deepfake {
            let score = percent(deepfake.score);
            result.categories.deepfake = score;
            result.categories.face_manipulation = score;
            result.manipulation.insert("Deepfake".to_string(), score);
        }

        if let Some(manipulation) = self.face_attributes.as_ref().and_then(|f| f.manipulation) {
            result.categories.face_manipulation =
                result.categories.face_manipulation.max(percent(manipulation));
        }

        result.overall = result
            .categories
            .genai
            .max(result.categories.face_manipulation)
            .max(result.categories.deepfake);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_full_response() {
        let body = r#"{
            "status": "success",
            "genai": {
                "score": 0.914,
                "diffusion": { "wan": 0.88, "midjourney": 0.021, "unknown_model": 0.5 },
                "gan": { "stylegan": 0.004 }
            },
            "deepfake": { "score": 0.12 },
            "face_attributes": { "manipulation": 0.35 }
        }"#;
        let response: SightengineResponse = serde_json::from_str(body).unwrap();
        let result = response.into_analysis();

        assert_eq!(result.source, ScoreSource::Sightengine);
        assert_eq!(result.categories.genai, 91);
        assert_eq!(result.diffusion["Wan"], 88);
        assert_eq!(result.diffusion["MidJourney"], 2);
        assert_eq!(result.diffusion.len(), 2);
        assert_eq!(result.gan["StyleGAN"], 0);
        assert_eq!(result.categories.deepfake, 12);
        assert_eq!(result.manipulation["Deepfake"], 12);
        assert_eq!(result.categories.face_manipulation, 35);
        assert_eq!(result.overall, 91);
        assert!(result.technical_details.is_none());
    }

    #[test]
    fn test_transform_empty_response() {
        let response: SightengineResponse = serde_json::from_str("{}").unwrap();
        let result = response.into_analysis();
        assert_eq!(result.overall, 0);
        assert!(result.diffusion.is_empty());
    }

    #[test]
    fn test_deepfake_can_dominate() {
        let body = r#"{ "genai": { "score": 0.1 }, "deepfake": { "score": 0.77 } }"#;
        let result = serde_json::from_str::<SightengineResponse>(body)
            .unwrap()
            .into_analysis();
        assert_eq!(result.overall, 77);
        assert_eq!(result.categories.face_manipulation, 77);
    }

    #[test]
    fn test_credentials_require_both_parts() {
        assert!(SightengineCredentials::from_parts(Some("u"), Some("s")).is_some());
        assert!(SightengineCredentials::from_parts(Some("u"), Some("  ")).is_none());
        assert!(SightengineCredentials::from_parts(None, Some("s")).is_none());
    }
}
