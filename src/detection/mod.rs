pub mod sightengine;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    AnalysisConfig, AnalysisResult, InsightAnalyzer,
    error::{InsightError, Result},
    upload::Upload,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s > 70 => RiskLevel::High,
            s if s > 40 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    /// Report color as 0..1 RGB.
    pub fn color(&self) -> (f32, f32, f32) {
        match self {
            RiskLevel::High => (1.0, 0.2, 0.2),
            RiskLevel::Medium => (1.0, 0.6, 0.2),
            RiskLevel::Low => (0.2, 0.8, 0.2),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::High => "Likely AI-generated",
            RiskLevel::Medium => "Possibly AI-generated",
            RiskLevel::Low => "Likely authentic",
        }
    }
}

#[async_trait]
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;

    async fn detect(&self, upload: &Upload) -> Result<AnalysisResult>;
}

/// Local scorer. Each call gets its own RNG drawn from a master generator, so
/// a seeded detector replays the same sequence of results.
pub struct HeuristicDetector {
    config: AnalysisConfig,
    seeds: Mutex<StdRng>,
}

impl HeuristicDetector {
    pub fn new(config: AnalysisConfig) -> Self {
        let seeds = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            config,
            seeds: Mutex::new(seeds),
        }
    }

    /// Fresh generator for one analysis.
    pub fn next_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seeds.lock().next_u64())
    }

    /// Blocking variant for callers already off the async runtime.
    pub fn analyze(&self, upload: Upload) -> AnalysisResult {
        let mut rng = self.next_rng();
        InsightAnalyzer::new(upload)
            .with_config(self.config.clone())
            .analyze(&mut rng)
    }
}

#[async_trait]
impl Detector for HeuristicDetector {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn detect(&self, upload: &Upload) -> Result<AnalysisResult> {
        let mut rng = self.next_rng();
        let upload = upload.clone();
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            InsightAnalyzer::new(upload)
                .with_config(config)
                .analyze(&mut rng)
        })
        .await
        .map_err(|e| InsightError::Provider(format!("analysis task failed: {}", e)))
    }
}
