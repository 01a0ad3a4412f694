use std::{sync::Arc, time::Duration};

use chrono::Utc;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    AnalysisConfig, AnalysisResult, ImageHashes, InsightAnalyzer, MetadataResult,
    analysis::{quality::QualityMetrics, statistics::ImageStats},
    config::Config,
    detection::{
        Detector, HeuristicDetector,
        sightengine::{SightengineCredentials, SightengineDetector},
    },
    error::{InsightError, Result},
    hash::{HashComparison, HashService},
    history::HistoryStore,
    metadata::exif::ExifExtractor,
    report::{
        self, ExportFormat,
        pdf::{PdfReportGenerator, ReportContent},
        visualization::ChartRenderer,
    },
    settings::{ApiProvider, AppSettings, SettingsStore},
    upload::{Upload, UploadPolicy},
};

/// Body of the report and export endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub analysis_result: Option<AnalysisResult>,
    pub metadata: Option<MetadataResult>,
    pub hashes: Option<ImageHashes>,
    pub file_name: Option<String>,
}

impl ReportRequest {
    fn required(&self) -> Result<(&AnalysisResult, &MetadataResult)> {
        match (&self.analysis_result, &self.metadata) {
            (Some(analysis), Some(metadata)) => Ok((analysis, metadata)),
            _ => Err(InsightError::InvalidParameter(
                "Missing required data: analysisResult and metadata".into(),
            )),
        }
    }
}

/// A rendered file for download.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub stats: ImageStats,
    pub quality: QualityMetrics,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparedImage {
    pub file_name: String,
    pub file_size: u64,
    pub hashes: ImageHashes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ImageStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub first: ComparedImage,
    pub second: ComparedImage,
    pub comparison: HashComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub file_name: String,
    pub file_size: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(std::io::Error::from)?
}

pub struct InsightService {
    config: Config,
    client: reqwest::Client,
    heuristic: HeuristicDetector,
    history: HistoryStore,
    settings: SettingsStore,
}

impl InsightService {
    pub fn new(config: Config) -> Self {
        let history = HistoryStore::new(&config.storage.history_path)
            .with_max_items(config.storage.max_history_items);
        let settings = SettingsStore::new(&config.storage.settings_path);
        let heuristic = HeuristicDetector::new(config.analysis.clone());

        Self {
            config,
            client: reqwest::Client::new(),
            heuristic,
            history,
            settings,
        }
    }

    pub fn shared(config: Config) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.config.upload
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    fn sightengine(&self, credentials: SightengineCredentials) -> SightengineDetector {
        SightengineDetector::new(self.client.clone(), credentials)
            .with_endpoint(self.config.sightengine.endpoint.clone())
            .with_timeout(Duration::from_secs(self.config.sightengine.timeout_secs))
    }

    /// Scores an upload with the provider the settings select. Settings sent
    /// with the request win over the stored ones; Sightengine credentials
    /// fall back to the configuration.
    pub async fn analyze(&self, upload: Upload, settings: Option<AppSettings>) -> Result<AnalysisResult> {
        self.policy().validate(&upload)?;
        let settings = settings.unwrap_or_else(|| self.settings.load());

        match settings.api_provider {
            ApiProvider::Sightengine => {
                let credentials = settings
                    .sightengine_credentials()
                    .or_else(|| self.config.sightengine.credentials());

                match credentials {
                    Some(credentials) => {
                        let detector = self.sightengine(credentials);
                        match detector.detect(&upload).await {
                            Ok(result) => {
                                log::info!("{} scored by {}", upload.file_name, detector.name());
                                return Ok(result);
                            }
                            Err(err) => log::warn!(
                                "Sightengine failed for {}, using heuristic: {}",
                                upload.file_name,
                                err
                            ),
                        }
                    }
                    None => log::info!("no Sightengine credentials, using heuristic"),
                }
            }
            ApiProvider::Huggingface | ApiProvider::Hiveai => {
                log::info!("{:?} is not wired up, using heuristic", settings.api_provider);
            }
            ApiProvider::Mock => {}
        }

        self.heuristic.detect(&upload).await
    }

    pub async fn metadata(&self, upload: Upload) -> Result<MetadataResult> {
        self.policy().validate(&upload)?;
        blocking(move || Ok(ExifExtractor::extract(&upload.bytes))).await
    }

    pub async fn hashes(&self, upload: Upload) -> Result<ImageHashes> {
        self.policy().validate(&upload)?;
        let config = self.config.analysis.clone();
        blocking(move || Ok(InsightAnalyzer::new(upload).with_config(config).hashes())).await
    }

    pub async fn statistics(&self, upload: Upload) -> Result<StatisticsReport> {
        self.policy().validate(&upload)?;
        let config = self.config.analysis.clone();
        blocking(move || {
            let analyzer = InsightAnalyzer::new(upload).with_config(config);
            Ok(StatisticsReport {
                stats: analyzer.statistics()?,
                quality: analyzer.quality()?,
            })
        })
        .await
    }

    pub async fn compare(&self, first: Upload, second: Upload) -> Result<ComparisonReport> {
        self.policy().validate(&first)?;
        self.policy().validate(&second)?;
        let config = self.config.analysis.clone();

        blocking(move || {
            let describe = |upload: Upload| {
                let analyzer = InsightAnalyzer::new(upload).with_config(config.clone());
                ComparedImage {
                    file_name: analyzer.upload().file_name.clone(),
                    file_size: analyzer.upload().size(),
                    hashes: analyzer.hashes(),
                    stats: analyzer.statistics().ok(),
                }
            };
            let (first, second) = rayon::join(|| describe(first), || describe(second));
            let comparison = HashService::compare(&first.hashes, &second.hashes)?;

            Ok(ComparisonReport {
                first,
                second,
                comparison,
            })
        })
        .await
    }

    /// Heuristic analysis plus metadata for every file. The batch is
    /// validated as a whole; afterwards each file succeeds or fails alone.
    pub async fn batch(&self, uploads: Vec<Upload>) -> Result<BatchResponse> {
        self.policy().validate_batch(&uploads)?;

        let jobs: Vec<_> = uploads
            .into_iter()
            .map(|upload| (upload, self.heuristic.next_rng()))
            .collect();
        let config = self.config.analysis.clone();

        let results = blocking(move || {
            Ok(jobs
                .into_par_iter()
                .map(|(upload, mut rng)| batch_item(upload, &config, &mut rng))
                .collect::<Vec<_>>())
        })
        .await?;

        let successful = results.iter().filter(|r| r.success).count();
        log::info!("batch of {} processed, {} succeeded", results.len(), successful);

        Ok(BatchResponse {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        })
    }

    pub async fn report(&self, request: ReportRequest) -> Result<Attachment> {
        request.required()?;
        let now = Utc::now();

        let body = blocking(move || {
            let (analysis, metadata) = request.required()?;
            PdfReportGenerator::generate(&ReportContent {
                analysis,
                metadata,
                hashes: request.hashes.as_ref(),
                file_name: request.file_name.as_deref(),
                generated_at: now,
            })
        })
        .await?;

        Ok(Attachment {
            file_name: format!("ai-insight-report-{}.pdf", now.timestamp_millis()),
            content_type: "application/pdf",
            body,
        })
    }

    pub fn export(&self, request: &ReportRequest, format: ExportFormat) -> Result<Attachment> {
        let (analysis, metadata) = request.required()?;
        let now = Utc::now();

        let body = match format {
            ExportFormat::Json => report::export_json(analysis, metadata, request.hashes.as_ref(), now)?,
            ExportFormat::Csv => report::export_csv(analysis, metadata, now)?,
        };

        Ok(Attachment {
            file_name: format!("ai-insight-analysis-{}.{}", now.timestamp_millis(), format.extension()),
            content_type: format.content_type(),
            body: body.into_bytes(),
        })
    }

    pub fn export_history(&self, format: ExportFormat) -> Result<Attachment> {
        let body = match format {
            ExportFormat::Json => self.history.export_json()?,
            ExportFormat::Csv => report::export_history_csv(&self.history.list())?,
        };

        Ok(Attachment {
            file_name: format!(
                "ai-insight-history-{}.{}",
                Utc::now().timestamp_millis(),
                format.extension()
            ),
            content_type: format.content_type(),
            body: body.into_bytes(),
        })
    }

    /// Shrinks and re-encodes an upload per the stored size and quality
    /// preferences.
    pub async fn optimize(&self, upload: Upload) -> Result<Vec<u8>> {
        self.policy().validate(&upload)?;
        let settings = self.settings.load();
        let config = self.config.analysis.clone();

        blocking(move || {
            InsightAnalyzer::new(upload)
                .with_config(config)
                .optimize(settings.max_image_size, settings.default_quality)
        })
        .await
    }

    pub async fn chart(&self, analysis: AnalysisResult) -> Result<Vec<u8>> {
        blocking(move || ChartRenderer::new().category_chart_png(&analysis)).await
    }
}

fn batch_item(upload: Upload, config: &AnalysisConfig, rng: &mut StdRng) -> BatchItem {
    let file_name = upload.file_name.clone();
    let file_size = upload.size();

    if upload.is_empty() {
        return BatchItem {
            file_name,
            file_size,
            success: false,
            analysis: None,
            metadata: None,
            error: Some("File is empty".into()),
        };
    }

    let analyzer = InsightAnalyzer::new(upload).with_config(config.clone());
    BatchItem {
        file_name,
        file_size,
        success: true,
        analysis: Some(analyzer.analyze(rng)),
        metadata: Some(analyzer.extract_metadata()),
        error: None,
    }
}
