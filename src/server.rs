//! HTTP API over [`InsightService`].
//!
//! Uploads arrive as `multipart/form-data`; everything else is JSON. Errors
//! are rendered as `{ "error": ..., "details"?: ... }`.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    AnalysisResult, ImageHashes, MetadataResult,
    config::Config,
    error::InsightError,
    history::{HistoryEntry, NewHistoryEntry},
    report::ExportFormat,
    service::{Attachment, BatchResponse, ComparisonReport, InsightService, ReportRequest, StatisticsReport},
    settings::AppSettings,
    upload::{Upload, require_file},
};

type AppState = Arc<InsightService>;

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let service = InsightService::shared(config);
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    log::info!("listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(service: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = service.policy().request_body_limit();

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/analyze", post(handle_analyze))
        .route("/api/metadata", post(handle_metadata))
        .route("/api/hash", post(handle_hash))
        .route("/api/batch", post(handle_batch))
        .route("/api/report", post(handle_report))
        .route("/api/export", post(handle_export))
        .route("/api/statistics", post(handle_statistics))
        .route("/api/compare", post(handle_compare))
        .route("/api/optimize", post(handle_optimize))
        .route("/api/chart", post(handle_chart))
        .route(
            "/api/history",
            get(handle_history_list)
                .post(handle_history_save)
                .delete(handle_history_clear),
        )
        .route("/api/history/export", get(handle_history_export))
        .route(
            "/api/history/{id}",
            get(handle_history_get).delete(handle_history_delete),
        )
        .route("/api/history/{id}/notes", put(handle_history_notes))
        .route(
            "/api/settings",
            get(handle_settings_get)
                .put(handle_settings_put)
                .delete(handle_settings_reset),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(service)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        error: message.into(),
        details: None,
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        error: message.into(),
        details: None,
    }
}

/// Maps a service error onto a response. Client mistakes keep their own
/// message; server faults report `context` with the cause as details.
fn fail(context: &'static str) -> impl Fn(InsightError) -> AppError {
    move |err| match &err {
        e if e.is_client_error() => bad_request(e.to_string()),
        InsightError::NotFound(_) => not_found(err.to_string()),
        _ => {
            log::error!("{}: {}", context, err);
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: context.to_string(),
                details: Some(err.to_string()),
            }
        }
    }
}

fn missing_entry(id: String) -> AppError {
    not_found(InsightError::NotFound(id).to_string())
}

fn attachment(file: Attachment) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.body,
    )
        .into_response()
}

// ============ Multipart ============

/// Every part of a multipart body, file parts keyed by field name in
/// arrival order.
#[derive(Default)]
struct FormParts {
    files: Vec<(String, Upload)>,
    text: BTreeMap<String, String>,
}

impl FormParts {
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, AppError> {
        let mut multipart = multipart.map_err(|e| bad_request(e.body_text()))?;
        let mut parts = FormParts::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_request(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;

            match file_name {
                Some(file_name) => {
                    let upload = Upload::new(file_name, content_type.as_deref(), bytes.to_vec());
                    parts.files.push((name, upload));
                }
                None => {
                    parts
                        .text
                        .insert(name, String::from_utf8_lossy(&bytes).to_string());
                }
            }
        }

        Ok(parts)
    }

    fn take_file(&mut self, field: &str) -> Option<Upload> {
        let index = self.files.iter().position(|(name, _)| name == field)?;
        Some(self.files.remove(index).1)
    }

    fn take_all(&mut self, field: &str) -> Vec<Upload> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(name, _)| name == field);
        self.files = rest;
        matching.into_iter().map(|(_, upload)| upload).collect()
    }

    fn require(&mut self, field: &str) -> Result<Upload, AppError> {
        require_file(self.take_file(field)).map_err(fail("Failed to read upload"))
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|e| bad_request(e.body_text()))
}

// ============ Health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Analysis ============

async fn handle_analyze(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    let mut parts = FormParts::read(multipart).await?;
    let upload = parts.require("file")?;

    let settings = parts.text.get("settings").and_then(|raw| {
        serde_json::from_str::<AppSettings>(raw)
            .map_err(|e| log::debug!("ignoring unparsable settings field: {}", e))
            .ok()
    });

    let result = service
        .analyze(upload, settings)
        .await
        .map_err(fail("Failed to analyze image"))?;
    Ok(Json(result))
}

async fn handle_metadata(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MetadataResult>, AppError> {
    let upload = FormParts::read(multipart).await?.require("file")?;
    let metadata = service
        .metadata(upload)
        .await
        .map_err(fail("Failed to extract metadata"))?;
    Ok(Json(metadata))
}

async fn handle_hash(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageHashes>, AppError> {
    let upload = FormParts::read(multipart).await?.require("file")?;
    let hashes = service
        .hashes(upload)
        .await
        .map_err(fail("Failed to calculate hashes"))?;
    Ok(Json(hashes))
}

async fn handle_batch(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchResponse>, AppError> {
    let uploads = FormParts::read(multipart).await?.take_all("files");
    let response = service
        .batch(uploads)
        .await
        .map_err(fail("Failed to process batch"))?;
    Ok(Json(response))
}

async fn handle_statistics(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<StatisticsReport>, AppError> {
    let upload = FormParts::read(multipart).await?.require("file")?;
    let report = service
        .statistics(upload)
        .await
        .map_err(fail("Failed to compute statistics"))?;
    Ok(Json(report))
}

async fn handle_compare(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ComparisonReport>, AppError> {
    let mut parts = FormParts::read(multipart).await?;
    let first = parts.require("first")?;
    let second = parts.require("second")?;

    let report = service
        .compare(first, second)
        .await
        .map_err(fail("Failed to compare images"))?;
    Ok(Json(report))
}

async fn handle_optimize(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let upload = FormParts::read(multipart).await?.require("file")?;
    let jpeg = service
        .optimize(upload)
        .await
        .map_err(fail("Failed to optimize image"))?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response())
}

async fn handle_chart(
    State(service): State<AppState>,
    body: Result<Json<AnalysisResult>, JsonRejection>,
) -> Result<Response, AppError> {
    let analysis = json_body(body)?;
    let png = service
        .chart(analysis)
        .await
        .map_err(fail("Failed to render chart"))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

// ============ Reports ============

#[derive(Deserialize)]
struct FormatQuery {
    #[serde(default)]
    format: ExportFormat,
}

async fn handle_report(
    State(service): State<AppState>,
    body: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(body)?;
    let pdf = service
        .report(request)
        .await
        .map_err(fail("Failed to generate report"))?;
    Ok(attachment(pdf))
}

async fn handle_export(
    State(service): State<AppState>,
    Query(query): Query<FormatQuery>,
    body: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(body)?;
    let file = service
        .export(&request, query.format)
        .map_err(fail("Failed to export analysis"))?;
    Ok(attachment(file))
}

// ============ History ============

#[derive(Serialize)]
struct SavedResponse {
    id: String,
}

#[derive(Deserialize)]
struct NotesBody {
    notes: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn handle_history_list(State(service): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(service.history().list())
}

async fn handle_history_save(
    State(service): State<AppState>,
    body: Result<Json<NewHistoryEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<SavedResponse>), AppError> {
    let entry = json_body(body)?;
    let id = service
        .history()
        .save(entry)
        .map_err(fail("Failed to save history entry"))?;
    Ok((StatusCode::CREATED, Json(SavedResponse { id })))
}

async fn handle_history_clear(
    State(service): State<AppState>,
) -> Result<Json<SuccessResponse>, AppError> {
    service
        .history()
        .clear()
        .map_err(fail("Failed to clear history"))?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn handle_history_get(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryEntry>, AppError> {
    service
        .history()
        .get(&id)
        .map(Json)
        .ok_or_else(|| missing_entry(id))
}

async fn handle_history_delete(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let removed = service
        .history()
        .delete(&id)
        .map_err(fail("Failed to delete history entry"))?;
    if !removed {
        return Err(missing_entry(id));
    }
    Ok(Json(SuccessResponse { success: true }))
}

async fn handle_history_notes(
    State(service): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<NotesBody>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let body = json_body(body)?;
    let updated = service
        .history()
        .update_notes(&id, &body.notes)
        .map_err(fail("Failed to update notes"))?;
    if !updated {
        return Err(missing_entry(id));
    }
    Ok(Json(SuccessResponse { success: true }))
}

async fn handle_history_export(
    State(service): State<AppState>,
    Query(query): Query<FormatQuery>,
) -> Result<Response, AppError> {
    let file = service
        .export_history(query.format)
        .map_err(fail("Failed to export history"))?;
    Ok(attachment(file))
}

// ============ Settings ============

async fn handle_settings_get(State(service): State<AppState>) -> Json<AppSettings> {
    Json(service.settings().load())
}

async fn handle_settings_put(
    State(service): State<AppState>,
    body: Result<Json<AppSettings>, JsonRejection>,
) -> Result<Json<AppSettings>, AppError> {
    let settings = json_body(body)?;
    service
        .settings()
        .save(&settings)
        .map_err(fail("Failed to save settings"))?;
    Ok(Json(settings))
}

async fn handle_settings_reset(
    State(service): State<AppState>,
) -> Result<Json<AppSettings>, AppError> {
    let defaults = service
        .settings()
        .reset()
        .map_err(fail("Failed to reset settings"))?;
    Ok(Json(defaults))
}
