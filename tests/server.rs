use std::io::Cursor;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use tower::ServiceExt;

use image_insight::{config::Config, hash::HashService, server::router, service::InsightService};

const BOUNDARY: &str = "insight-test-boundary";

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x * 9) as u8, (y * 4) as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

enum Part<'a> {
    File {
        field: &'a str,
        name: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    },
    Text {
        field: &'a str,
        value: &'a str,
    },
}

fn multipart(parts: Vec<Part<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                field,
                name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        field, name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
            }
            Part::Text { field, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", field, value)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, parts: Vec<Part<'_>>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart(parts)))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn app(dir: &tempfile::TempDir) -> Router {
    let mut config = Config::default();
    config.storage.history_path = dir.path().join("history.json");
    config.storage.settings_path = dir.path().join("settings.json");
    config.analysis.seed = Some(42);
    config.sightengine.endpoint = "http://127.0.0.1:9/1.0/check.json".into();
    config.sightengine.timeout_secs = 2;
    router(InsightService::shared(config))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn png_part(field: &'static str, name: &'static str, w: u32) -> Part<'static> {
    Part::File {
        field,
        name,
        content_type: "image/png",
        bytes: png_bytes(w, w),
    }
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send_json(&app(&dir), empty_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_analyze_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(
        "/api/analyze",
        vec![Part::Text {
            field: "settings",
            value: "{}",
        }],
    );
    let (status, body) = send_json(&app(&dir), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_analyze_rejects_unsupported_type() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(
        "/api/analyze",
        vec![Part::File {
            field: "file",
            name: "notes.txt",
            content_type: "text/plain",
            bytes: b"hello".to_vec(),
        }],
    );
    let (status, body) = send_json(&app(&dir), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid file type. Allowed: JPEG, PNG, WEBP, HEIC");
}

#[tokio::test]
async fn test_analyze_heuristic_result_shape() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request("/api/analyze", vec![png_part("file", "ai-render.png", 64)]);
    let (status, body) = send_json(&app(&dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["overall"].as_u64().unwrap() >= 85);
    assert_eq!(body["source"], "heuristic");
    assert_eq!(body["technicalDetails"]["imageDimensions"]["width"], 64);
    assert!(body["diffusion"]["Stable Diffusion"].is_number());
}

#[tokio::test]
async fn test_sightengine_failure_falls_back_to_heuristic() {
    let dir = tempfile::tempdir().unwrap();
    let settings = r#"{"apiProvider":"sightengine","sightengineApiUser":"u","sightengineApiSecret":"s"}"#;
    let request = multipart_request(
        "/api/analyze",
        vec![
            png_part("file", "photo.png", 32),
            Part::Text {
                field: "settings",
                value: settings,
            },
        ],
    );
    let (status, body) = send_json(&app(&dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "heuristic");
}

#[tokio::test]
async fn test_hash_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = png_bytes(48, 48);
    let request = multipart_request(
        "/api/hash",
        vec![Part::File {
            field: "file",
            name: "a.png",
            content_type: "image/png",
            bytes: bytes.clone(),
        }],
    );
    let (status, body) = send_json(&app(&dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["md5"], HashService::md5(&bytes));
    assert_eq!(body["sha256"], HashService::sha256(&bytes));
    assert_eq!(body["perceptual"].as_str().unwrap().len(), 16);
}

#[tokio::test]
async fn test_metadata_endpoint_flags_missing_exif() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request("/api/metadata", vec![png_part("file", "plain.png", 16)]);
    let (status, body) = send_json(&app(&dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["suspiciousIndicators"][0], "No EXIF data found");
}

#[tokio::test]
async fn test_batch_limit() {
    let dir = tempfile::tempdir().unwrap();
    let parts = (0..11).map(|_| png_part("files", "x.png", 8)).collect();
    let (status, body) = send_json(&app(&dir), multipart_request("/api/batch", parts)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Maximum 10 files allowed per batch");
}

#[tokio::test]
async fn test_batch_success() {
    let dir = tempfile::tempdir().unwrap();
    let parts = vec![png_part("files", "one.png", 16), png_part("files", "two.png", 24)];
    let (status, body) = send_json(&app(&dir), multipart_request("/api/batch", parts)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["successful"], 2);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["results"][1]["fileName"], "two.png");
    assert!(body["results"][0]["analysis"]["overall"].is_number());
}

#[tokio::test]
async fn test_statistics_and_compare() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let request = multipart_request("/api/statistics", vec![png_part("file", "s.png", 40)]);
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["width"], 40);
    assert_eq!(body["stats"]["histogram"]["r"].as_array().unwrap().len(), 256);
    assert!(body["quality"]["qualityScore"].is_number());

    let request = multipart_request(
        "/api/compare",
        vec![png_part("first", "a.png", 40), png_part("second", "b.png", 40)],
    );
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["comparison"]["identical"], true);
    assert_eq!(body["comparison"]["hammingDistance"], 0);

    let request = multipart_request("/api/compare", vec![png_part("first", "a.png", 40)]);
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_report_requires_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let request = json_request(
        "POST",
        "/api/report",
        json!({ "analysisResult": { "overall": 10, "categories": {} } }),
    );
    let (status, body) = send_json(&app(&dir), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("analysisResult and metadata"));
}

#[tokio::test]
async fn test_report_download() {
    let dir = tempfile::tempdir().unwrap();
    let request = json_request(
        "POST",
        "/api/report",
        json!({
            "analysisResult": { "overall": 91, "categories": { "genai": 91 } },
            "metadata": { "make": "Canon" },
            "fileName": "render.png"
        }),
    );
    let (status, headers, body) = send(&app(&dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"ai-insight-report-"));
    assert!(disposition.ends_with(".pdf\""));
    assert!(body.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_export_csv() {
    let dir = tempfile::tempdir().unwrap();
    let request = json_request(
        "POST",
        "/api/export?format=csv",
        json!({
            "analysisResult": { "overall": 33, "categories": { "genai": 20, "faceManipulation": 5 } },
            "metadata": { "width": 10, "height": 20 }
        }),
    );
    let (status, headers, body) = send(&app(&dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    let text = String::from_utf8(body).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("Overall AI Likelihood,GenAI Score"));
    assert!(lines.next().unwrap().starts_with("33,20,5,,,,,10x20,"));
}

#[tokio::test]
async fn test_chart_png() {
    let dir = tempfile::tempdir().unwrap();
    let request = json_request("POST", "/api/chart", json!({ "overall": 50, "categories": {} }));
    let (status, headers, body) = send(&app(&dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert!(body.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[tokio::test]
async fn test_optimize_returns_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request("/api/optimize", vec![png_part("file", "big.png", 64)]);
    let (status, headers, body) = send(&app(&dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    assert!(body.starts_with(&[0xFF, 0xD8]));
}

#[tokio::test]
async fn test_history_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let entry = json!({
        "fileName": "beach.jpg",
        "fileSize": 1024,
        "analysisResult": { "overall": 12, "categories": {} },
        "metadata": {},
        "hashes": { "md5": "abc", "sha256": "def" }
    });
    let (status, body) = send_json(&app, json_request("POST", "/api/history", entry)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("analysis-"));

    let (status, body) = send_json(&app, empty_request("GET", &format!("/api/history/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fileName"], "beach.jpg");

    let notes = json_request("PUT", &format!("/api/history/{}/notes", id), json!({ "notes": "ok" }));
    let (status, _) = send_json(&app, notes).await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, body) = send(&app, empty_request("GET", "/api/history/export?format=csv")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("ai-insight-history-"));
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("beach.jpg"));
    assert!(text.trim_end().ends_with("abc,def,ok"));

    let (status, body) = send_json(&app, empty_request("GET", "/api/history/analysis-0-missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = send_json(&app, empty_request("DELETE", &format!("/api/history/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&app, empty_request("DELETE", &format!("/api/history/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send_json(&app, empty_request("GET", "/api/history")).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_settings_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (status, body) = send_json(&app, json_request("PUT", "/api/settings", json!({ "theme": "dark" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["maxImageSize"], 2048);

    let (_, body) = send_json(&app, empty_request("GET", "/api/settings")).await;
    assert_eq!(body["theme"], "dark");
    assert_eq!(body["apiProvider"], "mock");

    let (status, body) = send_json(&app, empty_request("DELETE", "/api/settings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["theme"], "light");

    let (status, _) = send_json(&app, json_request("PUT", "/api/settings", json!({ "theme": "neon" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
