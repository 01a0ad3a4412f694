use chrono::{DateTime, Utc};
use lopdf::Document;

use image_insight::{
    AnalysisResult, CategoryScores, ImageHashes, MetadataResult, ModelScores,
    report::{
        export_json,
        pdf::{PdfReportGenerator, ReportContent},
    },
};

fn at() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

fn analysis(diffusion_models: usize) -> AnalysisResult {
    let diffusion: ModelScores = (0..diffusion_models)
        .map(|i| (format!("Model {:02}", i), 1 + i as u32 % 90))
        .collect();

    AnalysisResult {
        overall: 72,
        categories: CategoryScores {
            genai: 72,
            face_manipulation: 18,
            inpainting: 4,
            ..CategoryScores::default()
        },
        diffusion,
        ..AnalysisResult::default()
    }
}

fn metadata() -> MetadataResult {
    MetadataResult {
        make: Some("Nikon".into()),
        model: Some("Z6".into()),
        date: Some("2023-01-15T10:30:00Z".into()),
        width: Some(6000),
        height: Some(4000),
        ..MetadataResult::default()
    }
}

fn render(analysis: &AnalysisResult, hashes: Option<&ImageHashes>) -> Vec<u8> {
    PdfReportGenerator::generate(&ReportContent {
        analysis,
        metadata: &metadata(),
        hashes,
        file_name: Some("portrait.jpg"),
        generated_at: at(),
    })
    .unwrap()
}

#[test]
fn test_short_report_fits_one_page() {
    let bytes = render(&analysis(3), None);
    let doc = Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[test]
fn test_long_model_list_spills_onto_more_pages() {
    let hashes = ImageHashes {
        md5: "0".repeat(32),
        sha256: "f".repeat(64),
        perceptual: Some("ffff0000ffff0000".into()),
    };
    let bytes = render(&analysis(80), Some(&hashes));
    let doc = Document::load_mem(&bytes).unwrap();
    assert!(doc.get_pages().len() >= 2);
}

#[test]
fn test_json_export_shape() {
    let json = export_json(&analysis(1), &metadata(), None, at()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["timestamp"], "2023-11-14T22:13:20.000Z");
    assert_eq!(value["analysis"]["overall"], 72);
    assert_eq!(value["analysis"]["categories"]["faceManipulation"], 18);
    assert_eq!(value["metadata"]["make"], "Nikon");
    assert!(value.get("hashes").is_none());
}
