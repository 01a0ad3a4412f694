pub mod pdf;
pub mod visualization;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AnalysisResult, ImageHashes, MetadataResult,
    error::{InsightError, Result},
    history::HistoryEntry,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

#[derive(Serialize)]
pub struct JsonExport<'a> {
    pub timestamp: String,
    pub analysis: &'a AnalysisResult,
    pub metadata: &'a MetadataResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashes: Option<&'a ImageHashes>,
}

pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn export_json(
    analysis: &AnalysisResult,
    metadata: &MetadataResult,
    hashes: Option<&ImageHashes>,
    at: DateTime<Utc>,
) -> Result<String> {
    let export = JsonExport {
        timestamp: iso_timestamp(at),
        analysis,
        metadata,
        hashes,
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

const ANALYSIS_HEADERS: [&str; 9] = [
    "Overall AI Likelihood",
    "GenAI Score",
    "Face Manipulation Score",
    "Camera Make",
    "Camera Model",
    "Date",
    "GPS",
    "Dimensions",
    "Timestamp",
];

const HISTORY_HEADERS: [&str; 14] = [
    "ID",
    "Timestamp",
    "File Name",
    "File Size (bytes)",
    "Overall AI Likelihood",
    "GenAI Score",
    "Face Manipulation Score",
    "Camera Make",
    "Camera Model",
    "Date",
    "GPS",
    "MD5 Hash",
    "SHA256 Hash",
    "Notes",
];

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| InsightError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| InsightError::Export(e.to_string()))
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Single-row CSV summary of one analysis.
pub fn export_csv(
    analysis: &AnalysisResult,
    metadata: &MetadataResult,
    at: DateTime<Utc>,
) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(ANALYSIS_HEADERS)?;
    writer.write_record([
        analysis.overall.to_string(),
        analysis.categories.genai.to_string(),
        analysis.categories.face_manipulation.to_string(),
        text(&metadata.make),
        text(&metadata.model),
        text(&metadata.date),
        text(&metadata.gps),
        metadata.dimensions().unwrap_or_default(),
        iso_timestamp(at),
    ])?;
    finish(writer)
}

pub fn export_history_csv(entries: &[HistoryEntry]) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(HISTORY_HEADERS)?;

    for entry in entries {
        let timestamp = DateTime::from_timestamp_millis(entry.timestamp)
            .map(iso_timestamp)
            .unwrap_or_default();
        let (md5, sha256) = entry
            .hashes
            .as_ref()
            .map(|h| (h.md5.clone(), h.sha256.clone()))
            .unwrap_or_default();

        writer.write_record([
            entry.id.clone(),
            timestamp,
            entry.file_name.clone(),
            entry.file_size.to_string(),
            entry.analysis_result.overall.to_string(),
            entry.analysis_result.categories.genai.to_string(),
            entry.analysis_result.categories.face_manipulation.to_string(),
            text(&entry.metadata.make),
            text(&entry.metadata.model),
            text(&entry.metadata.date),
            text(&entry.metadata.gps),
            md5,
            sha256,
            text(&entry.notes),
        ])?;
    }

    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CategoryScores;

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_123).unwrap()
    }

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            overall: 87,
            categories: CategoryScores {
                genai: 87,
                face_manipulation: 12,
                ..CategoryScores::default()
            },
            ..AnalysisResult::default()
        }
    }

    fn metadata() -> MetadataResult {
        MetadataResult {
            make: Some("Canon".into()),
            model: Some("EOS R5".into()),
            gps: Some("48.858233, 2.294500".into()),
            width: Some(4000),
            height: Some(3000),
            ..MetadataResult::default()
        }
    }

    #[test]
    fn test_json_export_shape() {
        let json = export_json(&analysis(), &metadata(), None, at()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["timestamp"], "2023-11-14T22:13:20.123Z");
        assert_eq!(value["analysis"]["overall"], 87);
        assert_eq!(value["analysis"]["categories"]["faceManipulation"], 12);
        assert_eq!(value["metadata"]["make"], "Canon");
        assert!(value.get("hashes").is_none());
    }

    #[test]
    fn test_analysis_csv() {
        let csv = export_csv(&analysis(), &metadata(), at()).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), ANALYSIS_HEADERS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "87");
        assert_eq!(&rows[0][3], "Canon");
        assert_eq!(&rows[0][5], "");
        assert_eq!(&rows[0][6], "48.858233, 2.294500");
        assert_eq!(&rows[0][7], "4000x3000");
    }

    #[test]
    fn test_dimensions_blank_without_both_sides() {
        let metadata = MetadataResult {
            width: Some(10),
            ..MetadataResult::default()
        };
        let csv = export_csv(&analysis(), &metadata, at()).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[7], "");
    }

    #[test]
    fn test_history_csv() {
        let entries = vec![HistoryEntry {
            id: "analysis-1-abcdefghi".into(),
            timestamp: 1_700_000_000_123,
            file_name: "beach, sunset.jpg".into(),
            file_size: 2048,
            preview: None,
            analysis_result: analysis(),
            metadata: metadata(),
            hashes: Some(ImageHashes {
                md5: "m".into(),
                sha256: "s".into(),
                perceptual: None,
            }),
            notes: Some("line one\nline two".into()),
        }];

        let csv = export_history_csv(&entries).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        assert_eq!(reader.headers().unwrap().len(), HISTORY_HEADERS.len());

        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[1], "2023-11-14T22:13:20.123Z");
        assert_eq!(&row[2], "beach, sunset.jpg");
        assert_eq!(&row[3], "2048");
        assert_eq!(&row[11], "m");
        assert_eq!(&row[13], "line one\nline two");
    }
}
