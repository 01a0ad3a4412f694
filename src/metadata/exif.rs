use std::{collections::BTreeMap, io::Cursor};

use chrono::NaiveDateTime;
use exif::{Exif, Field, In, Tag, Value};

use crate::MetadataResult;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
const EDITING_SOFTWARE: [&str; 5] = ["photoshop", "paint", "gimp", "lightroom", "affinity"];

pub struct ExifExtractor;

impl ExifExtractor {
    /// Reads EXIF from an in-memory image container. A file without EXIF is
    /// not an error; it yields an empty record carrying that observation.
    pub fn extract(bytes: &[u8]) -> MetadataResult {
        let mut reader = Cursor::new(bytes);

        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif_data) => Self::parse_exif(&exif_data),
            Err(err) => {
                log::debug!("no EXIF data: {}", err);
                MetadataResult {
                    suspicious_indicators: vec!["No EXIF data found".into()],
                    ..MetadataResult::default()
                }
            }
        }
    }

    fn parse_exif(exif: &Exif) -> MetadataResult {
        let all_tags = exif
            .fields()
            .map(|f| (f.tag.to_string(), f.display_value().with_unit(exif).to_string()))
            .collect::<BTreeMap<_, _>>();

        let date_time_original = ascii(exif, Tag::DateTimeOriginal);
        let date_time_digitized = ascii(exif, Tag::DateTimeDigitized);
        let software = ascii(exif, Tag::Software);

        let mut result = MetadataResult {
            make: ascii(exif, Tag::Make),
            model: ascii(exif, Tag::Model),
            date: date_time_original.as_deref().and_then(to_iso8601),
            gps: Self::extract_gps(exif).map(|(lat, lon)| format!("{:.6}, {:.6}", lat, lon)),
            width: uint(exif, Tag::PixelXDimension).or_else(|| uint(exif, Tag::ImageWidth)),
            height: uint(exif, Tag::PixelYDimension).or_else(|| uint(exif, Tag::ImageLength)),
            orientation: uint(exif, Tag::Orientation),
            software: software.clone(),
            artist: ascii(exif, Tag::Artist),
            copyright: ascii(exif, Tag::Copyright),
            exif_version: field(exif, Tag::ExifVersion).map(|f| f.display_value().to_string()),
            iso: uint(exif, Tag::PhotographicSensitivity),
            f_number: rational(exif, Tag::FNumber),
            exposure_time: rational(exif, Tag::ExposureTime),
            focal_length: rational(exif, Tag::FocalLength),
            all_tags,
            suspicious_indicators: Vec::new(),
        };

        if let Some(ref sw) = software {
            let sw_lower = sw.to_lowercase();
            if EDITING_SOFTWARE.iter().any(|s| sw_lower.contains(s)) {
                result.suspicious_indicators.push(format!("Edited with: {}", sw));
            }
        }

        if date_time_original.is_none() && ascii(exif, Tag::DateTime).is_some() {
            result
                .suspicious_indicators
                .push("Original datetime missing (may be stripped)".into());
        }

        if let (Some(orig), Some(digi)) = (&date_time_original, &date_time_digitized) {
            if orig != digi {
                result
                    .suspicious_indicators
                    .push("Inconsistent date time values".into());
            }
        }

        result
    }

    fn extract_gps(exif: &Exif) -> Option<(f64, f64)> {
        let lat = dms_to_degrees(&field(exif, Tag::GPSLatitude)?.value)?;
        let lon = dms_to_degrees(&field(exif, Tag::GPSLongitude)?.value)?;

        let lat_sign = match ascii(exif, Tag::GPSLatitudeRef).as_deref() {
            Some(r) if r.starts_with('S') => -1.0,
            _ => 1.0,
        };
        let lon_sign = match ascii(exif, Tag::GPSLongitudeRef).as_deref() {
            Some(r) if r.starts_with('W') => -1.0,
            _ => 1.0,
        };

        Some((lat * lat_sign, lon * lon_sign))
    }
}

fn field(exif: &Exif, tag: Tag) -> Option<&Field> {
    exif.get_field(tag, In::PRIMARY)
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    match &field(exif, tag)?.value {
        Value::Ascii(parts) => {
            let text = parts
                .iter()
                .map(|p| String::from_utf8_lossy(p).to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}

fn uint(exif: &Exif, tag: Tag) -> Option<u32> {
    field(exif, tag)?.value.get_uint(0)
}

fn rational(exif: &Exif, tag: Tag) -> Option<f64> {
    match &field(exif, tag)?.value {
        Value::Rational(v) => v.first().map(|r| r.to_f64()).filter(|f| f.is_finite()),
        Value::SRational(v) => v.first().map(|r| r.to_f64()).filter(|f| f.is_finite()),
        _ => None,
    }
}

fn dms_to_degrees(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(parts) if !parts.is_empty() => {
            let part = |i: usize| parts.get(i).map(|r| r.to_f64()).unwrap_or(0.0);
            let degrees = part(0) + part(1) / 60.0 + part(2) / 3600.0;
            degrees.is_finite().then_some(degrees)
        }
        _ => None,
    }
}

/// EXIF timestamps carry no zone; they are rendered as UTC.
pub fn to_iso8601(exif_datetime: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(exif_datetime.trim(), EXIF_DATETIME_FORMAT)
        .ok()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}
