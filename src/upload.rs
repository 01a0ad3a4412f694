use std::path::Path;

use serde::Deserialize;

use crate::error::{InsightError, Result};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_BATCH_FILES: usize = 10;

const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

/// A file received from a client, held fully in memory.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Builds an upload, inferring the content type from the file name when
    /// the client sent none or a generic one.
    pub fn new(file_name: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = match content_type.map(str::trim) {
            Some(ct) if !ct.is_empty() && ct != GENERIC_CONTENT_TYPE => ct.to_ascii_lowercase(),
            _ => content_type_for(&file_name)
                .unwrap_or(GENERIC_CONTENT_TYPE)
                .to_string(),
        };

        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Ok(Self::new(file_name, None, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()?
        .to_string_lossy()
        .to_ascii_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "heic" | "heif" => Some("image/heic"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// Turns a possibly-missing multipart field into an upload, treating an
/// empty part the same as no part at all.
pub fn require_file(upload: Option<Upload>) -> Result<Upload> {
    match upload {
        Some(upload) if !upload.is_empty() => Ok(upload),
        _ => Err(InsightError::NoFile("No file provided".into())),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub allowed_types: Vec<String>,
    pub max_file_size: u64,
    pub max_batch_files: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_types: vec![
                "image/jpeg".into(),
                "image/png".into(),
                "image/webp".into(),
                "image/heic".into(),
            ],
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_batch_files: DEFAULT_MAX_BATCH_FILES,
        }
    }
}

impl UploadPolicy {
    pub fn validate(&self, upload: &Upload) -> Result<()> {
        if upload.is_empty() {
            return Err(InsightError::NoFile("No file provided".into()));
        }

        if !self.is_allowed(&upload.content_type) {
            return Err(InsightError::InvalidFileType(format!(
                "Invalid file type. Allowed: {}",
                self.allowed_list()
            )));
        }

        if upload.size() > self.max_file_size {
            return Err(InsightError::FileTooLarge(format!(
                "File size exceeds {} limit",
                self.size_label()
            )));
        }

        Ok(())
    }

    /// Validates every file of a batch up front; the first offending file
    /// rejects the whole batch.
    pub fn validate_batch(&self, uploads: &[Upload]) -> Result<()> {
        if uploads.is_empty() {
            return Err(InsightError::NoFile("No files provided".into()));
        }

        if uploads.len() > self.max_batch_files {
            return Err(InsightError::TooManyFiles(self.max_batch_files));
        }

        for upload in uploads {
            if !self.is_allowed(&upload.content_type) {
                return Err(InsightError::InvalidFileType(format!(
                    "Invalid file type: {}. Allowed: {}",
                    upload.file_name,
                    self.allowed_list()
                )));
            }
            if upload.size() > self.max_file_size {
                return Err(InsightError::FileTooLarge(format!(
                    "File too large: {}. Maximum {}",
                    upload.file_name,
                    self.size_label()
                )));
            }
        }

        Ok(())
    }

    /// Upper bound for a whole request body carrying a full batch.
    pub fn request_body_limit(&self) -> usize {
        let files = self.max_batch_files.max(1) as u64;
        (self.max_file_size * files + 1024 * 1024) as usize
    }

    fn is_allowed(&self, content_type: &str) -> bool {
        self.allowed_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }

    fn allowed_list(&self) -> String {
        self.allowed_types
            .iter()
            .map(|t| t.rsplit('/').next().unwrap_or(t).to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn size_label(&self) -> String {
        let mb = self.max_file_size as f64 / (1024.0 * 1024.0);
        if mb.fract() == 0.0 {
            format!("{}MB", mb as u64)
        } else {
            format!("{:.1}MB", mb)
        }
    }
}
