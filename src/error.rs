use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Image loading error: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Remote request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    NoFile(String),

    #[error("{0}")]
    InvalidFileType(String),

    #[error("{0}")]
    FileTooLarge(String),

    #[error("Maximum {0} files allowed per batch")]
    TooManyFiles(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("History entry not found: {0}")]
    NotFound(String),

    #[error("Detection provider error: {0}")]
    Provider(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Report generation failed: {0}")]
    Report(String),
}

impl InsightError {
    /// True for errors caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InsightError::NoFile(_)
                | InsightError::InvalidFileType(_)
                | InsightError::FileTooLarge(_)
                | InsightError::TooManyFiles(_)
                | InsightError::InvalidParameter(_)
        )
    }
}

impl From<csv::Error> for InsightError {
    fn from(err: csv::Error) -> Self {
        InsightError::Export(err.to_string())
    }
}

impl From<printpdf::Error> for InsightError {
    fn from(err: printpdf::Error) -> Self {
        InsightError::Report(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
