use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    #[error("invalid url: {0:?}")]
    InvalidUrl(String),
    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),
    #[error("download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },
    #[error("not an image: {url} ({content_type})")]
    NotImage { url: String, content_type: String },
    #[error("payload too large: {size} bytes exceeds {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("object {id} is missing chunk {part}")]
    MissingChunk { id: String, part: usize },
    #[error("storage error: {0}")]
    Storage(String),
}

impl CacheError {
    /// Stable code reported per item in batch results.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::InvalidNamespace(_) => "invalid_namespace",
            Self::DownloadFailed { .. } => "download_failed",
            Self::NotImage { .. } => "not_image",
            Self::TooLarge { .. } => "too_large",
            Self::MissingChunk { .. } => "missing_chunk",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(format!("manifest: {}", e))
    }
}
