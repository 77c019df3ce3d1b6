use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use super::error::CacheError;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Raw response of an image download, before validation.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, CacheError>;
}

/// reqwest-backed fetcher with a per-request timeout. Non-image and failed
/// responses come back without a body; image bodies are read in chunks and
/// abandoned as soon as they pass `max_bytes`.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, CacheError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CacheError::Storage(format!("http client: {}", e)))?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, CacheError> {
        let failed = |e: reqwest::Error| CacheError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let mut response = self.client.get(url).send().await.map_err(failed)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Failed or non-image responses are judged on headers alone.
        let is_image = content_type
            .as_deref()
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("image/"));
        if !response.status().is_success() || !is_image {
            return Ok(FetchedImage {
                status,
                content_type,
                bytes: Vec::new(),
            });
        }

        let too_large = |size: usize| CacheError::TooLarge {
            size,
            limit: self.max_bytes,
        };
        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(too_large(len as usize));
            }
        }

        // Content-Length may be absent or wrong; cap what is actually read.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(failed)? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(too_large(bytes.len() + chunk.len()));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedImage {
            status,
            content_type,
            bytes,
        })
    }
}
