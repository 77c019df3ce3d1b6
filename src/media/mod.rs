pub mod error;
pub mod fetch;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub use error::CacheError;
pub use fetch::{FetchedImage, HttpFetcher, ImageFetcher};
pub use sqlite::SqliteStore;
pub use store::{Blob, BlobStore, ChunkedStore, KvStore, Manifest, ObjectMeta, DEFAULT_CHUNK_SIZE};

use crate::normalize::normalize_url;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prefix of returned cache URLs, without trailing slash.
    pub public_base_url: String,
    pub max_bytes: usize,
    /// Parallel downloads in `resolve_all`.
    pub concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            public_base_url: "/media".into(),
            max_bytes: 20 * 1024 * 1024,
            concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub namespace: String,
    pub source_url: String,
    pub content_id: String,
    pub content_type: Option<String>,
    pub cache_url: String,
    pub cached_at: Option<DateTime<Utc>>,
    /// False when the object was already stored and nothing was fetched.
    pub fresh: bool,
}

/// Outcome of one URL in a batch. Failures keep a usable `url`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedImage {
    pub source: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<CacheEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Content-addressed image cache: one stored object per normalized URL
/// and namespace.
pub struct MediaCache {
    store: Arc<dyn BlobStore>,
    fetcher: Arc<dyn ImageFetcher>,
    config: CacheConfig,
}

impl MediaCache {
    pub fn new(store: Arc<dyn BlobStore>, fetcher: Arc<dyn ImageFetcher>, config: CacheConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    pub fn content_id(normalized_url: &str) -> String {
        hex::encode(Sha256::digest(normalized_url.as_bytes()))
    }

    pub fn cache_url(&self, namespace: &str, content_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            namespace,
            content_id
        )
    }

    pub async fn cache_image(&self, url: &str, namespace: &str) -> Result<CacheEntry, CacheError> {
        check_namespace(namespace)?;
        let normalized = normalize_url(url).ok_or_else(|| CacheError::InvalidUrl(url.to_string()))?;
        let content_id = Self::content_id(&normalized);
        let object_id = format!("{}/{}", namespace, content_id);
        let cache_url = self.cache_url(namespace, &content_id);

        if let Some(meta) = self.store.head(&object_id).await? {
            debug!(%object_id, "cache hit");
            return Ok(CacheEntry {
                namespace: namespace.to_string(),
                source_url: normalized,
                content_id,
                content_type: Some(meta.content_type),
                cache_url,
                cached_at: meta.stored_at,
                fresh: false,
            });
        }

        let fetched = self.fetcher.fetch(&normalized).await?;
        if !(200..300).contains(&fetched.status) {
            return Err(CacheError::DownloadFailed {
                url: normalized,
                reason: format!("status {}", fetched.status),
            });
        }

        let content_type = fetched
            .content_type
            .as_deref()
            .map(mime_essence)
            .unwrap_or_default();
        if !content_type.starts_with("image/") {
            return Err(CacheError::NotImage {
                url: normalized,
                content_type,
            });
        }

        let size = fetched.bytes.len();
        if size > self.config.max_bytes {
            return Err(CacheError::TooLarge {
                size,
                limit: self.config.max_bytes,
            });
        }

        self.store.put(&object_id, fetched.bytes, &content_type).await?;
        info!(%object_id, size, %content_type, "cached image");

        Ok(CacheEntry {
            namespace: namespace.to_string(),
            source_url: normalized,
            content_id,
            content_type: Some(content_type),
            cache_url,
            cached_at: Some(Utc::now()),
            fresh: true,
        })
    }

    /// Like `cache_image`, but failures degrade to the normalized URL
    /// (or the input when it does not normalize).
    pub async fn resolve(&self, url: &str, namespace: &str) -> ResolvedImage {
        match self.cache_image(url, namespace).await {
            Ok(entry) => ResolvedImage {
                source: url.to_string(),
                url: entry.cache_url.clone(),
                entry: Some(entry),
                error: None,
            },
            Err(e) => {
                warn!(url, error = %e, "image not cached");
                degraded(url, &e)
            }
        }
    }

    /// Resolve every URL independently with at most `concurrency` downloads
    /// in flight. Output order matches input order.
    pub async fn resolve_all(self: &Arc<Self>, urls: &[String], namespace: &str) -> Vec<ResolvedImage> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(urls.len());

        for url in urls {
            let cache = Arc::clone(self);
            let sem = Arc::clone(&semaphore);
            let url = url.clone();
            let namespace = namespace.to_string();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await;
                cache.resolve(&url, &namespace).await
            }));
        }

        let mut out = Vec::with_capacity(handles.len());
        for (handle, url) in handles.into_iter().zip(urls) {
            match handle.await {
                Ok(resolved) => out.push(resolved),
                Err(e) => out.push(degraded(url, &CacheError::Storage(format!("task failed: {}", e)))),
            }
        }
        out
    }

    /// Stored bytes for a previously returned cache URL.
    pub async fn load(&self, namespace: &str, content_id: &str) -> Result<Option<Blob>, CacheError> {
        check_namespace(namespace)?;
        if content_id.len() != 64 || !content_id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(None);
        }
        self.store.get(&format!("{}/{}", namespace, content_id)).await
    }
}

// Namespaces are one path segment and must not contain the chunk key separator.
fn check_namespace(namespace: &str) -> Result<(), CacheError> {
    let ok = !namespace.is_empty()
        && !namespace.starts_with('.')
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(CacheError::InvalidNamespace(namespace.to_string()))
    }
}

fn degraded(url: &str, err: &CacheError) -> ResolvedImage {
    ResolvedImage {
        source: url.to_string(),
        url: normalize_url(url).unwrap_or_else(|| url.to_string()),
        entry: None,
        error: Some(err.code().to_string()),
    }
}

// "image/JPEG; charset=binary" -> "image/jpeg"
fn mime_essence(raw: &str) -> String {
    raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}
