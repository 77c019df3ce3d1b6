use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::CacheError;

pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// What `head` knows about a stored object without reading its bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeta {
    pub content_type: String,
    pub size: usize,
    pub stored_at: Option<DateTime<Utc>>,
}

/// Storage that holds whole objects with content-type metadata.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn head(&self, id: &str) -> Result<Option<ObjectMeta>, CacheError>;
    async fn put(&self, id: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), CacheError>;
    async fn get(&self, id: &str) -> Result<Option<Blob>, CacheError>;
}

/// Storage that only takes small values under string keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;
}

/// Written under `{id}:meta` once every part is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub parts: usize,
    pub content_type: String,
    pub size: usize,
    #[serde(default)]
    pub stored_at: Option<DateTime<Utc>>,
}

/// `BlobStore` over a `KvStore`: payloads are split into `chunk_size` parts
/// under `{id}:part:{n}`, then the manifest is written last. A present
/// manifest therefore implies every part it names was written.
pub struct ChunkedStore<K> {
    kv: K,
    chunk_size: usize,
}

impl<K: KvStore> ChunkedStore<K> {
    pub fn new(kv: K, chunk_size: usize) -> Self {
        Self {
            kv,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn part_key(id: &str, n: usize) -> String {
        format!("{}:part:{}", id, n)
    }

    pub fn meta_key(id: &str) -> String {
        format!("{}:meta", id)
    }

    pub async fn manifest(&self, id: &str) -> Result<Option<Manifest>, CacheError> {
        match self.kv.get(&Self::meta_key(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<K: KvStore> BlobStore for ChunkedStore<K> {
    async fn head(&self, id: &str) -> Result<Option<ObjectMeta>, CacheError> {
        Ok(self.manifest(id).await?.map(|m| ObjectMeta {
            content_type: m.content_type,
            size: m.size,
            stored_at: m.stored_at,
        }))
    }

    async fn put(&self, id: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), CacheError> {
        let mut parts = 0;
        for (n, chunk) in bytes.chunks(self.chunk_size).enumerate() {
            self.kv.put(&Self::part_key(id, n), chunk.to_vec()).await?;
            parts = n + 1;
        }

        let manifest = Manifest {
            parts,
            content_type: content_type.to_string(),
            size: bytes.len(),
            stored_at: Some(Utc::now()),
        };
        self.kv.put(&Self::meta_key(id), serde_json::to_vec(&manifest)?).await?;
        debug!(id, parts, size = bytes.len(), "stored chunked object");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Blob>, CacheError> {
        let Some(manifest) = self.manifest(id).await? else {
            return Ok(None);
        };

        let mut bytes = Vec::with_capacity(manifest.size);
        for n in 0..manifest.parts {
            match self.kv.get(&Self::part_key(id, n)).await? {
                Some(part) => bytes.extend_from_slice(&part),
                None => {
                    return Err(CacheError::MissingChunk {
                        id: id.to_string(),
                        part: n,
                    })
                }
            }
        }

        // Truncated parts are as bad as absent ones.
        if bytes.len() != manifest.size {
            return Err(CacheError::MissingChunk {
                id: id.to_string(),
                part: manifest.parts.saturating_sub(1),
            });
        }

        Ok(Some(Blob {
            bytes,
            content_type: manifest.content_type,
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct MemoryKv {
        pub map: Mutex<HashMap<String, Vec<u8>>>,
        pub fail_on: Option<String>,
    }

    #[async_trait]
    impl KvStore for MemoryKv {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Ok(self.map.lock().unwrap().get(key).cloned())
        }

        async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
            if self.fail_on.as_deref() == Some(key) {
                return Err(CacheError::Storage(format!("refused {}", key)));
            }
            self.map.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[tokio::test]
    async fn round_trip_across_chunk_boundaries() {
        let store = ChunkedStore::new(MemoryKv::default(), 16);
        let data = payload(16 * 3 + 5);
        store.put("ns/abc", data.clone(), "image/jpeg").await.unwrap();

        let meta = store.head("ns/abc").await.unwrap().unwrap();
        assert_eq!(meta.content_type, "image/jpeg");
        assert_eq!(meta.size, data.len());
        assert!(meta.stored_at.is_some());
        let manifest = store.manifest("ns/abc").await.unwrap().unwrap();
        assert_eq!(manifest.parts, 4);
        assert_eq!(manifest.size, data.len());

        let blob = store.get("ns/abc").await.unwrap().unwrap();
        assert_eq!(blob.bytes, data);
        assert_eq!(blob.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn exact_multiple_and_empty_payloads() {
        let store = ChunkedStore::new(MemoryKv::default(), 8);
        store.put("a", payload(32), "image/png").await.unwrap();
        assert_eq!(store.manifest("a").await.unwrap().unwrap().parts, 4);
        assert_eq!(store.get("a").await.unwrap().unwrap().bytes, payload(32));

        store.put("empty", Vec::new(), "image/png").await.unwrap();
        assert_eq!(store.get("empty").await.unwrap().unwrap().bytes, Vec::<u8>::new());
    }

    #[tokio::test]
    async fn absent_object_is_not_an_error() {
        let store = ChunkedStore::new(MemoryKv::default(), 8);
        assert_eq!(store.head("nope").await.unwrap(), None);
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_part_is_reported() {
        let store = ChunkedStore::new(MemoryKv::default(), 4);
        store.put("x", payload(10), "image/gif").await.unwrap();
        store.kv().map.lock().unwrap().remove("x:part:1");

        let err = store.get("x").await.unwrap_err();
        assert_eq!(err, CacheError::MissingChunk { id: "x".into(), part: 1 });
        assert_eq!(err.code(), "missing_chunk");
    }

    #[tokio::test]
    async fn failed_part_write_leaves_no_manifest() {
        let kv = MemoryKv {
            fail_on: Some("y:part:2".into()),
            ..Default::default()
        };
        let store = ChunkedStore::new(kv, 4);
        assert!(store.put("y", payload(20), "image/png").await.is_err());
        assert_eq!(store.head("y").await.unwrap(), None);
        assert_eq!(store.get("y").await.unwrap(), None);
    }
}
