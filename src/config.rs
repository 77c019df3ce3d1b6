use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::media::{CacheConfig, DEFAULT_CHUNK_SIZE};

const ENV_PREFIX: &str = "LISTING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Whole objects in the `blobs` table.
    Blob,
    /// Fixed-size parts plus a manifest in the `kv` table.
    Chunked,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub public_base_url: String,
    pub chunk_size: usize,
    pub max_image_bytes: usize,
    pub download_timeout_secs: u64,
    pub concurrency: usize,
    pub backend: Backend,
}

impl Settings {
    /// Defaults overlaid with `LISTING_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .set_default("db_path", "data/listings.sqlite")?
            .set_default("public_base_url", "/media")?
            .set_default("chunk_size", DEFAULT_CHUNK_SIZE as i64)?
            .set_default("max_image_bytes", 20 * 1024 * 1024_i64)?
            .set_default("download_timeout_secs", 15_i64)?
            .set_default("concurrency", 8_i64)?
            .set_default("backend", "blob")?
            .add_source(env.try_parsing(true))
            .build()
            .context("building settings")?;
        settings
            .try_deserialize()
            .context("invalid LISTING_* settings")
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            public_base_url: self.public_base_url.clone(),
            max_bytes: self.max_image_bytes,
            concurrency: self.concurrency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn defaults_apply_without_env() {
        let s = Settings::from_env(env(&[])).unwrap();
        assert_eq!(s.db_path, "data/listings.sqlite");
        assert_eq!(s.public_base_url, "/media");
        assert_eq!(s.chunk_size, 4 * 1024 * 1024);
        assert_eq!(s.max_image_bytes, 20 * 1024 * 1024);
        assert_eq!(s.download_timeout_secs, 15);
        assert_eq!(s.concurrency, 8);
        assert_eq!(s.backend, Backend::Blob);
    }

    #[test]
    fn env_overrides_defaults() {
        let s = Settings::from_env(env(&[
            ("LISTING_DB_PATH", "/tmp/x.sqlite"),
            ("LISTING_CONCURRENCY", "3"),
            ("LISTING_BACKEND", "chunked"),
        ]))
        .unwrap();
        assert_eq!(s.db_path, "/tmp/x.sqlite");
        assert_eq!(s.concurrency, 3);
        assert_eq!(s.backend, Backend::Chunked);
        assert_eq!(s.cache_config().concurrency, 3);
    }

    #[test]
    fn unknown_backend_is_an_error() {
        assert!(Settings::from_env(env(&[("LISTING_BACKEND", "s3")])).is_err());
    }
}
