use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::error::CacheError;
use super::store::{Blob, BlobStore, KvStore, ObjectMeta};

const MEDIA_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS blobs (
        id           TEXT PRIMARY KEY,
        content_type TEXT NOT NULL,
        data         BLOB NOT NULL,
        created_at   TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS kv (
        key        TEXT PRIMARY KEY,
        value      BLOB NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
";

/// SQLite-backed storage serving both contracts: `blobs` holds whole
/// objects, `kv` holds small values for the chunked layout.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    pub fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(MEDIA_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub(crate) fn remove_key(&self, key: &str) -> Result<bool, CacheError> {
        let n = self.lock()?.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(n > 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Storage("sqlite connection poisoned".into()))
    }
}

#[async_trait]
impl BlobStore for SqliteStore {
    async fn head(&self, id: &str) -> Result<Option<ObjectMeta>, CacheError> {
        let meta = self
            .lock()?
            .query_row(
                "SELECT content_type, length(data), created_at FROM blobs WHERE id = ?1",
                [id],
                |row| {
                    let size: i64 = row.get(1)?;
                    let created_at: String = row.get(2)?;
                    Ok(ObjectMeta {
                        content_type: row.get(0)?,
                        size: size as usize,
                        stored_at: parse_sqlite_time(&created_at),
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }

    async fn put(&self, id: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), CacheError> {
        self.lock()?.execute(
            "INSERT OR REPLACE INTO blobs (id, content_type, data) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, content_type, bytes],
        )?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Blob>, CacheError> {
        let blob = self
            .lock()?
            .query_row(
                "SELECT data, content_type FROM blobs WHERE id = ?1",
                [id],
                |row| {
                    Ok(Blob {
                        bytes: row.get(0)?,
                        content_type: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(blob)
    }
}

// `datetime('now')` yields UTC as "YYYY-MM-DD HH:MM:SS".
fn parse_sqlite_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|t| t.and_utc())
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let value = self
            .lock()?
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.lock()?.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::store::ChunkedStore;

    #[tokio::test]
    async fn blob_table_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(BlobStore::head(&store, "ns/a").await.unwrap(), None);

        BlobStore::put(&store, "ns/a", vec![1, 2, 3], "image/png").await.unwrap();
        let meta = BlobStore::head(&store, "ns/a").await.unwrap().unwrap();
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.size, 3);
        assert!(meta.stored_at.is_some());
        let blob = BlobStore::get(&store, "ns/a").await.unwrap().unwrap();
        assert_eq!(blob.bytes, vec![1, 2, 3]);
        assert_eq!(blob.content_type, "image/png");

        // idempotent overwrite
        BlobStore::put(&store, "ns/a", vec![9], "image/webp").await.unwrap();
        assert_eq!(BlobStore::get(&store, "ns/a").await.unwrap().unwrap().bytes, vec![9]);
    }

    #[test]
    fn sqlite_timestamps_parse_as_utc() {
        let t = parse_sqlite_time("2024-03-01 12:30:05").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-03-01T12:30:05+00:00");
        assert_eq!(parse_sqlite_time("yesterday"), None);
    }

    #[tokio::test]
    async fn chunked_over_sqlite_kv() {
        let chunked = ChunkedStore::new(SqliteStore::open_in_memory().unwrap(), 1000);
        let data: Vec<u8> = (0..4321u32).map(|i| (i % 256) as u8).collect();
        chunked.put("ns/big", data.clone(), "image/jpeg").await.unwrap();
        assert_eq!(chunked.get("ns/big").await.unwrap().unwrap().bytes, data);

        assert!(chunked.kv().remove_key("ns/big:part:3").unwrap());
        let err = chunked.get("ns/big").await.unwrap_err();
        assert_eq!(err.code(), "missing_chunk");
    }
}
