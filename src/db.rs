use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;

use crate::media::CacheEntry;
use crate::parser::ProductRecord;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("opening {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS products (
            source_url   TEXT PRIMARY KEY,
            name         TEXT,
            price        REAL,
            record       TEXT NOT NULL,
            blocked      BOOLEAN NOT NULL DEFAULT 0,
            extracted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_products_blocked ON products(blocked);

        CREATE TABLE IF NOT EXISTS cache_entries (
            namespace    TEXT NOT NULL,
            source_url   TEXT NOT NULL,
            content_id   TEXT NOT NULL,
            content_type TEXT,
            cache_url    TEXT NOT NULL,
            cached_at    TEXT NOT NULL,
            UNIQUE(namespace, content_id)
        );
        CREATE INDEX IF NOT EXISTS idx_cache_source ON cache_entries(source_url);
        ",
    )?;
    Ok(())
}

// ── Products ──

pub fn save_products(conn: &Connection, records: &[ProductRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO products (source_url, name, price, record, blocked)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for r in records {
            let json = serde_json::to_string(r)?;
            count += stmt.execute(rusqlite::params![r.source_url, r.name, r.price, json, r.blocked])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

#[cfg(test)]
fn fetch_product(conn: &Connection, source_url: &str) -> Result<Option<ProductRecord>> {
    let mut stmt = conn.prepare("SELECT record FROM products WHERE source_url = ?1")?;
    let mut rows = stmt.query([source_url])?;
    match rows.next()? {
        Some(row) => {
            let json: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&json)?))
        }
        None => Ok(None),
    }
}

// ── Media ──

/// Fresh entries only; hits were recorded when first cached.
pub fn save_cache_entries(conn: &Connection, entries: &[CacheEntry]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO cache_entries
             (namespace, source_url, content_id, content_type, cache_url, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for e in entries.iter().filter(|e| e.fresh) {
            let cached_at = e.cached_at.unwrap_or_else(Utc::now).to_rfc3339();
            count += stmt.execute(rusqlite::params![
                e.namespace, e.source_url, e.content_id, e.content_type, e.cache_url, cached_at,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Stats ──

pub struct Stats {
    pub products: usize,
    pub blocked: usize,
    pub priced: usize,
    pub named: usize,
    pub cached_images: usize,
    pub namespaces: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as usize)
    };
    Ok(Stats {
        products: count("SELECT COUNT(*) FROM products")?,
        blocked: count("SELECT COUNT(*) FROM products WHERE blocked = 1")?,
        priced: count("SELECT COUNT(*) FROM products WHERE price IS NOT NULL")?,
        named: count("SELECT COUNT(*) FROM products WHERE name IS NOT NULL")?,
        cached_images: count("SELECT COUNT(*) FROM cache_entries")?,
        namespaces: count("SELECT COUNT(DISTINCT namespace) FROM cache_entries")?,
    })
}
