pub mod extract;
pub mod merge;
pub mod sanitize;
pub mod text;

use serde::{Deserialize, Serialize};

/// Hints collected by the rendering layer from the live DOM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomHints {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub image: Option<String>,
    pub sizes: Vec<String>,
}

/// Canonical, merged and sanitized product record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub source_url: String,
    pub name: Option<String>,
    pub desc: Option<String>,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub price: Option<f64>,
    pub sizes: Vec<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub positive_rate: Option<f64>,
    pub sold_count: Option<u64>,
    pub blocked: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Used when no extracted price survives range validation.
    pub default_price: Option<f64>,
}

/// Signals → merge → sanitize. Pure; never fails.
pub fn extract(html: &str, source_url: &str, hints: Option<&DomHints>) -> ProductRecord {
    extract_with(html, source_url, hints, &ExtractOptions::default())
}

pub fn extract_with(
    html: &str,
    source_url: &str,
    hints: Option<&DomHints>,
    opts: &ExtractOptions,
) -> ProductRecord {
    let signals = extract::extract_all(html);
    let mut record = merge::merge(source_url, hints, &signals, opts);
    sanitize::sanitize(&mut record, html);
    record
}

// ── Tests ──
