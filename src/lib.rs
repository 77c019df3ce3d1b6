pub mod classify;
pub mod config;
pub mod db;
pub mod media;
pub mod normalize;
pub mod parser;

pub use classify::classify;
pub use media::{CacheEntry, CacheError, MediaCache};
pub use normalize::normalize_url;
pub use parser::{extract, extract_with, DomHints, ExtractOptions, ProductRecord};
