use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use listing_extractor::config::{Backend, Settings};
use listing_extractor::media::{BlobStore, ChunkedStore, HttpFetcher, MediaCache, SqliteStore};
use listing_extractor::parser::{self, extract::raw, DomHints, ExtractOptions};
use listing_extractor::{classify, db, normalize};

#[derive(Parser)]
#[command(name = "listing_extractor", about = "Marketplace product-page extraction and media cache")]
struct Cli {
    /// SQLite database (overrides LISTING_DB_PATH)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one saved product page and print the record as JSON
    Extract {
        file: PathBuf,
        /// Source URL (default: the page's canonical link)
        #[arg(short, long)]
        url: Option<String>,
        /// JSON file with DOM hints (title, desc, image, sizes)
        #[arg(long)]
        hints: Option<PathBuf>,
        /// Price used when no extracted price is valid
        #[arg(long)]
        default_price: Option<f64>,
    },
    /// Extract every .html file in a directory and save the records
    Process {
        dir: PathBuf,
        /// Max pages to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Check a title against the category filter
    Classify { title: String },
    /// Print the canonical form of a URL
    Normalize { url: String },
    /// Download images into the content-addressed cache
    Cache {
        urls: Vec<String>,
        #[arg(long, default_value = "products")]
        namespace: String,
        /// Storage layout (overrides LISTING_BACKEND)
        #[arg(long, value_enum)]
        backend: Option<Backend>,
    },
    /// Show database statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let result = match cli.command {
        Commands::Extract {
            file,
            url,
            hints,
            default_price,
        } => {
            let html = read_page(&file)?;
            let hints = match hints {
                Some(path) => Some(read_hints(&path)?),
                None => None,
            };
            let source_url = url
                .or_else(|| page_url(&html))
                .unwrap_or_else(|| file.display().to_string());
            let opts = ExtractOptions { default_price };
            let record = parser::extract_with(&html, &source_url, hints.as_ref(), &opts);
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Process { dir, limit } => {
            let files = html_files(&dir, limit)?;
            if files.is_empty() {
                println!("No .html files in {}", dir.display());
                return Ok(());
            }
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            println!("Processing {} pages...", files.len());
            let counts = process_pages(&conn, &files)?;
            counts.print();
            Ok(())
        }
        Commands::Classify { title } => {
            let verdict = if classify::classify(&title) { "accepted" } else { "rejected" };
            println!("{}: {}", verdict, classify::normalize_title(&title));
            Ok(())
        }
        Commands::Normalize { url } => match normalize::normalize_url(&url) {
            Some(n) => {
                println!("{}", n);
                if let Some(id) = normalize::item_id(&n) {
                    println!("item id: {}", id);
                }
                Ok(())
            }
            None => bail!("not a usable URL: {:?}", url),
        },
        Commands::Cache {
            urls,
            namespace,
            backend,
        } => {
            if urls.is_empty() {
                println!("No URLs given.");
                return Ok(());
            }
            let backend = backend.unwrap_or(settings.backend);
            let cache = Arc::new(build_cache(&settings, backend)?);
            info!(count = urls.len(), %namespace, ?backend, "caching images");

            let resolved = cache.resolve_all(&urls, &namespace).await;
            let entries: Vec<_> = resolved.iter().filter_map(|r| r.entry.clone()).collect();
            let failed = resolved.len() - entries.len();

            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let recorded = db::save_cache_entries(&conn, &entries)?;

            println!("{}", serde_json::to_string_pretty(&resolved)?);
            println!(
                "Cached {} images ({} new, {} failed).",
                entries.len(),
                recorded,
                failed
            );
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Products:   {}", s.products);
            println!("Named:      {}", s.named);
            println!("Priced:     {}", s.priced);
            println!("Blocked:    {}", s.blocked);
            println!("Images:     {}", s.cached_images);
            println!("Namespaces: {}", s.namespaces);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build_cache(settings: &Settings, backend: Backend) -> Result<MediaCache> {
    let sqlite = SqliteStore::open(&settings.db_path)
        .with_context(|| format!("opening media store at {}", settings.db_path))?;
    let store: Arc<dyn BlobStore> = match backend {
        Backend::Blob => Arc::new(sqlite),
        Backend::Chunked => Arc::new(ChunkedStore::new(sqlite, settings.chunk_size)),
    };
    let fetcher = HttpFetcher::new(
        Duration::from_secs(settings.download_timeout_secs),
        settings.max_image_bytes,
    )?;
    Ok(MediaCache::new(store, Arc::new(fetcher), settings.cache_config()))
}

struct ProcessCounts {
    pages: usize,
    named: usize,
    priced: usize,
    blocked: usize,
    failed: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} products ({} named, {} priced, {} blocked), {} unreadable.",
            self.pages, self.named, self.priced, self.blocked, self.failed,
        );
    }
}

fn process_pages(conn: &rusqlite::Connection, files: &[PathBuf]) -> Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        pages: 0,
        named: 0,
        priced: 0,
        blocked: 0,
        failed: 0,
    };

    for chunk in files.chunks(500) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|path| {
                let html = read_page(path)?;
                let source_url = page_url(&html).unwrap_or_else(|| path.display().to_string());
                Ok::<_, anyhow::Error>(parser::extract(&html, &source_url, None))
            })
            .collect();

        let mut records = Vec::with_capacity(results.len());
        for (result, path) in results.into_iter().zip(chunk) {
            match result {
                Ok(r) => {
                    counts.named += r.name.is_some() as usize;
                    counts.priced += r.price.is_some() as usize;
                    counts.blocked += r.blocked as usize;
                    records.push(r);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping page");
                    counts.failed += 1;
                }
            }
        }

        counts.pages += db::save_products(conn, &records)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn read_page(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_hints(path: &Path) -> Result<DomHints> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing hints in {}", path.display()))
}

// Canonical link of a saved page, normalized.
fn page_url(html: &str) -> Option<String> {
    raw::canonical_url(html).and_then(|u| normalize::normalize_url(&u))
}

fn html_files(dir: &Path, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        })
        .collect();
    files.sort();
    if let Some(n) = limit {
        files.truncate(n);
    }
    Ok(files)
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
