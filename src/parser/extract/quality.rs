use std::sync::LazyLock;

use regex::Regex;

use super::jsonld::positive_count;
use super::CandidateSignal;

/// Key-name variants marketplaces use interchangeably for the same metric.
pub const RATING_KEYS: &[&str] = &["rating", "ratingValue", "avgStar", "averageStar", "score", "starScore"];
pub const RATING_COUNT_KEYS: &[&str] = &["ratingCount", "reviewCount", "rateTotal", "commentCount", "rateCounts"];
pub const POSITIVE_RATE_KEYS: &[&str] = &["positiveRate", "goodRate", "goodRatePercentage", "positiveRatio"];
pub const SOLD_COUNT_KEYS: &[&str] = &["soldCount", "sellCount", "soldTotal", "totalSoldQuantity", "sales", "sold"];

struct Metric {
    re: Regex,
}

impl Metric {
    // "key": "4.8" | "key":4.8 | key: '4.8'
    fn new(keys: &[&str]) -> Self {
        let alternation = keys.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
        let pattern = format!(r#"["']?\b(?:{})["']?\s*:\s*["']?(\d[\d,]*(?:\.\d+)?)"#, alternation);
        Self {
            re: Regex::new(&pattern).unwrap(),
        }
    }

    fn values<'a>(&'a self, text: &'a str) -> impl Iterator<Item = f64> + 'a {
        self.re
            .captures_iter(text)
            .filter_map(|caps| caps[1].replace(',', "").parse::<f64>().ok())
    }
}

static RATING: LazyLock<Metric> = LazyLock::new(|| Metric::new(RATING_KEYS));
static RATING_COUNT: LazyLock<Metric> = LazyLock::new(|| Metric::new(RATING_COUNT_KEYS));
static POSITIVE_RATE: LazyLock<Metric> = LazyLock::new(|| Metric::new(POSITIVE_RATE_KEYS));
static SOLD_COUNT: LazyLock<Metric> = LazyLock::new(|| Metric::new(SOLD_COUNT_KEYS));

/// Page-wide scan for quality metrics. Every observation is validated on its
/// own and the largest surviving value per metric wins.
pub fn extract(html: &str) -> CandidateSignal {
    CandidateSignal {
        rating: max_of(RATING.values(html).filter_map(valid_rating)),
        rating_count: RATING_COUNT.values(html).filter_map(positive_count).max(),
        positive_rate: max_of(POSITIVE_RATE.values(html).filter_map(normalize_rate)),
        sold_count: SOLD_COUNT.values(html).filter_map(positive_count).max(),
        ..Default::default()
    }
}

pub fn valid_rating(v: f64) -> Option<f64> {
    (v > 0.0 && v <= 5.0).then_some(v)
}

/// Rates above 1 are read as percentages: `92` → `0.92`, `0.92` stays.
pub fn normalize_rate(v: f64) -> Option<f64> {
    let rate = if v > 1.0 { v / 100.0 } else { v };
    (rate > 0.0 && rate <= 1.0).then_some(rate)
}

fn max_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |best, v| match best {
        Some(b) if b >= v => Some(b),
        _ => Some(v),
    })
}
