use std::collections::HashSet;

use super::extract::sizes::dedupe_sizes;
use super::extract::Signals;
use super::{DomHints, ExtractOptions, ProductRecord};
use crate::normalize::normalize_url;

pub const MAX_PRICE: f64 = 1_000_000.0;

/// Values that can be "present but empty".
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for f64 {
    fn is_blank(&self) -> bool {
        self.is_nan()
    }
}

/// First candidate that is present and not blank, in priority order.
pub fn pick_first<T, I>(candidates: I) -> Option<T>
where
    T: Blank,
    I: IntoIterator<Item = Option<T>>,
{
    candidates.into_iter().flatten().find(|c| !c.is_blank())
}

pub fn valid_price(p: f64) -> Option<f64> {
    (p > 0.0 && p <= MAX_PRICE).then_some(p)
}

/// Resolve one record from every extractor's candidates.
///
/// Text and image fields: DOM hint → linked data → inline script → raw markup.
/// Metrics: linked data when present, else the page-wide aggregate.
pub fn merge(
    source_url: &str,
    hints: Option<&DomHints>,
    signals: &Signals,
    opts: &ExtractOptions,
) -> ProductRecord {
    let ld = &signals.linked_data;
    let inline = &signals.inline.base;
    let raw = &signals.raw;
    let hint = |f: fn(&DomHints) -> Option<String>| hints.and_then(f);

    let name = pick_first([hint(|h| h.title.clone()), ld.name.clone(), inline.name.clone(), raw.name.clone()]);
    let desc = pick_first([hint(|h| h.desc.clone()), ld.desc.clone(), inline.desc.clone(), raw.desc.clone()]);

    let image_candidates = [
        hint(|h| h.image.clone()),
        ld.image.clone(),
        inline.image.clone(),
        raw.image.clone(),
    ];
    let images = union_images(
        image_candidates
            .iter()
            .flatten()
            .chain(&ld.images)
            .chain(&inline.images)
            .chain(&raw.images),
    );
    let image = pick_first(image_candidates.iter().map(|c| c.as_deref().and_then(normalize_url)))
        .or_else(|| images.first().cloned());

    let price_candidates = std::iter::once(ld.price)
        .chain(signals.inline.prices.iter().map(|p| Some(*p)))
        .chain(std::iter::once(raw.price));
    let price = pick_first(price_candidates.map(|p| p.and_then(valid_price)))
        .or_else(|| opts.default_price.and_then(valid_price));

    let hint_sizes = hints.map(|h| h.sizes.as_slice()).unwrap_or_default();
    let sizes = dedupe_sizes(hint_sizes.iter().chain(&signals.sizes));

    let quality = &signals.quality;

    ProductRecord {
        source_url: normalize_url(source_url).unwrap_or_else(|| source_url.trim().to_string()),
        name,
        desc,
        image,
        images,
        price,
        sizes,
        rating: ld.rating.or(quality.rating),
        rating_count: ld.rating_count.or(quality.rating_count),
        positive_rate: ld.positive_rate.or(quality.positive_rate),
        sold_count: ld.sold_count.or(quality.sold_count),
        blocked: false,
    }
}

// Normalized, deduplicated, first-seen order.
fn union_images<'a>(candidates: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .filter_map(|c| normalize_url(c))
        .filter(|u| seen.insert(u.clone()))
        .collect()
}
