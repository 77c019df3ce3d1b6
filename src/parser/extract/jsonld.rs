use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::CandidateSignal;
use crate::parser::text::{clean_text, decode_entities, parse_number};

static LD_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#).unwrap()
});

/// First `Product` object found in the page's linked-data blocks.
pub fn extract(html: &str) -> CandidateSignal {
    LD_BLOCK_RE
        .captures_iter(html)
        .filter_map(|caps| serde_json::from_str::<Value>(caps[1].trim()).ok())
        .find_map(|value| find_product(&value).map(from_product))
        .unwrap_or_default()
}

fn find_product(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Array(items) => items.iter().find_map(find_product),
        Value::Object(map) => {
            if map.get("@type").is_some_and(is_product_type) {
                return Some(map);
            }
            map.get("@graph").and_then(find_product)
        }
        _ => None,
    }
}

fn is_product_type(t: &Value) -> bool {
    match t {
        Value::String(s) => s.to_lowercase().contains("product"),
        Value::Array(items) => items.iter().any(is_product_type),
        _ => false,
    }
}

fn from_product(map: &Map<String, Value>) -> CandidateSignal {
    let images = map.get("image").map(image_values).unwrap_or_default();
    let rating = map.get("aggregateRating");

    CandidateSignal {
        name: string_field(map, "name"),
        desc: string_field(map, "description"),
        image: images.first().cloned(),
        images,
        price: map.get("offers").and_then(offer_price),
        rating: rating
            .and_then(|r| r.get("ratingValue"))
            .and_then(number_value)
            .filter(|v| *v > 0.0 && *v <= 5.0),
        rating_count: rating
            .and_then(|r| r.get("reviewCount").or_else(|| r.get("ratingCount")))
            .and_then(number_value)
            .and_then(positive_count),
        ..Default::default()
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| clean_text(&decode_entities(s)))
}

fn image_values(v: &Value) -> Vec<String> {
    match v {
        Value::String(s) => clean_text(s).into_iter().collect(),
        Value::Object(obj) => obj
            .get("url")
            .or_else(|| obj.get("contentUrl"))
            .and_then(|u| u.as_str())
            .and_then(clean_text)
            .into_iter()
            .collect(),
        Value::Array(items) => items.iter().flat_map(image_values).collect(),
        _ => Vec::new(),
    }
}

// offers.price → offers.lowPrice → offers[0] → offers.priceSpecification.price
fn offer_price(offers: &Value) -> Option<f64> {
    match offers {
        Value::Array(items) => items.iter().find_map(offer_price),
        Value::Object(obj) => obj
            .get("price")
            .and_then(number_value)
            .or_else(|| obj.get("lowPrice").and_then(number_value))
            .or_else(|| {
                obj.get("priceSpecification").and_then(|spec| match spec {
                    Value::Array(specs) => specs.iter().find_map(|s| s.get("price").and_then(number_value)),
                    other => other.get("price").and_then(number_value),
                })
            }),
        _ => None,
    }
}

fn number_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

pub(crate) fn positive_count(v: f64) -> Option<u64> {
    if v >= 1.0 && v.fract() == 0.0 && v < u64::MAX as f64 {
        Some(v as u64)
    } else {
        None
    }
}
