use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::parser::text::{balanced_slice, unescape_js};

pub const MAX_SIZE_LEN: usize = 12;

static SIZE_TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)size|尺码|尺寸|码数|サイズ").unwrap());
static PROP_ARRAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']?\b(?:skuProps|saleProps|props)["']?\s*:\s*\["#).unwrap());
// a quoted size-like label, then a values array within 200 characters
static LABEL_WINDOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)"[^"]{0,40}?(?:size|尺码|尺寸|码数|サイズ)[^"]{0,40}?"[^\[]{0,200}?\["#).unwrap()
});
static STRING_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)"\s*(:)?|'((?:[^'\\]|\\.)*)'\s*(:)?"#).unwrap());

const LABEL_KEYS: &[&str] = &["propName", "name", "label", "text", "title"];
const VALUE_LIST_KEYS: &[&str] = &["values", "options", "value"];
const VALUE_KEYS: &[&str] = &["name", "value", "text", "label"];

/// Sizes from both the structured property array and the label/values scan,
/// deduplicated in first-seen order.
pub fn extract(html: &str) -> Vec<String> {
    let mut all = from_property_arrays(html);
    all.extend(from_label_windows(html));
    dedupe_sizes(all)
}

/// Keep the first occurrence of each exact, non-empty string of at most
/// `MAX_SIZE_LEN` characters.
pub fn dedupe_sizes<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|c| {
            let s = c.as_ref().trim();
            let ok = !s.is_empty() && s.chars().count() <= MAX_SIZE_LEN;
            ok.then(|| s.to_string())
        })
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

fn from_property_arrays(html: &str) -> Vec<String> {
    PROP_ARRAY_RE
        .find_iter(html)
        .filter_map(|m| balanced_slice(html, m.end() - 1))
        .filter_map(|slice| serde_json::from_str::<Value>(slice).ok())
        .flat_map(|value| size_options(&value))
        .collect()
}

fn size_options(props: &Value) -> Vec<String> {
    let Some(entries) = props.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .find(|entry| {
            LABEL_KEYS
                .iter()
                .filter_map(|k| entry.get(*k).and_then(|v| v.as_str()))
                .any(|label| SIZE_TERM_RE.is_match(label))
        })
        .and_then(|entry| VALUE_LIST_KEYS.iter().find_map(|k| entry.get(*k)?.as_array()))
        .map(|values| values.iter().filter_map(option_label).collect())
        .unwrap_or_default()
}

fn option_label(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => VALUE_KEYS
            .iter()
            .find_map(|k| v.get(*k).and_then(|x| x.as_str()).map(str::to_string)),
        _ => None,
    }
}

fn from_label_windows(html: &str) -> Vec<String> {
    LABEL_WINDOW_RE
        .find_iter(html)
        .filter_map(|m| balanced_slice(html, m.end() - 1))
        .flat_map(window_values)
        .collect()
}

// Parse the array when it is JSON; otherwise fall back to quoted strings
// that are not object keys.
fn window_values(slice: &str) -> Vec<String> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(slice) {
        return items
            .iter()
            .filter_map(option_label)
            .filter(|s| s.chars().count() <= MAX_SIZE_LEN)
            .collect();
    }
    STRING_ITEM_RE
        .captures_iter(slice)
        .filter(|caps| caps.get(2).is_none() && caps.get(4).is_none())
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(3)))
        .map(|m| unescape_js(m.as_str()))
        .filter(|s| s.chars().count() <= MAX_SIZE_LEN)
        .collect()
}
