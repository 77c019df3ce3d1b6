use std::sync::LazyLock;

use regex::Regex;

use super::{CandidateSignal, InlineSignal};
use crate::parser::text::{balanced_slice, clean_text, decode_entities, parse_number, unescape_js};

/// One alternative way of recovering a field from inline script state.
/// Group 1 of `re` is handed to `transform`.
pub struct FieldPattern<T> {
    pub re: Regex,
    pub transform: fn(&str) -> Option<T>,
}

impl<T> FieldPattern<T> {
    fn new(pattern: &str, transform: fn(&str) -> Option<T>) -> Self {
        Self {
            re: Regex::new(pattern).unwrap(),
            transform,
        }
    }

    pub fn apply(&self, html: &str) -> Option<T> {
        self.re.captures(html).and_then(|caps| (self.transform)(&caps[1]))
    }
}

// Double- and single-quoted literal bodies, escapes included.
const DQ: &str = r#""((?:[^"\\]|\\.)*)""#;
const SQ: &str = r#"'((?:[^'\\]|\\.)*)'"#;

fn dq_key(key: &str) -> String {
    format!(r#""{}"\s*:\s*{}"#, key, DQ)
}

fn sq_key(key: &str) -> String {
    format!(r#"\b{}\s*:\s*{}"#, key, SQ)
}

fn num_key(key: &str) -> String {
    format!(r#"["']?\b{}["']?\s*:\s*["']?([\d.,]+)"#, key)
}

pub static TITLE_PATTERNS: LazyLock<Vec<FieldPattern<String>>> = LazyLock::new(|| {
    vec![
        FieldPattern::new(&dq_key("itemTitle"), text_value),
        FieldPattern::new(&sq_key("title"), text_value),
        FieldPattern::new(&dq_key("title"), text_value),
        FieldPattern::new(&dq_key("itemName"), text_value),
    ]
});

pub static SUBTITLE_PATTERNS: LazyLock<Vec<FieldPattern<String>>> = LazyLock::new(|| {
    vec![
        FieldPattern::new(&dq_key("subtitle"), text_value),
        FieldPattern::new(&dq_key("subTitle"), text_value),
        FieldPattern::new(&sq_key("subtitle"), text_value),
        FieldPattern::new(&dq_key("itemSubtitle"), text_value),
    ]
});

pub static PICTURE_PATTERNS: LazyLock<Vec<FieldPattern<String>>> = LazyLock::new(|| {
    vec![
        FieldPattern::new(&dq_key("mainPic"), image_value),
        FieldPattern::new(&dq_key("picUrl"), image_value),
        FieldPattern::new(&sq_key("pic"), image_value),
        FieldPattern::new(&dq_key("pic"), image_value),
        FieldPattern::new(&dq_key("mainImage"), image_value),
    ]
});

pub static PRICE_PATTERNS: LazyLock<Vec<FieldPattern<f64>>> = LazyLock::new(|| {
    vec![
        FieldPattern::new(&num_key("price"), price_value),
        FieldPattern::new(&num_key("salePrice"), price_value),
        FieldPattern::new(&num_key("reservePrice"), price_value),
        FieldPattern::new(&num_key("defaultItemPrice"), price_value),
        FieldPattern::new(&num_key("priceText"), price_value),
    ]
});

static PATH_ARRAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']?\b(?:auctionImages|picsPath|itemImages|images)["']?\s*:\s*\["#).unwrap()
});
static PROPERTY_PICS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']?\bpropertyPics["']?\s*:\s*\{"#).unwrap());
static GALLERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<ul[^>]*(?:id\s*=\s*["']J_UlThumb["']|class\s*=\s*["'][^"']*tb-thumb[^"']*["'])[^>]*>(.*?)</ul>"#)
        .unwrap()
});
static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]*?\s(?:data-src|data-ks-lazyload|src)\s*=\s*["']([^"']+)["']"#).unwrap()
});
static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'"#).unwrap());
static THUMB_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\.(?:jpe?g|png|webp|gif))_\d+x\d+(?:q\d+)?(?:\.(?:jpe?g|png|webp))?$").unwrap()
});

const IMAGE_EXTS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif"];

pub fn extract(html: &str) -> InlineSignal {
    let prices: Vec<f64> = PRICE_PATTERNS.iter().filter_map(|p| p.apply(html)).collect();

    InlineSignal {
        base: CandidateSignal {
            name: first_match(&TITLE_PATTERNS, html),
            desc: first_match(&SUBTITLE_PATTERNS, html),
            image: first_match(&PICTURE_PATTERNS, html),
            images: image_list(html),
            price: prices.first().copied(),
            ..Default::default()
        },
        prices,
    }
}

/// Value of the first pattern in `patterns` that matches and transforms.
pub fn first_match<T>(patterns: &[FieldPattern<T>], html: &str) -> Option<T> {
    patterns.iter().find_map(|p| p.apply(html))
}

/// Image list from the first non-empty source: path array, property→pictures
/// map, then thumbnail gallery markup.
pub fn image_list(html: &str) -> Vec<String> {
    let sources: [fn(&str) -> Vec<String>; 3] = [path_array_images, property_pic_images, gallery_images];
    sources
        .iter()
        .map(|source| source(html))
        .find(|images| !images.is_empty())
        .unwrap_or_default()
}

fn path_array_images(html: &str) -> Vec<String> {
    PATH_ARRAY_RE
        .find_iter(html)
        .filter_map(|m| balanced_slice(html, m.end() - 1))
        .map(quoted_images)
        .find(|images| !images.is_empty())
        .unwrap_or_default()
}

fn property_pic_images(html: &str) -> Vec<String> {
    PROPERTY_PICS_RE
        .find(html)
        .and_then(|m| balanced_slice(html, m.end() - 1))
        .map(quoted_images)
        .unwrap_or_default()
}

fn gallery_images(html: &str) -> Vec<String> {
    let Some(caps) = GALLERY_RE.captures(html) else {
        return Vec::new();
    };
    IMG_SRC_RE
        .captures_iter(&caps[1])
        .filter_map(|c| image_value(&decode_entities(&c[1])))
        .map(|src| THUMB_SUFFIX_RE.replace(&src, "$1").into_owned())
        .collect()
}

fn quoted_images(blob: &str) -> Vec<String> {
    QUOTED_RE
        .captures_iter(blob)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .filter_map(|m| image_value(m.as_str()))
        .filter(|s| looks_like_image(s))
        .collect()
}

fn looks_like_image(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    s.contains('/') && (IMAGE_EXTS.iter().any(|ext| lower.contains(ext)) || lower.contains("alicdn.com"))
}

fn text_value(raw: &str) -> Option<String> {
    clean_text(&decode_entities(&unescape_js(raw)))
}

fn image_value(raw: &str) -> Option<String> {
    let s = unescape_js(raw);
    let s = s.trim();
    if s.is_empty() || s.starts_with("data:") {
        None
    } else {
        Some(s.to_string())
    }
}

fn price_value(raw: &str) -> Option<f64> {
    parse_number(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pattern_wins_per_field() {
        let html = r#"<script>var g_config = { title: '春季 dress', pic: '\/\/img.alicdn.com\/a.jpg' };
            var data = {"title":"Page title","subTitle":"Free shipping","price":"89.00","reservePrice":"120.00"};</script>"#;
        let s = extract(html);
        assert_eq!(s.base.name.as_deref(), Some("春季 dress"));
        assert_eq!(s.base.desc.as_deref(), Some("Free shipping"));
        assert_eq!(s.base.image.as_deref(), Some("//img.alicdn.com/a.jpg"));
        assert_eq!(s.prices, vec![89.0, 120.0]);
    }

    #[test]
    fn escaped_quotes_survive() {
        let html = r#"{"itemTitle":"The \"Classic\" tote"}"#;
        assert_eq!(first_match(&TITLE_PATTERNS, html).as_deref(), Some("The \"Classic\" tote"));
    }

    #[test]
    fn image_list_prefers_path_array() {
        let html = r#"auctionImages : ["//img.alicdn.com/1.jpg","//img.alicdn.com/2.jpg"],
            "propertyPics":{"default":["//img.alicdn.com/p.jpg"]}"#;
        assert_eq!(
            image_list(html),
            vec!["//img.alicdn.com/1.jpg".to_string(), "//img.alicdn.com/2.jpg".to_string()]
        );
    }

    #[test]
    fn image_list_falls_back_to_property_map() {
        let html = r#""images":[], "propertyPics":{";1627207:28320;":["//img.alicdn.com/red.jpg"],"default":["//img.alicdn.com/d.png"]}"#;
        assert_eq!(
            image_list(html),
            vec!["//img.alicdn.com/red.jpg".to_string(), "//img.alicdn.com/d.png".to_string()]
        );
    }

    #[test]
    fn image_list_falls_back_to_gallery() {
        let html = r##"<ul id="J_UlThumb" class="tb-thumb">
            <li><a href="#"><img data-src="//img.alicdn.com/g1.jpg_60x60q90.jpg" /></a></li>
            <li><a href="#"><img src="//img.alicdn.com/g2.png_50x50.png" /></a></li>
        </ul>"##;
        assert_eq!(
            image_list(html),
            vec!["//img.alicdn.com/g1.jpg".to_string(), "//img.alicdn.com/g2.png".to_string()]
        );
    }

    #[test]
    fn nothing_to_find() {
        let s = extract("<p>hello</p>");
        assert!(s.base.name.is_none());
        assert!(s.base.images.is_empty());
        assert!(s.prices.is_empty());
    }
}
