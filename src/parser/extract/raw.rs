use std::sync::LazyLock;

use regex::Regex;

use super::CandidateSignal;
use crate::parser::text::{clean_text, decode_entities, parse_number};

static META_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").unwrap());
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static CANONICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<link[^>]*rel\s*=\s*["']canonical["'][^>]*href\s*=\s*["']([^"']+)["']"#).unwrap()
});
static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:¥|￥|&yen;|CN¥|RMB)\s*(\d[\d,]*(?:\.\d+)?)").unwrap());
// "-淘宝网", " - tmall.com天猫", "| Taobao"
static TITLE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[-|_–]\s*(?:淘宝网|天猫|tmall\.com天猫|tmall|taobao|淘宝)\s*$").unwrap()
});

/// Fallback signals from plain page markup: Open Graph / meta tags, the
/// `<title>` element and a currency-prefixed price.
pub fn extract(html: &str) -> CandidateSignal {
    let metas = meta_tags(html);
    let meta = |key: &str| -> Option<String> {
        metas
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| clean_text(&decode_entities(v)))
    };

    let title = TITLE_RE
        .captures(html)
        .and_then(|c| clean_text(&decode_entities(&c[1])))
        .map(|t| TITLE_SUFFIX_RE.replace(&t, "").into_owned())
        .filter(|t| !t.is_empty());

    let image = meta("og:image");

    CandidateSignal {
        name: meta("og:title").or(title),
        desc: meta("og:description").or_else(|| meta("description")),
        images: image.iter().cloned().collect(),
        image,
        price: PRICE_RE.captures(html).and_then(|c| parse_number(&c[1])),
        ..Default::default()
    }
}

/// `<link rel="canonical">`, falling back to `og:url`.
pub fn canonical_url(html: &str) -> Option<String> {
    CANONICAL_RE
        .captures(html)
        .map(|c| decode_entities(c[1].trim()))
        .or_else(|| {
            meta_tags(html)
                .into_iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("og:url"))
                .map(|(_, v)| decode_entities(v.trim()))
        })
        .filter(|u| !u.is_empty())
}

// (property|name, content) for every <meta> tag carrying both
fn meta_tags(html: &str) -> Vec<(String, String)> {
    META_RE
        .find_iter(html)
        .filter_map(|tag| {
            let mut key = None;
            let mut content = None;
            for caps in ATTR_RE.captures_iter(tag.as_str()) {
                let value = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str().to_string());
                match caps[1].to_ascii_lowercase().as_str() {
                    "property" | "name" | "itemprop" if key.is_none() => key = value,
                    "content" => content = value,
                    _ => {}
                }
            }
            Some((key?, content?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn og_tags_and_title() {
        let html = r#"<head><title>Wool Coat &amp; Belt-淘宝网</title>
            <meta property="og:image" content="//img.alicdn.com/coat.jpg">
            <meta name="description" content="Warm &quot;wool&quot; coat">
            <link rel="canonical" href="https://item.taobao.com/item.htm?id=9"></head>
            <span class="price">¥ 1,299.00</span>"#;
        let s = extract(html);
        assert_eq!(s.name.as_deref(), Some("Wool Coat & Belt"));
        assert_eq!(s.desc.as_deref(), Some("Warm \"wool\" coat"));
        assert_eq!(s.image.as_deref(), Some("//img.alicdn.com/coat.jpg"));
        assert_eq!(s.images, vec!["//img.alicdn.com/coat.jpg".to_string()]);
        assert_eq!(s.price, Some(1299.0));
        assert_eq!(canonical_url(html).as_deref(), Some("https://item.taobao.com/item.htm?id=9"));
    }

    #[test]
    fn og_title_beats_title_tag() {
        let html = r#"<title>Fallback</title><meta content='Preferred' property='og:title'>"#;
        assert_eq!(extract(html).name.as_deref(), Some("Preferred"));
    }

    #[test]
    fn og_url_as_canonical() {
        let html = r#"<meta property="og:url" content="https://shop.example.com/p/1">"#;
        assert_eq!(canonical_url(html).as_deref(), Some("https://shop.example.com/p/1"));
        assert_eq!(canonical_url("<p></p>"), None);
    }
}
