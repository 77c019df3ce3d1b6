use url::Url;

/// Canonical form every mirrored item page collapses to.
const CANONICAL_ITEM_BASE: &str = "https://item.taobao.com/item.htm";

/// Hostnames serving the same listing under a shared numeric `id`.
const ITEM_MIRRORS: &[&str] = &[
    "item.taobao.com",
    "world.taobao.com",
    "h5.m.taobao.com",
    "m.intl.taobao.com",
    "market.m.taobao.com",
    "detail.tmall.com",
    "detail.m.tmall.com",
    "chaoshi.detail.tmall.com",
    "detail.tmall.hk",
];

const TRACKING_PARAMS: &[&str] = &["spm", "scm", "pvid", "trackInfo", "abbucket", "ali_refid", "ali_trackid"];

/// Normalize an arbitrary URL-ish string into an absolute `https` URL.
///
/// Protocol-relative (`//host/..`) and bare (`host/..`) inputs are completed,
/// `http` is upgraded and fragments are dropped. Item pages on any known
/// mirror are rewritten to the canonical item URL carrying only the item id.
pub fn normalize_url(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let absolute = if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{}", rest)
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else if has_foreign_scheme(trimmed) {
        return None;
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };

    let mut url = Url::parse(&absolute).ok()?;
    if url.scheme() == "http" {
        url.set_scheme("https").ok()?;
    }
    if url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    if !host.contains('.') && host != "localhost" {
        return None;
    }
    url.set_fragment(None);

    if let Some(id) = mirrored_item_id(&url) {
        return Some(format!("{}?id={}", CANONICAL_ITEM_BASE, id));
    }

    strip_tracking(&mut url);
    Some(url.to_string())
}

/// Item id of a recognized marketplace item page.
pub fn item_id(input: &str) -> Option<String> {
    let normalized = normalize_url(input)?;
    let url = Url::parse(&normalized).ok()?;
    mirrored_item_id(&url)
}

fn mirrored_item_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if !ITEM_MIRRORS.contains(&host) {
        return None;
    }
    let path = url.path().to_ascii_lowercase();
    if !(path.contains("item") || path.contains("detail")) {
        return None;
    }
    url.query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
}

// Filters raw `&` segments so surviving params keep their original encoding.
fn strip_tracking(url: &mut Url) {
    let Some(query) = url.query() else {
        return;
    };
    let segments: Vec<&str> = query.split('&').collect();
    let kept: Vec<&str> = segments
        .iter()
        .copied()
        .filter(|seg| !is_tracking_param(seg.split('=').next().unwrap_or("")))
        .collect();
    if kept.len() == segments.len() {
        return;
    }

    let rebuilt = kept.into_iter().filter(|seg| !seg.is_empty()).collect::<Vec<_>>().join("&");
    if rebuilt.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&rebuilt));
    }
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

// `data:`, `javascript:`, `mailto:` and friends have no `//` after the colon
fn has_foreign_scheme(s: &str) -> bool {
    match s.split_once(':') {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphabetic())
                && !rest.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_relative_and_bare() {
        assert_eq!(
            normalize_url("//img.alicdn.com/bao/a.jpg").as_deref(),
            Some("https://img.alicdn.com/bao/a.jpg")
        );
        assert_eq!(
            normalize_url("img.alicdn.com/bao/a.jpg").as_deref(),
            Some("https://img.alicdn.com/bao/a.jpg")
        );
        assert_eq!(
            normalize_url("http://example.com/x#top").as_deref(),
            Some("https://example.com/x")
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(normalize_url(""), None);
        assert_eq!(normalize_url("   "), None);
        assert_eq!(normalize_url("javascript:void(0)"), None);
        assert_eq!(normalize_url("data:image/png;base64,AAAA"), None);
        assert_eq!(normalize_url("ftp://example.com/a.jpg"), None);
        assert_eq!(normalize_url("nothing"), None);
    }

    #[test]
    fn mirrors_collapse_to_one_item_url() {
        let a = normalize_url("https://detail.tmall.com/item.htm?spm=a1z10.3&id=6123456789&skuId=4").unwrap();
        let b = normalize_url("//item.taobao.com/item.htm?id=6123456789&ali_trackid=2:mm_1").unwrap();
        let c = normalize_url("http://h5.m.taobao.com/awp/core/detail.htm?id=6123456789").unwrap();
        assert_eq!(a, "https://item.taobao.com/item.htm?id=6123456789");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn non_numeric_id_is_left_alone() {
        let n = normalize_url("https://item.taobao.com/item.htm?id=abc").unwrap();
        assert_eq!(n, "https://item.taobao.com/item.htm?id=abc");
        assert_eq!(item_id(&n), None);
    }

    #[test]
    fn tracking_params_dropped_elsewhere() {
        let n = normalize_url("https://shop.example.com/p?utm_source=x&color=red&spm=1.2").unwrap();
        assert_eq!(n, "https://shop.example.com/p?color=red");
        let bare = normalize_url("https://shop.example.com/p?utm_source=x").unwrap();
        assert_eq!(bare, "https://shop.example.com/p");
    }

    #[test]
    fn untouched_query_keeps_its_encoding() {
        assert_eq!(
            normalize_url("https://cdn.example.com/a.jpg?v2").as_deref(),
            Some("https://cdn.example.com/a.jpg?v2")
        );
        let oss = "https://img.example.com/b.jpg?x-oss-process=image/resize,w_400";
        assert_eq!(normalize_url(oss).as_deref(), Some(oss));
        assert_eq!(
            normalize_url("https://img.example.com/b.jpg?x-oss-process=image/resize,w_400&spm=a.b&v2").as_deref(),
            Some("https://img.example.com/b.jpg?x-oss-process=image/resize,w_400&v2")
        );
    }

    #[test]
    fn idempotent() {
        for input in [
            "//img.alicdn.com/imgextra/i1/O1CN01.jpg_400x400.jpg",
            "https://detail.tmall.com/item.htm?id=42&spm=x",
            "https://Shop.Example.com/a b?q=1&utm_medium=y",
            "example.com",
            "http://localhost:8080/x?y=1",
        ] {
            let once = normalize_url(input).unwrap();
            assert_eq!(normalize_url(&once).as_deref(), Some(once.as_str()), "input: {}", input);
        }
    }

    #[test]
    fn item_id_lookup() {
        assert_eq!(item_id("detail.tmall.com/item.htm?id=77").as_deref(), Some("77"));
        assert_eq!(item_id("https://example.com/item.htm?id=77"), None);
    }
}
