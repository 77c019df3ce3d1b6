use std::sync::LazyLock;

use regex::Regex;

use super::ProductRecord;

/// Markers of anti-automation interstitials and login walls served in place
/// of a listing.
static BLOCK_SIGNATURES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)login\.taobao\.com|login\.tmall\.com|passport\.[a-z0-9.-]+\.com|punish\?x5secdata|x5sec|_____tmd_____|captcha|slide to verify|unusual traffic|are you a robot|access denied|请登录|亲，请登录|验证码|安全验证|滑动验证|拖动下方滑块",
    )
    .unwrap()
});

/// Narrower: login phrasing that leaks into name/description fields.
static LOGIN_PHRASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsign\s*in\b|\blog\s*in\b|\blogin\b|请登录|登录|登錄").unwrap());

pub fn is_blocked_page(html: &str) -> bool {
    BLOCK_SIGNATURES_RE.is_match(html)
}

pub fn is_login_phrase(text: &str) -> bool {
    LOGIN_PHRASE_RE.is_match(text)
}

/// Flag and scrub a record built from `html`. Price and sizes come from
/// embedded data that login walls rarely touch, so they are kept.
pub fn sanitize(record: &mut ProductRecord, html: &str) {
    if is_blocked_page(html) {
        record.blocked = true;
    }
    redact(record);
}

/// Clear fields contaminated by a blocked page. Login phrasing in
/// name/description is blanked even when the page itself is not flagged.
pub fn redact(record: &mut ProductRecord) {
    if record.blocked {
        record.image = None;
        record.images.clear();
        record.rating = None;
        record.rating_count = None;
        record.positive_rate = None;
        record.sold_count = None;
    }
    if record.name.as_deref().is_some_and(is_login_phrase) {
        record.name = None;
    }
    if record.desc.as_deref().is_some_and(is_login_phrase) {
        record.desc = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProductRecord {
        ProductRecord {
            source_url: "https://item.taobao.com/item.htm?id=1".into(),
            name: Some("Please Sign In".into()),
            desc: Some("Soft cotton knit".into()),
            image: Some("https://img.example.com/a.jpg".into()),
            images: vec!["https://img.example.com/a.jpg".into()],
            price: Some(88.0),
            sizes: vec!["S".into(), "M".into()],
            rating: Some(4.8),
            rating_count: Some(10),
            positive_rate: Some(0.9),
            sold_count: Some(300),
            blocked: false,
        }
    }

    #[test]
    fn blocked_page_clears_contaminated_fields() {
        let mut r = sample();
        r.blocked = true;
        redact(&mut r);
        assert_eq!(r.name, None);
        assert_eq!(r.image, None);
        assert!(r.images.is_empty());
        assert_eq!(r.rating, None);
        assert_eq!(r.rating_count, None);
        assert_eq!(r.positive_rate, None);
        assert_eq!(r.sold_count, None);
        assert_eq!(r.desc.as_deref(), Some("Soft cotton knit"));
        assert_eq!(r.price, Some(88.0));
        assert_eq!(r.sizes, vec!["S", "M"]);
    }

    #[test]
    fn sanitize_detects_login_wall() {
        let mut r = sample();
        sanitize(&mut r, r#"<form action="https://login.taobao.com/member/login.jhtml">"#);
        assert!(r.blocked);
        assert!(r.images.is_empty());
        assert_eq!(r.price, Some(88.0));
    }

    #[test]
    fn login_phrase_alone_only_blanks_text() {
        let mut r = sample();
        r.desc = Some("请登录后查看".into());
        sanitize(&mut r, "<html>ordinary listing</html>");
        assert!(!r.blocked);
        assert_eq!(r.name, None);
        assert_eq!(r.desc, None);
        assert_eq!(r.rating, Some(4.8));
        assert_eq!(r.images.len(), 1);
    }

    #[test]
    fn ordinary_titles_survive() {
        assert!(!is_login_phrase("Loginov linen shirt"));
        assert!(!is_blocked_page("<title>Cotton dress</title>"));
    }
}
