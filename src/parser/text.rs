use std::sync::LazyLock;

use regex::Regex;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Undo the escaping found in inline script literals: `\uXXXX` (surrogate
/// pairs included), `\/`, `\"`, `\'`, `\\` and the usual control escapes.
pub fn unescape_js(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('u') => {
                let hi = take_hex4(&mut chars);
                match hi {
                    Some(hi) if (0xD800..0xDC00).contains(&hi) => {
                        // high surrogate: expect "\uDCxx" right after
                        let mut look = chars.clone();
                        let lo = if look.next() == Some('\\') && look.next() == Some('u') {
                            take_hex4(&mut look).filter(|lo| (0xDC00..0xE000).contains(lo))
                        } else {
                            None
                        };
                        match lo {
                            Some(lo) => {
                                chars = look;
                                let code = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
                                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                            }
                            None => out.push('\u{FFFD}'),
                        }
                    }
                    Some(code) => out.push(char::from_u32(code).unwrap_or('\u{FFFD}')),
                    None => out.push_str("\\u"),
                }
            }
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn take_hex4<I: Iterator<Item = char> + Clone>(chars: &mut I) -> Option<u32> {
    let mut probe = chars.clone();
    let mut code = 0u32;
    for _ in 0..4 {
        code = code * 16 + probe.next()?.to_digit(16)?;
    }
    *chars = probe;
    Some(code)
}

/// Decode the handful of HTML entities that show up in attribute text.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&yen;", "¥")
        .replace("&amp;", "&")
}

/// Collapse whitespace and trim; `None` when nothing is left.
pub fn clean_text(s: &str) -> Option<String> {
    let collapsed = WS_RE.replace_all(s.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// First decimal number in `s`, ignoring thousands separators.
/// `"¥1,299.00-1,599.00"` → `1299.0`.
pub fn parse_number(s: &str) -> Option<f64> {
    let stripped = s.replace(',', "");
    NUMBER_RE
        .find(&stripped)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Slice of `text` starting at the bracket at byte `open` up to and including
/// its matching close bracket. String literals are skipped so brackets inside
/// quotes don't count.
pub fn balanced_slice(text: &str, open: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let (open_b, close_b) = match bytes.get(open)? {
        b'[' => (b'[', b']'),
        b'{' => (b'{', b'}'),
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_str: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if let Some(q) = in_str {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                in_str = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => in_str = Some(b),
            _ if b == open_b => depth += 1,
            _ if b == close_b => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
