use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// Keyword families driving the title filter. Each list becomes one
/// case-insensitive alternation.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    pub allowed_categories: Vec<&'static str>,
    pub audience: Vec<&'static str>,
    pub blocked_categories: Vec<&'static str>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            allowed_categories: vec![
                // apparel
                r"dress(?:es)?", r"skirt", r"blouse", r"t-?shirt", r"shirt", r"top", r"cardigan", r"sweater",
                r"hoodie", r"jacket", r"coat", r"trench", r"jeans", r"pants", r"trousers", r"leggings",
                r"jumpsuit", r"romper", r"連衣裙", r"连衣裙", r"半身裙", r"衬衫", r"T恤", r"毛衣", r"针织衫",
                r"卫衣", r"外套", r"大衣", r"风衣", r"牛仔裤", r"裤", r"裙",
                // footwear
                r"shoes?", r"sneakers?", r"boots?", r"heels", r"sandals?", r"loafers?", r"鞋", r"靴",
                // bags and accessories
                r"bags?", r"handbags?", r"tote", r"purse", r"backpack", r"wallet", r"scarf", r"hat",
                r"包", r"钱包", r"围巾", r"帽",
            ],
            audience: vec![
                r"women'?s?", r"woman", r"ladies", r"lady", r"girls?", r"female", r"女", r"女士", r"女款",
            ],
            blocked_categories: vec![
                r"men'?s?", r"male", r"boys?", r"kids?", r"child(?:ren)?", r"baby", r"toddler", r"underwear",
                r"lingerie", r"bra", r"pet", r"dog", r"cat", r"wig", r"replica", r"男", r"童", r"儿童", r"婴",
                r"内衣", r"文胸", r"宠物", r"假发",
            ],
        }
    }
}

static PRICE_FRAGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:[¥￥$€£]|rmb|cny|usd)\s*\d+(?:[.,]\d+)*|\d+(?:[.,]\d+)*\s*(?:元|块|rmb|cny|yuan|usd)",
    )
    .unwrap()
});
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static DEFAULT_CLASSIFIER: LazyLock<TitleClassifier> =
    LazyLock::new(|| TitleClassifier::new(&ClassifierRules::default()));

/// Compiled allow / audience / block filter.
pub struct TitleClassifier {
    allowed: Regex,
    audience: Regex,
    blocked: Regex,
}

impl TitleClassifier {
    pub fn new(rules: &ClassifierRules) -> Self {
        Self {
            allowed: keyword_regex(&rules.allowed_categories),
            audience: keyword_regex(&rules.audience),
            blocked: keyword_regex(&rules.blocked_categories),
        }
    }

    /// Accept only titles in an allowed category, aimed at the target
    /// audience and free of blocked categories.
    pub fn accepts(&self, title: &str) -> bool {
        let t = normalize_title(title);
        if t.is_empty() {
            return false;
        }
        self.allowed.is_match(&t) && self.audience.is_match(&t) && !self.blocked.is_match(&t)
    }
}

/// Title filter with the default keyword families.
pub fn classify(title: &str) -> bool {
    DEFAULT_CLASSIFIER.accepts(title)
}

/// Lowercased title with currency and price fragments removed.
pub fn normalize_title(title: &str) -> String {
    let stripped = PRICE_FRAGMENT_RE.replace_all(title, " ");
    WS_RE.replace_all(stripped.trim(), " ").to_lowercase()
}

// ASCII words get word boundaries; CJK keywords match anywhere.
fn keyword_regex(keywords: &[&str]) -> Regex {
    let parts: Vec<String> = keywords
        .iter()
        .map(|k| {
            if k.is_ascii() {
                format!(r"\b{}\b", k)
            } else {
                k.to_string()
            }
        })
        .collect();
    let pattern = if parts.is_empty() {
        // never matches
        r"[^\s\S]".to_string()
    } else {
        format!("(?:{})", parts.join("|"))
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_womens_apparel() {
        assert!(classify("Women's Floral Midi Dress ¥168"));
        assert!(classify("2024春季新款女装连衣裙"));
        assert!(classify("Ladies canvas tote bag"));
    }

    #[test]
    fn rejects_without_audience() {
        assert!(!classify("Floral midi dress"));
    }

    #[test]
    fn rejects_outside_allowed_categories() {
        assert!(!classify("Women's smart watch"));
    }

    #[test]
    fn block_list_wins_over_allow_and_audience() {
        // allowed (dress) + audience (girls) + blocked (kids)
        assert!(!classify("Girls party dress for kids"));
        assert!(!classify("女童连衣裙"));
        assert!(!classify("Women's lingerie top"));
    }

    #[test]
    fn men_does_not_match_inside_women() {
        assert!(classify("women jacket"));
        assert!(!classify("men jacket for women"));
    }

    #[test]
    fn price_fragments_stripped() {
        assert_eq!(normalize_title("  Dress  ¥ 99.00  RMB30 "), "dress");
        assert_eq!(normalize_title("连衣裙 99元 包邮"), "连衣裙 包邮");
    }

    #[test]
    fn custom_rules() {
        let rules = ClassifierRules {
            allowed_categories: vec!["lamp"],
            audience: vec!["home"],
            blocked_categories: vec![],
        };
        let c = TitleClassifier::new(&rules);
        assert!(c.accepts("Home desk lamp"));
        assert!(!c.accepts("Women's dress"));
        assert!(!c.accepts(""));
    }
}
