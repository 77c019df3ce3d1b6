pub mod inline;
pub mod jsonld;
pub mod quality;
pub mod raw;
pub mod sizes;

/// Partial record produced by one signal source. Every field is optional;
/// an extractor that finds nothing returns `CandidateSignal::default()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSignal {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub price: Option<f64>,
    pub sizes: Vec<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub positive_rate: Option<f64>,
    pub sold_count: Option<u64>,
}

/// Inline-script output keeps every matched price alias so the merger can
/// range-check them one by one.
#[derive(Debug, Clone, Default)]
pub struct InlineSignal {
    pub base: CandidateSignal,
    pub prices: Vec<f64>,
}

/// Candidate sets from every extractor over one page.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    pub linked_data: CandidateSignal,
    pub inline: InlineSignal,
    pub quality: CandidateSignal,
    pub sizes: Vec<String>,
    pub raw: CandidateSignal,
}

/// Run every extractor over the page. Each one is self-contained and
/// degrades to an empty candidate on malformed input.
pub fn extract_all(html: &str) -> Signals {
    Signals {
        linked_data: jsonld::extract(html),
        inline: inline::extract(html),
        quality: quality::extract(html),
        sizes: sizes::extract(html),
        raw: raw::extract(html),
    }
}
