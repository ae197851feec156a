//! Fallback strategy: scan every generic container for scramble-shaped text.

use super::grammar::ScrambleFilter;
use super::{element_text, MatcherStrategy};
use lazy_static::lazy_static;
use scraper::{Html, Selector};

lazy_static! {
    static ref TEXT_CONTAINERS: Selector = Selector::parse("div").unwrap();
}

/// First `div` in document order whose text passes the filter
#[derive(Debug, Clone, Copy, Default)]
pub struct TextScanStrategy;

impl MatcherStrategy for TextScanStrategy {
    fn name(&self) -> &str {
        "text-scan"
    }

    fn find(&self, document: &Html, filter: &ScrambleFilter) -> Option<String> {
        document
            .select(&TEXT_CONTAINERS)
            .map(element_text)
            .find(|text| filter.accepts(text))
    }
}
