//! Known-container strategy: look where timer pages usually put the scramble.

use super::grammar::ScrambleFilter;
use super::{element_text, ExtractorError, MatcherStrategy};
use scraper::{Html, Selector};
use tracing::trace;

/// Checks the first element matching one CSS selector
#[derive(Debug, Clone)]
pub struct SelectorStrategy {
    raw: String,
    selector: Selector,
}

impl SelectorStrategy {
    pub fn new(raw: &str) -> Result<Self, ExtractorError> {
        let selector = Selector::parse(raw).map_err(|e| ExtractorError::InvalidSelector {
            selector: raw.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            raw: raw.to_string(),
            selector,
        })
    }
}

impl MatcherStrategy for SelectorStrategy {
    fn name(&self) -> &str {
        &self.raw
    }

    fn find(&self, document: &Html, filter: &ScrambleFilter) -> Option<String> {
        // Only the first match counts, mirroring querySelector
        let element = document.select(&self.selector).next()?;
        let text = element_text(element);
        if text.is_empty() {
            return None;
        }

        if filter.accepts(&text) {
            Some(text)
        } else {
            trace!("Selector {} matched non-scramble text ({} chars)", self.raw, text.len());
            None
        }
    }
}
