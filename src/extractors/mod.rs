//! Scramble extraction from page snapshots.
//!
//! Extraction runs an ordered chain of matcher strategies:
//! - Selector: known containers where timer pages render the scramble
//! - Text scan: fallback over every generic container on the page
//!
//! The first strategy that yields text passing the move-sequence filter wins.
//! Extraction is pure; an unchanged snapshot always yields the same result.

pub mod grammar;
pub mod selector;
pub mod text_scan;

use crate::config::ExtractionConfig;
use crate::types::{PageSnapshot, Scramble};
use grammar::ScrambleFilter;
use scraper::{ElementRef, Html};
use selector::SelectorStrategy;
use text_scan::TextScanStrategy;
use tracing::{debug, trace};

/// One independent way of locating scramble text in a parsed page
pub trait MatcherStrategy: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// Return trimmed candidate text that already passes `filter`
    fn find(&self, document: &Html, filter: &ScrambleFilter) -> Option<String>;
}

/// Errors raised while building an extractor
#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid length bounds: min {min} > max {max}")]
    InvalidBounds { min: usize, max: usize },
}

/// Ordered strategy chain plus the lexical filter
pub struct ScrambleExtractor {
    strategies: Vec<Box<dyn MatcherStrategy>>,
    filter: ScrambleFilter,
}

impl ScrambleExtractor {
    pub fn new(strategies: Vec<Box<dyn MatcherStrategy>>, filter: ScrambleFilter) -> Self {
        Self { strategies, filter }
    }

    /// Configured selectors in priority order, then the text scan
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractorError> {
        if config.min_chars > config.max_chars {
            return Err(ExtractorError::InvalidBounds {
                min: config.min_chars,
                max: config.max_chars,
            });
        }

        let mut strategies: Vec<Box<dyn MatcherStrategy>> =
            Vec::with_capacity(config.selectors.len() + 1);
        for raw in &config.selectors {
            strategies.push(Box::new(SelectorStrategy::new(raw)?));
        }
        strategies.push(Box::new(TextScanStrategy));

        Ok(Self::new(
            strategies,
            ScrambleFilter::new(config.min_chars, config.max_chars),
        ))
    }

    /// Find the scramble currently shown in `snapshot`
    pub fn extract(&self, snapshot: &PageSnapshot) -> Option<Scramble> {
        if snapshot.is_empty() {
            trace!("Empty snapshot, nothing to extract");
            return None;
        }

        let document = Html::parse_document(snapshot.html());
        for strategy in &self.strategies {
            if let Some(text) = strategy.find(&document, &self.filter) {
                debug!("Scramble found by {}: {}", strategy.name(), text);
                return self.filter.check(&text);
            }
        }

        trace!("No scramble on page ({} strategies tried)", self.strategies.len());
        None
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

/// DOM `textContent` of an element, trimmed
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
