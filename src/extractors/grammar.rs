//! Lexical filter for scramble candidates.
//!
//! A candidate qualifies only when it is a whitespace-separated sequence of at
//! least two move tokens (face letter from `URFDLB`, optionally followed by
//! `'` or `2`) and its length falls inside the configured bounds.

use crate::types::Scramble;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Two or more move tokens separated by whitespace
    static ref MOVE_SEQUENCE: Regex = Regex::new(
        r"^[URFDLB]['2]?(?:\s+[URFDLB]['2]?)+$"
    ).unwrap();
}

/// Bounds-aware move-sequence filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrambleFilter {
    min_chars: usize,
    max_chars: usize,
}

impl ScrambleFilter {
    pub fn new(min_chars: usize, max_chars: usize) -> Self {
        Self {
            min_chars,
            max_chars,
        }
    }

    /// Whether trimmed `text` is a move sequence within the length bounds
    pub fn accepts(&self, text: &str) -> bool {
        let text = text.trim();
        let len = text.chars().count();
        if len < self.min_chars || len > self.max_chars {
            return false;
        }
        MOVE_SEQUENCE.is_match(text)
    }

    /// Turn raw page text into a scramble if it passes the filter
    pub fn check(&self, text: &str) -> Option<Scramble> {
        if self.accepts(text) {
            Scramble::new(text)
        } else {
            None
        }
    }
}

impl Default for ScrambleFilter {
    fn default() -> Self {
        Self::new(3, 200)
    }
}
