//! Change detection for extracted scrambles.
//!
//! A probe only leads to a solve when the extracted scramble differs from the
//! last accepted one. Identity is the exact trimmed text.

use crate::types::Scramble;
use tracing::trace;

/// Whether `candidate` is a new scramble relative to `last_known`
///
/// Returns `true` iff the candidate is present, non-empty after trimming, and
/// differs from the last accepted value.
pub fn accept(candidate: Option<&str>, last_known: Option<&str>) -> bool {
    let candidate = match candidate.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => return false,
    };

    match last_known.map(str::trim) {
        Some(prev) => candidate != prev,
        None => true,
    }
}

/// Holds the last accepted scramble
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    last_known: Option<Scramble>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a candidate against the last accepted scramble without recording it
    pub fn has_changed(&self, candidate: Option<&Scramble>) -> bool {
        let changed = accept(
            candidate.map(Scramble::as_str),
            self.last_known.as_ref().map(Scramble::as_str),
        );
        if !changed {
            trace!("Scramble unchanged or missing, ignoring probe");
        }
        changed
    }

    /// Record `scramble` as the last accepted value
    pub fn commit(&mut self, scramble: Scramble) {
        self.last_known = Some(scramble);
    }

    /// Forget the last accepted value
    pub fn clear(&mut self) {
        self.last_known = None;
    }

    pub fn last_known(&self) -> Option<&Scramble> {
        self.last_known.as_ref()
    }
}
