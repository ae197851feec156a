//! Core types used throughout the sync engine.
//!
//! This module defines the scramble value, the coordinator state, the
//! request/response records exchanged with the solving service, and the
//! error taxonomy for a solve cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence number attached to every issued solve request
pub type RequestSeq = u64;

/// A scramble as displayed on the timer page.
///
/// Identity is the exact trimmed string; two scrambles are equal iff their
/// trimmed text matches byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scramble(String);

impl Scramble {
    /// Wrap raw page text, returning `None` when nothing is left after trimming
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of whitespace-separated move tokens
    pub fn token_count(&self) -> usize {
        self.0.split_whitespace().count()
    }
}

impl fmt::Display for Scramble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Auto-solve state owned by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Auto-solve is off
    #[default]
    Disabled,
    /// Auto-solve is on and no request is outstanding
    Idle,
    /// A solve request is outstanding
    Processing,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Disabled => "disabled",
            SyncState::Idle => "idle",
            SyncState::Processing => "processing",
        }
    }
}

/// What caused a solve request to be issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOrigin {
    /// Debounced page probe or the probe scheduled by `enable()`
    Auto,
    /// User clicked solve
    Manual,
}

/// A scramble paired with the sequence number used to spot stale responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveRequest {
    pub seq: RequestSeq,
    pub scramble: Scramble,
    pub origin: TriggerOrigin,
}

/// One solution returned by the solving service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Face label, e.g. "D(white)"
    pub face: String,
    pub move_count: u32,
    pub solution_string: String,
    #[serde(default)]
    pub is_optimal: bool,
}

/// Decoded solver response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    /// Solutions in the order the service returned them
    pub solutions: Vec<Solution>,
    /// Service-reported count, falls back to `solutions.len()`
    pub total_solutions: usize,
    pub best_length: u32,
    pub search_time_secs: f64,
    /// Set when the service reported a failure in its body
    pub error: Option<String>,
}

impl SolveResult {
    /// A result that only carries an error message
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            solutions: Vec::new(),
            total_solutions: 0,
            best_length: 0,
            search_time_secs: 0.0,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Change notification pushed by the host page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageEvent {
    /// A batch of DOM mutations (child list or character data)
    Mutation,
    /// The page URL changed (single-page navigation)
    Navigation,
}

/// Read-only copy of the page markup at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    html: String,
}

impl PageSnapshot {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty()
    }
}

/// Errors that can end a solve cycle
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    #[error("Network error: {0}")]
    Network(String),

    #[error(
        "Service error (HTTP {status}): {}",
        .message.as_deref().unwrap_or("no details")
    )]
    Service { status: u16, message: Option<String> },

    #[error("Could not decode solver response: {0}")]
    Decode(String),

    #[error("Solver did not answer within {0}s")]
    Timeout(u64),
}
