//! Shaping of solver results into render-ready models.

use crate::types::{Scramble, SolveResult};
use serde::{Deserialize, Serialize};

/// Clipboard action the overlay can bind to a button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyAction {
    /// Raw solution string to place on the clipboard
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionEntry {
    /// 1-based position in the service's ordering
    pub rank: usize,
    pub face: String,
    pub move_count: u32,
    pub solution_string: String,
    pub is_optimal: bool,
    pub copy: CopyAction,
}

/// What the overlay should display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderModel {
    /// A request for `scramble` is running
    Pending { scramble: String },
    Solutions {
        total_solutions: usize,
        best_length: u32,
        search_time_secs: f64,
        entries: Vec<SolutionEntry>,
        /// "Copy Best" binding, absent when the list is empty
        best: Option<CopyAction>,
    },
    Error { message: String },
}

/// Maps solver results to render models
#[derive(Debug, Clone, Copy)]
pub struct ResultPresenter {
    max_solutions: usize,
}

impl ResultPresenter {
    pub fn new(max_solutions: usize) -> Self {
        Self { max_solutions }
    }

    pub fn pending(&self, scramble: &Scramble) -> RenderModel {
        RenderModel::Pending {
            scramble: scramble.as_str().to_string(),
        }
    }

    /// Cap the list, flag optimal entries and bind "Copy Best" to the first one
    pub fn present(&self, result: &SolveResult) -> RenderModel {
        if let Some(message) = &result.error {
            return RenderModel::Error {
                message: message.clone(),
            };
        }

        let entries: Vec<SolutionEntry> = result
            .solutions
            .iter()
            .take(self.max_solutions)
            .enumerate()
            .map(|(i, solution)| SolutionEntry {
                rank: i + 1,
                face: solution.face.clone(),
                move_count: solution.move_count,
                solution_string: solution.solution_string.clone(),
                is_optimal: solution.is_optimal || solution.move_count == result.best_length,
                copy: CopyAction {
                    text: solution.solution_string.clone(),
                },
            })
            .collect();

        let best = entries.first().map(|entry| entry.copy.clone());

        RenderModel::Solutions {
            total_solutions: result.total_solutions,
            best_length: result.best_length,
            search_time_secs: result.search_time_secs,
            entries,
            best,
        }
    }
}

impl Default for ResultPresenter {
    fn default() -> Self {
        Self::new(10)
    }
}
