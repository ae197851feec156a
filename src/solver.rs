//! Client for the external solving service.
//!
//! The service answers `GET /solve?scramble=<percent-encoded>` with a JSON
//! solution set, or with `{ "error": ... }` on failure. No retries happen
//! here; a failed call is reported once and the coordinator moves on.

use crate::config::SolverConfig;
use crate::types::{Scramble, Solution, SolveError, SolveResult};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Request/response boundary to a solver
#[async_trait]
pub trait Solver: Send + Sync {
    async fn solve(&self, scramble: &Scramble) -> Result<SolveResult, SolveError>;
}

/// Success body as sent by the service
#[derive(Debug, Deserialize)]
struct SolveBody {
    #[serde(default)]
    solutions: Vec<Solution>,
    total_solutions: Option<usize>,
    best_length: Option<u32>,
    search_time: Option<f64>,
    error: Option<String>,
}

/// Error body as sent by the service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP solver backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpSolver {
    client: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
}

impl HttpSolver {
    pub fn new(config: &SolverConfig) -> Result<Self, SolveError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SolveError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Full request URL for `scramble`
    pub fn solve_url(&self, scramble: &Scramble) -> String {
        format!(
            "{}/solve?scramble={}",
            self.base_url,
            urlencoding::encode(scramble.as_str())
        )
    }

    fn transport_error(&self, err: reqwest::Error) -> SolveError {
        if err.is_timeout() {
            SolveError::Timeout(self.timeout_seconds)
        } else {
            SolveError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Solver for HttpSolver {
    async fn solve(&self, scramble: &Scramble) -> Result<SolveResult, SolveError> {
        let url = self.solve_url(scramble);
        debug!("Requesting solutions: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error);
            warn!("Solver returned HTTP {}: {:?}", status.as_u16(), message);
            return Err(SolveError::Service {
                status: status.as_u16(),
                message,
            });
        }

        decode_body(&body)
    }
}

/// Decode a success body into a `SolveResult`
pub(crate) fn decode_body(body: &str) -> Result<SolveResult, SolveError> {
    let parsed: SolveBody =
        serde_json::from_str(body).map_err(|e| SolveError::Decode(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Ok(SolveResult::from_error(error));
    }

    let best_length = parsed
        .best_length
        .ok_or_else(|| SolveError::Decode("missing best_length".to_string()))?;
    let search_time_secs = parsed
        .search_time
        .ok_or_else(|| SolveError::Decode("missing search_time".to_string()))?;

    Ok(SolveResult {
        total_solutions: parsed.total_solutions.unwrap_or(parsed.solutions.len()),
        solutions: parsed.solutions,
        best_length,
        search_time_secs,
        error: None,
    })
}
