//! Scramble Sync - keeps a cube solver in step with a timer page
//!
//! The host page pushes snapshots and change notifications. This crate
//! extracts the displayed scramble, decides whether it is worth solving,
//! calls the external solver and turns the answer into a render model:
//!
//! - **Extraction**: CSS selectors first, then a plain-text scan, all gated
//!   by the move grammar
//! - **Coordination**: at most one request in flight, stale answers dropped
//!   by sequence number
//! - **Transport**: Chrome Native Messaging on stdin/stdout
//!
//! # Architecture
//!
//! `SyncEngine` is a single task that owns all mutable state. Browser
//! messages and solver completions reach it over channels, and it answers
//! with `EngineEvent`s.

pub mod change_detector;
pub mod config;
pub mod coordinator;
pub mod debouncer;
pub mod engine;
pub mod extractors;
pub mod messaging;
pub mod presenter;
pub mod solver;
pub mod types;

// Re-export commonly used types
pub use change_detector::ChangeDetector;
pub use config::Config;
pub use coordinator::{Completion, Delivery, IgnoreReason, SolveCoordinator, TriggerDecision};
pub use debouncer::MutationDebouncer;
pub use engine::{
    ControlCommand, EngineError, EngineEvent, EngineHandle, LatestSnapshot, PageSource,
    SyncEngine,
};
pub use extractors::{ExtractorError, MatcherStrategy, ScrambleExtractor};
pub use messaging::{HostMessage, HostResponse, MessagingError};
pub use presenter::{CopyAction, RenderModel, ResultPresenter, SolutionEntry};
pub use solver::{HttpSolver, Solver};
pub use types::{
    PageEvent, PageSnapshot, RequestSeq, Scramble, Solution, SolveError, SolveRequest,
    SolveResult, SyncState, TriggerOrigin,
};
