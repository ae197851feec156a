//! Event loop tying extraction, coordination and solving together.
//!
//! `SyncEngine` is an actor: one task owns the `SolveCoordinator` and handles
//! control commands, debounced probes and solver completions in arrival
//! order. Solver calls run on spawned tasks and report back by sequence
//! number, so the coordinator is never touched from two places at once.

use crate::config::Config;
use crate::coordinator::{Completion, IgnoreReason, SolveCoordinator, TriggerDecision};
use crate::debouncer::MutationDebouncer;
use crate::extractors::{ExtractorError, ScrambleExtractor};
use crate::presenter::{RenderModel, ResultPresenter};
use crate::solver::Solver;
use crate::types::{
    PageEvent, PageSnapshot, RequestSeq, Scramble, SolveError, SolveRequest, SolveResult,
    SyncState,
};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Shown when the user asks for a solve and the page has no scramble
pub const SCRAMBLE_NOT_FOUND: &str =
    "No scramble found. Make sure a scramble is displayed on the timer page.";

/// Snapshot query supplied by the host page
pub trait PageSource: Send + Sync {
    fn snapshot(&self) -> PageSnapshot;
}

/// Page source holding the most recent snapshot pushed by the browser
#[derive(Debug, Clone, Default)]
pub struct LatestSnapshot {
    inner: Arc<Mutex<PageSnapshot>>,
}

impl LatestSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, snapshot: PageSnapshot) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard = snapshot;
    }
}

impl PageSource for LatestSnapshot {
    fn snapshot(&self) -> PageSnapshot {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Control surface exposed to the overlay chrome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Enable,
    Disable,
    ManualSolve,
}

/// Outbound events for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Render(RenderModel),
    /// Sync state or the auto-solve gate changed
    StateChanged { state: SyncState, auto_enabled: bool },
    /// Blocking user-facing notification
    Notify(String),
}

/// Errors returned by `EngineHandle`
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine has stopped")]
    Closed,
}

/// Cloneable sender side of the engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    control: mpsc::Sender<ControlCommand>,
    page_events: mpsc::Sender<PageEvent>,
}

impl EngineHandle {
    pub async fn enable(&self) -> Result<(), EngineError> {
        self.send_control(ControlCommand::Enable).await
    }

    pub async fn disable(&self) -> Result<(), EngineError> {
        self.send_control(ControlCommand::Disable).await
    }

    pub async fn manual_trigger(&self) -> Result<(), EngineError> {
        self.send_control(ControlCommand::ManualSolve).await
    }

    pub async fn send_control(&self, command: ControlCommand) -> Result<(), EngineError> {
        self.control.send(command).await.map_err(|_| EngineError::Closed)
    }

    /// Report a page change notification
    pub async fn page_changed(&self, event: PageEvent) -> Result<(), EngineError> {
        self.page_events.send(event).await.map_err(|_| EngineError::Closed)
    }

    /// Blocking variant for the native messaging reader thread
    pub fn blocking_control(&self, command: ControlCommand) -> Result<(), EngineError> {
        self.control.blocking_send(command).map_err(|_| EngineError::Closed)
    }

    /// Blocking variant for the native messaging reader thread
    pub fn blocking_page_changed(&self, event: PageEvent) -> Result<(), EngineError> {
        self.page_events.blocking_send(event).map_err(|_| EngineError::Closed)
    }
}

type SolveOutcome = (RequestSeq, Result<SolveResult, SolveError>);

/// State owned by the engine task
struct EngineCore {
    coordinator: SolveCoordinator,
    extractor: ScrambleExtractor,
    presenter: ResultPresenter,
    solver: Arc<dyn Solver>,
    page: Arc<dyn PageSource>,
    events_tx: mpsc::Sender<EngineEvent>,
    enabled_tx: watch::Sender<bool>,
    responses_tx: mpsc::Sender<SolveOutcome>,
    published: (SyncState, bool),
}

/// The sync engine actor
pub struct SyncEngine {
    core: EngineCore,
    debouncer: MutationDebouncer,
    control_rx: mpsc::Receiver<ControlCommand>,
    page_events_rx: mpsc::Receiver<PageEvent>,
    responses_rx: mpsc::Receiver<SolveOutcome>,
}

impl SyncEngine {
    /// Build the engine and the handle used to drive it
    pub fn new(
        config: &Config,
        solver: Arc<dyn Solver>,
        page: Arc<dyn PageSource>,
        events_tx: mpsc::Sender<EngineEvent>,
    ) -> Result<(Self, EngineHandle), ExtractorError> {
        let extractor = ScrambleExtractor::from_config(&config.extraction)?;
        let (control_tx, control_rx) = mpsc::channel(32);
        let (page_events_tx, page_events_rx) = mpsc::channel(256);
        let (responses_tx, responses_rx) = mpsc::channel(8);
        let (enabled_tx, _) = watch::channel(false);

        let core = EngineCore {
            coordinator: SolveCoordinator::new(),
            extractor,
            presenter: ResultPresenter::new(config.presentation.max_solutions),
            solver,
            page,
            events_tx,
            enabled_tx,
            responses_tx,
            published: (SyncState::Disabled, false),
        };

        let engine = Self {
            core,
            debouncer: MutationDebouncer::from_config(&config.timing),
            control_rx,
            page_events_rx,
            responses_rx,
        };
        let handle = EngineHandle {
            control: control_tx,
            page_events: page_events_tx,
        };

        Ok((engine, handle))
    }

    /// Process events until every `EngineHandle` is dropped
    pub async fn run(self) {
        let SyncEngine {
            mut core,
            debouncer,
            mut control_rx,
            page_events_rx,
            mut responses_rx,
        } = self;

        let (probe_tx, mut probe_rx) = mpsc::channel(16);
        tokio::spawn(debouncer.run(page_events_rx, core.enabled_tx.subscribe(), probe_tx));

        info!("Sync engine running");

        loop {
            tokio::select! {
                command = control_rx.recv() => match command {
                    Some(command) => core.handle_command(command).await,
                    None => {
                        debug!("All engine handles dropped");
                        break;
                    }
                },
                Some(event) = probe_rx.recv() => {
                    trace!("Debounced probe after {:?}", event);
                    core.probe_page().await;
                }
                Some((seq, outcome)) = responses_rx.recv() => {
                    core.handle_outcome(seq, outcome).await;
                }
                else => break,
            }
        }

        info!("Sync engine stopped");
    }
}

impl EngineCore {
    async fn handle_command(&mut self, command: ControlCommand) {
        debug!("Control command: {:?}", command);
        match command {
            ControlCommand::Enable => {
                let probe_now = self.coordinator.enable();
                self.publish_state().await;
                if probe_now {
                    self.probe_page().await;
                }
            }
            ControlCommand::Disable => {
                self.coordinator.disable();
                self.publish_state().await;
            }
            ControlCommand::ManualSolve => {
                let candidate = self.extract();
                match self.coordinator.manual_trigger(candidate) {
                    TriggerDecision::Issue(request) => self.dispatch(request).await,
                    TriggerDecision::Ignored(IgnoreReason::NoScramble) => {
                        info!("Manual solve requested but no scramble on page");
                        self.emit(EngineEvent::Notify(SCRAMBLE_NOT_FOUND.to_string()))
                            .await;
                    }
                    TriggerDecision::Ignored(reason) => {
                        debug!("Manual solve ignored: {:?}", reason);
                    }
                }
            }
        }
    }

    /// Extract the current scramble and offer it to the coordinator
    async fn probe_page(&mut self) {
        let candidate = self.extract();
        match self.coordinator.probe(candidate) {
            TriggerDecision::Issue(request) => self.dispatch(request).await,
            TriggerDecision::Ignored(reason) => trace!("Probe ignored: {:?}", reason),
        }
    }

    fn extract(&self) -> Option<Scramble> {
        self.extractor.extract(&self.page.snapshot())
    }

    async fn dispatch(&mut self, request: SolveRequest) {
        self.emit(EngineEvent::Render(self.presenter.pending(&request.scramble)))
            .await;
        self.publish_state().await;

        let solver = Arc::clone(&self.solver);
        let responses = self.responses_tx.clone();
        tokio::spawn(async move {
            let outcome = solver.solve(&request.scramble).await;
            if responses.send((request.seq, outcome)).await.is_err() {
                debug!("Engine stopped before response #{} arrived", request.seq);
            }
        });
    }

    async fn handle_outcome(&mut self, seq: RequestSeq, outcome: Result<SolveResult, SolveError>) {
        let completion = match outcome {
            Ok(result) => self.coordinator.on_response(seq, result),
            Err(err) => {
                warn!("Solve request #{} failed: {}", seq, err);
                self.coordinator.on_response_error(seq, err)
            }
        };

        let delivery = match completion {
            Completion::Stale => return,
            Completion::Delivered(delivery) => delivery,
        };

        self.emit(EngineEvent::Render(self.presenter.present(&delivery.result)))
            .await;
        if delivery.needs_user_notice() {
            let reason = match &delivery.failure {
                Some(err) => err.to_string(),
                None => delivery
                    .result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            };
            self.emit(EngineEvent::Notify(format!("Solve failed: {reason}")))
                .await;
        }
        self.publish_state().await;

        if delivery.reprobe {
            self.probe_page().await;
        }
    }

    /// Push the probe gate and announce state changes
    async fn publish_state(&mut self) {
        let auto_enabled = self.coordinator.auto_enabled();
        self.enabled_tx.send_replace(auto_enabled);

        let state = self.coordinator.state();
        if (state, auto_enabled) != self.published {
            self.published = (state, auto_enabled);
            self.emit(EngineEvent::StateChanged {
                state,
                auto_enabled,
            })
            .await;
        }
    }

    async fn emit(&self, event: EngineEvent) {
        if self.events_tx.send(event).await.is_err() {
            warn!("Event receiver closed, dropping engine event");
        }
    }
}
