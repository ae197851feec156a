//! Single-flight solve coordination.
//!
//! `SolveCoordinator` is the only owner of the sync state, the last accepted
//! scramble and the request sequence counter. It performs no I/O: every entry
//! point returns a decision that the engine acts on, which keeps the state
//! machine synchronous and directly testable.
//!
//! States: `Disabled` (initial) -> `Idle` -> `Processing` -> `Idle`, and any
//! state -> `Disabled` on `disable()`. At most one request is live at a time;
//! a response is applied only when its sequence number is the live one.

use crate::change_detector::ChangeDetector;
use crate::types::{
    RequestSeq, Scramble, SolveError, SolveRequest, SolveResult, SyncState, TriggerOrigin,
};
use tracing::{debug, info, trace};

/// Why a probe or manual trigger did not issue a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Auto-solve is off
    Disabled,
    /// A request is already live
    Busy,
    /// No scramble on the page
    NoScramble,
    /// Scramble equals the last accepted one
    Unchanged,
}

/// Outcome of `probe` or `manual_trigger`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    Issue(SolveRequest),
    Ignored(IgnoreReason),
}

impl TriggerDecision {
    pub fn request(&self) -> Option<&SolveRequest> {
        match self {
            TriggerDecision::Issue(request) => Some(request),
            TriggerDecision::Ignored(_) => None,
        }
    }
}

/// A live response, ready for presentation
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub seq: RequestSeq,
    pub origin: TriggerOrigin,
    pub result: SolveResult,
    /// Transport or decoding failure behind an error result
    pub failure: Option<SolveError>,
    /// A probe was dropped while busy; probe again now that we are idle
    pub reprobe: bool,
}

impl Delivery {
    /// Manual solves that fail get a blocking notification on top of the error model
    pub fn needs_user_notice(&self) -> bool {
        self.origin == TriggerOrigin::Manual && self.result.is_error()
    }
}

/// Outcome of `on_response` and `on_response_error`
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Sequence number is not the live request; nothing changed
    Stale,
    Delivered(Delivery),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    seq: RequestSeq,
    origin: TriggerOrigin,
}

/// Owner of the sync state machine
#[derive(Debug)]
pub struct SolveCoordinator {
    state: SyncState,
    detector: ChangeDetector,
    last_seq: RequestSeq,
    in_flight: Option<InFlight>,
    /// State entered when the live request completes
    resume_to: SyncState,
    probe_missed: bool,
}

impl SolveCoordinator {
    pub fn new() -> Self {
        Self {
            state: SyncState::Disabled,
            detector: ChangeDetector::new(),
            last_seq: 0,
            in_flight: None,
            resume_to: SyncState::Disabled,
            probe_missed: false,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn last_known(&self) -> Option<&Scramble> {
        self.detector.last_known()
    }

    /// Sequence number of the live request, if any
    pub fn in_flight(&self) -> Option<RequestSeq> {
        self.in_flight.map(|f| f.seq)
    }

    /// Highest sequence number issued so far
    pub fn latest_seq(&self) -> RequestSeq {
        self.last_seq
    }

    /// Whether page probes should currently be produced
    pub fn auto_enabled(&self) -> bool {
        match self.state {
            SyncState::Disabled => false,
            SyncState::Idle => true,
            SyncState::Processing => self.resume_to == SyncState::Idle,
        }
    }

    /// Turn auto-solve on. Returns `true` when the caller should probe now.
    pub fn enable(&mut self) -> bool {
        match self.state {
            SyncState::Disabled => {
                info!("Auto-solve enabled");
                self.state = SyncState::Idle;
                self.resume_to = SyncState::Idle;
                true
            }
            SyncState::Processing if self.resume_to == SyncState::Disabled => {
                // Manual one-shot in flight: become idle afterwards and look again
                info!("Auto-solve enabled while a manual solve is running");
                self.resume_to = SyncState::Idle;
                self.probe_missed = true;
                false
            }
            _ => {
                trace!("Auto-solve already enabled");
                false
            }
        }
    }

    /// Turn auto-solve off from any state.
    ///
    /// Forgets the last accepted scramble and the live request, so a late
    /// response for it is treated as stale.
    pub fn disable(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            debug!("Abandoning request #{} on disable", in_flight.seq);
        }
        info!("Auto-solve disabled");
        self.state = SyncState::Disabled;
        self.resume_to = SyncState::Disabled;
        self.probe_missed = false;
        self.detector.clear();
    }

    /// Handle a debounced page probe carrying the freshly extracted scramble
    pub fn probe(&mut self, candidate: Option<Scramble>) -> TriggerDecision {
        match self.state {
            SyncState::Disabled => TriggerDecision::Ignored(IgnoreReason::Disabled),
            SyncState::Processing => {
                if self.resume_to == SyncState::Idle {
                    trace!("Probe while processing, will look again when idle");
                    self.probe_missed = true;
                    TriggerDecision::Ignored(IgnoreReason::Busy)
                } else {
                    TriggerDecision::Ignored(IgnoreReason::Disabled)
                }
            }
            SyncState::Idle => {
                if !self.detector.has_changed(candidate.as_ref()) {
                    let reason = if candidate.is_none() {
                        IgnoreReason::NoScramble
                    } else {
                        IgnoreReason::Unchanged
                    };
                    return TriggerDecision::Ignored(reason);
                }

                let Some(scramble) = candidate else {
                    return TriggerDecision::Ignored(IgnoreReason::NoScramble);
                };
                self.detector.commit(scramble.clone());
                TriggerDecision::Issue(self.issue(scramble, TriggerOrigin::Auto))
            }
        }
    }

    /// Handle a user-initiated solve.
    ///
    /// Skips the duplicate check but not the single-flight rule. Works with
    /// auto-solve off as a one-shot that returns to `Disabled` afterwards.
    pub fn manual_trigger(&mut self, candidate: Option<Scramble>) -> TriggerDecision {
        if self.state == SyncState::Processing {
            debug!("Manual solve ignored, request #{} still running", self.last_seq);
            return TriggerDecision::Ignored(IgnoreReason::Busy);
        }

        let Some(scramble) = candidate else {
            return TriggerDecision::Ignored(IgnoreReason::NoScramble);
        };

        if self.state == SyncState::Idle {
            self.detector.commit(scramble.clone());
        }
        self.resume_to = self.state;
        TriggerDecision::Issue(self.issue(scramble, TriggerOrigin::Manual))
    }

    /// Apply a solver response
    pub fn on_response(&mut self, seq: RequestSeq, result: SolveResult) -> Completion {
        self.complete(seq, result, None)
    }

    /// Apply a solver failure; the live path forwards an error result
    pub fn on_response_error(&mut self, seq: RequestSeq, error: SolveError) -> Completion {
        let result = SolveResult::from_error(error.to_string());
        self.complete(seq, result, Some(error))
    }

    fn issue(&mut self, scramble: Scramble, origin: TriggerOrigin) -> SolveRequest {
        self.last_seq += 1;
        self.in_flight = Some(InFlight {
            seq: self.last_seq,
            origin,
        });
        self.state = SyncState::Processing;

        info!(
            "Issuing solve request #{} ({:?}, {} moves): {}",
            self.last_seq,
            origin,
            scramble.token_count(),
            scramble
        );
        SolveRequest {
            seq: self.last_seq,
            scramble,
            origin,
        }
    }

    fn complete(
        &mut self,
        seq: RequestSeq,
        result: SolveResult,
        failure: Option<SolveError>,
    ) -> Completion {
        let live = match self.in_flight {
            Some(in_flight) if in_flight.seq == seq && seq == self.last_seq => in_flight,
            _ => {
                debug!("Discarding stale response #{} (latest #{})", seq, self.last_seq);
                return Completion::Stale;
            }
        };

        self.in_flight = None;
        self.state = self.resume_to;
        let reprobe = self.probe_missed && self.state == SyncState::Idle;
        self.probe_missed = false;

        debug!("Request #{} completed, now {}", seq, self.state.as_str());
        Completion::Delivered(Delivery {
            seq,
            origin: live.origin,
            result,
            failure,
            reprobe,
        })
    }
}

impl Default for SolveCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scramble(text: &str) -> Option<Scramble> {
        Scramble::new(text)
    }

    fn ok_result() -> SolveResult {
        SolveResult {
            solutions: Vec::new(),
            total_solutions: 0,
            best_length: 6,
            search_time_secs: 0.01,
            error: None,
        }
    }

    fn issued_seq(decision: &TriggerDecision) -> RequestSeq {
        decision.request().expect("request issued").seq
    }

    #[test]
    fn test_initial_state() {
        let coordinator = SolveCoordinator::new();
        assert_eq!(coordinator.state(), SyncState::Disabled);
        assert!(coordinator.last_known().is_none());
        assert!(!coordinator.auto_enabled());
    }

    #[test]
    fn test_enable_requests_probe_once() {
        let mut coordinator = SolveCoordinator::new();
        assert!(coordinator.enable());
        assert_eq!(coordinator.state(), SyncState::Idle);
        assert!(!coordinator.enable());
    }

    #[test]
    fn test_probe_ignored_while_disabled() {
        let mut coordinator = SolveCoordinator::new();
        assert_eq!(
            coordinator.probe(scramble("R U")),
            TriggerDecision::Ignored(IgnoreReason::Disabled)
        );
        assert!(coordinator.last_known().is_none());
    }

    #[test]
    fn test_probe_issues_and_completes() {
        let mut coordinator = SolveCoordinator::new();
        coordinator.enable();

        let decision = coordinator.probe(scramble("R U R' U'"));
        let request = decision.request().unwrap();
        assert_eq!(request.seq, 1);
        assert_eq!(request.origin, TriggerOrigin::Auto);
        assert_eq!(coordinator.state(), SyncState::Processing);
        assert_eq!(coordinator.last_known(), scramble("R U R' U'").as_ref());

        match coordinator.on_response(1, ok_result()) {
            Completion::Delivered(delivery) => {
                assert_eq!(delivery.seq, 1);
                assert!(!delivery.reprobe);
                assert!(!delivery.needs_user_notice());
            }
            Completion::Stale => panic!("live response treated as stale"),
        }
        assert_eq!(coordinator.state(), SyncState::Idle);
    }

    #[test]
    fn test_duplicate_and_missing_probes() {
        let mut coordinator = SolveCoordinator::new();
        coordinator.enable();
        let seq = issued_seq(&coordinator.probe(scramble("F2 B")));
        coordinator.on_response(seq, ok_result());

        assert_eq!(
            coordinator.probe(scramble("F2 B")),
            TriggerDecision::Ignored(IgnoreReason::Unchanged)
        );
        assert_eq!(
            coordinator.probe(None),
            TriggerDecision::Ignored(IgnoreReason::NoScramble)
        );
        assert_eq!(coordinator.state(), SyncState::Idle);
    }

    #[test]
    fn test_probe_while_processing_schedules_reprobe() {
        let mut coordinator = SolveCoordinator::new();
        coordinator.enable();
        let seq = issued_seq(&coordinator.probe(scramble("R U")));

        assert_eq!(
            coordinator.probe(scramble("L D")),
            TriggerDecision::Ignored(IgnoreReason::Busy)
        );

        match coordinator.on_response(seq, ok_result()) {
            Completion::Delivered(delivery) => assert!(delivery.reprobe),
            Completion::Stale => panic!("expected delivery"),
        }
    }

    #[test]
    fn test_manual_trigger_single_flight() {
        let mut coordinator = SolveCoordinator::new();
        coordinator.enable();
        coordinator.probe(scramble("R U"));

        assert_eq!(
            coordinator.manual_trigger(scramble("R U")),
            TriggerDecision::Ignored(IgnoreReason::Busy)
        );
        assert_eq!(coordinator.latest_seq(), 1);
    }

    #[test]
    fn test_manual_trigger_resolves_same_scramble() {
        let mut coordinator = SolveCoordinator::new();
        coordinator.enable();
        let seq = issued_seq(&coordinator.probe(scramble("R U")));
        coordinator.on_response(seq, ok_result());

        let decision = coordinator.manual_trigger(scramble("R U"));
        assert_eq!(decision.request().unwrap().origin, TriggerOrigin::Manual);
        assert_eq!(
            coordinator.manual_trigger(None),
            TriggerDecision::Ignored(IgnoreReason::Busy)
        );
    }

    #[test]
    fn test_manual_trigger_without_scramble() {
        let mut coordinator = SolveCoordinator::new();
        assert_eq!(
            coordinator.manual_trigger(None),
            TriggerDecision::Ignored(IgnoreReason::NoScramble)
        );
        assert_eq!(coordinator.state(), SyncState::Disabled);
    }

    #[test]
    fn test_manual_one_shot_while_disabled() {
        let mut coordinator = SolveCoordinator::new();
        let seq = issued_seq(&coordinator.manual_trigger(scramble("U2 F")));
        assert_eq!(coordinator.state(), SyncState::Processing);
        assert!(!coordinator.auto_enabled());
        assert!(coordinator.last_known().is_none());

        let completion = coordinator.on_response_error(seq, SolveError::Network("refused".into()));
        match completion {
            Completion::Delivered(delivery) => {
                assert!(delivery.needs_user_notice());
                assert_eq!(delivery.failure, Some(SolveError::Network("refused".into())));
                assert!(!delivery.reprobe);
            }
            Completion::Stale => panic!("expected delivery"),
        }
        assert_eq!(coordinator.state(), SyncState::Disabled);
    }

    #[test]
    fn test_enable_during_manual_one_shot() {
        let mut coordinator = SolveCoordinator::new();
        let seq = issued_seq(&coordinator.manual_trigger(scramble("U2 F")));

        assert!(!coordinator.enable());
        assert!(coordinator.auto_enabled());

        match coordinator.on_response(seq, ok_result()) {
            Completion::Delivered(delivery) => assert!(delivery.reprobe),
            Completion::Stale => panic!("expected delivery"),
        }
        assert_eq!(coordinator.state(), SyncState::Idle);
    }

    #[test]
    fn test_error_response_returns_to_idle() {
        let mut coordinator = SolveCoordinator::new();
        coordinator.enable();
        let seq = issued_seq(&coordinator.probe(scramble("R U")));

        let completion = coordinator.on_response_error(
            seq,
            SolveError::Service {
                status: 500,
                message: None,
            },
        );
        match completion {
            Completion::Delivered(delivery) => {
                assert!(delivery.result.is_error());
                assert!(!delivery.needs_user_notice());
            }
            Completion::Stale => panic!("expected delivery"),
        }
        assert_eq!(coordinator.state(), SyncState::Idle);
        assert_eq!(coordinator.last_known(), scramble("R U").as_ref());
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut coordinator = SolveCoordinator::new();
        coordinator.enable();
        let first = issued_seq(&coordinator.probe(scramble("R U")));

        // Disable and re-enable while #1 is still out, then issue #2
        coordinator.disable();
        coordinator.enable();
        let second = issued_seq(&coordinator.probe(scramble("F D")));
        assert_eq!((first, second), (1, 2));

        match coordinator.on_response(second, ok_result()) {
            Completion::Delivered(delivery) => assert_eq!(delivery.seq, 2),
            Completion::Stale => panic!("latest response treated as stale"),
        }
        let state = coordinator.state();
        let last_known = coordinator.last_known().cloned();

        assert_eq!(coordinator.on_response(first, ok_result()), Completion::Stale);
        assert_eq!(coordinator.state(), state);
        assert_eq!(coordinator.last_known().cloned(), last_known);
    }

    #[test]
    fn test_disable_while_processing() {
        let mut coordinator = SolveCoordinator::new();
        coordinator.enable();
        let seq = issued_seq(&coordinator.probe(scramble("R U R' U' F2 B L2")));

        coordinator.disable();
        assert_eq!(coordinator.state(), SyncState::Disabled);
        assert!(coordinator.last_known().is_none());

        assert_eq!(coordinator.on_response(seq, ok_result()), Completion::Stale);
        assert_eq!(coordinator.state(), SyncState::Disabled);
        assert!(coordinator.last_known().is_none());
        assert!(!coordinator.auto_enabled());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enable,
        Disable,
        Probe(u8),
        Manual(u8),
        Respond(usize),
        Fail(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Enable),
            Just(Op::Disable),
            (0..4u8).prop_map(Op::Probe),
            (0..4u8).prop_map(Op::Manual),
            any::<usize>().prop_map(Op::Respond),
            any::<usize>().prop_map(Op::Fail),
        ]
    }

    fn candidate(n: u8) -> Option<Scramble> {
        match n {
            0 => None,
            1 => scramble("R U"),
            2 => scramble("F2 D'"),
            _ => scramble("L B2 U'"),
        }
    }

    proptest! {
        #[test]
        fn prop_never_two_live_requests(ops in prop::collection::vec(op(), 1..60)) {
            let mut coordinator = SolveCoordinator::new();
            let mut issued: Vec<RequestSeq> = Vec::new();

            for op in ops {
                let live_before = coordinator.in_flight();
                let decision = match op {
                    Op::Enable => { coordinator.enable(); None }
                    Op::Disable => { coordinator.disable(); None }
                    Op::Probe(n) => Some(coordinator.probe(candidate(n))),
                    Op::Manual(n) => Some(coordinator.manual_trigger(candidate(n))),
                    Op::Respond(i) if !issued.is_empty() => {
                        let seq = issued[i % issued.len()];
                        let completion = coordinator.on_response(seq, ok_result());
                        if Some(seq) != live_before {
                            prop_assert_eq!(completion, Completion::Stale);
                        }
                        None
                    }
                    Op::Fail(i) if !issued.is_empty() => {
                        let seq = issued[i % issued.len()];
                        coordinator.on_response_error(seq, SolveError::Decode("bad".into()));
                        None
                    }
                    Op::Respond(_) | Op::Fail(_) => None,
                };

                if let Some(TriggerDecision::Issue(request)) = decision {
                    prop_assert!(live_before.is_none(), "issued #{} while #{:?} live", request.seq, live_before);
                    prop_assert!(issued.last().map_or(true, |last| *last < request.seq));
                    issued.push(request.seq);
                }

                prop_assert_eq!(
                    coordinator.state() == SyncState::Processing,
                    coordinator.in_flight().is_some()
                );
            }
        }
    }
}
