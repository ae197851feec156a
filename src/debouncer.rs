//! Debouncing of page change notifications.
//!
//! Timer pages mutate many nodes per frame. Every notification restarts a
//! quiet-period timer and only the trailing notification of a burst becomes a
//! probe, which bounds extraction and solve traffic to one per burst.

use crate::config::TimingConfig;
use crate::types::PageEvent;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

/// Trailing-edge debounce state: the latest value and when it becomes due
#[derive(Debug)]
pub struct Debounce<T> {
    pending: Option<(Instant, T)>,
}

impl<T> Debounce<T> {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Replace any pending value and restart the timer
    pub fn push(&mut self, value: T, delay: Duration) {
        self.pending = Some((Instant::now() + delay, value));
    }

    /// When the pending value fires, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Take the pending value if its deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((deadline, _)) if deadline <= now => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

}

impl<T> Default for Debounce<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns page change notifications into debounced probes
#[derive(Debug, Clone, Copy)]
pub struct MutationDebouncer {
    mutation_delay: Duration,
    navigation_delay: Duration,
}

impl MutationDebouncer {
    pub fn new(mutation_delay: Duration, navigation_delay: Duration) -> Self {
        Self {
            mutation_delay,
            navigation_delay,
        }
    }

    pub fn from_config(timing: &TimingConfig) -> Self {
        Self::new(timing.mutation_delay(), timing.navigation_delay())
    }

    /// Quiet period that follows `event`
    pub fn delay_for(&self, event: PageEvent) -> Duration {
        match event {
            PageEvent::Mutation => self.mutation_delay,
            PageEvent::Navigation => self.navigation_delay,
        }
    }

    /// Run until the event stream closes or the probe receiver is dropped.
    ///
    /// Notifications are dropped while `enabled` reads `false`, and a probe
    /// that comes due while disabled is discarded.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<PageEvent>,
        enabled: watch::Receiver<bool>,
        probes: mpsc::Sender<PageEvent>,
    ) {
        let mut pending = Debounce::new();

        loop {
            let deadline = pending.deadline();

            tokio::select! {
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else {
                        debug!("Page event stream closed, stopping debouncer");
                        break;
                    };

                    if !*enabled.borrow() {
                        trace!("Auto-solve disabled, dropping {:?}", event);
                        pending.cancel();
                        continue;
                    }

                    trace!("{:?} received, probing in {:?}", event, self.delay_for(event));
                    pending.push(event, self.delay_for(event));
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let Some(event) = pending.take_due(Instant::now()) else {
                        continue;
                    };

                    if !*enabled.borrow() {
                        trace!("Auto-solve disabled before probe fired, dropping");
                        continue;
                    }

                    if probes.send(event).await.is_err() {
                        debug!("Probe receiver closed, stopping debouncer");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout};

    struct Harness {
        events: mpsc::Sender<PageEvent>,
        enabled: watch::Sender<bool>,
        probes: mpsc::Receiver<PageEvent>,
    }

    fn spawn_debouncer(enabled: bool) -> Harness {
        let (events_tx, events_rx) = mpsc::channel(16);
        let (enabled_tx, enabled_rx) = watch::channel(enabled);
        let (probes_tx, probes_rx) = mpsc::channel(16);

        let debouncer =
            MutationDebouncer::new(Duration::from_millis(500), Duration::from_millis(1000));
        tokio::spawn(debouncer.run(events_rx, enabled_rx, probes_tx));

        Harness {
            events: events_tx,
            enabled: enabled_tx,
            probes: probes_rx,
        }
    }

    async fn assert_no_probe(probes: &mut mpsc::Receiver<PageEvent>) {
        assert!(timeout(Duration::from_secs(5), probes.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_primitive() {
        let mut debounce = Debounce::new();
        assert!(debounce.deadline().is_none());

        debounce.push(1, Duration::from_millis(100));
        debounce.push(2, Duration::from_millis(100));
        assert!(debounce.take_due(Instant::now()).is_none());

        let deadline = debounce.deadline().unwrap();
        assert_eq!(debounce.take_due(deadline), Some(2));
        assert!(debounce.deadline().is_none());

        debounce.push(3, Duration::from_millis(100));
        debounce.cancel();
        assert!(debounce.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_one_probe() {
        let mut h = spawn_debouncer(true);
        let start = Instant::now();

        h.events.send(PageEvent::Mutation).await.unwrap();
        sleep(Duration::from_millis(200)).await;
        h.events.send(PageEvent::Mutation).await.unwrap();

        assert_eq!(h.probes.recv().await, Some(PageEvent::Mutation));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(700), "fired after {elapsed:?}");
        assert!(elapsed < Duration::from_millis(750), "fired after {elapsed:?}");

        assert_no_probe(&mut h.probes).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_uses_longer_delay() {
        let mut h = spawn_debouncer(true);
        let start = Instant::now();

        h.events.send(PageEvent::Navigation).await.unwrap();

        assert_eq!(h.probes.recv().await, Some(PageEvent::Navigation));
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_each_probe() {
        let mut h = spawn_debouncer(true);

        h.events.send(PageEvent::Mutation).await.unwrap();
        assert_eq!(h.probes.recv().await, Some(PageEvent::Mutation));

        sleep(Duration::from_secs(2)).await;
        h.events.send(PageEvent::Mutation).await.unwrap();
        assert_eq!(h.probes.recv().await, Some(PageEvent::Mutation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_probe_while_disabled() {
        let mut h = spawn_debouncer(false);

        h.events.send(PageEvent::Mutation).await.unwrap();
        assert_no_probe(&mut h.probes).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_before_deadline_drops_probe() {
        let mut h = spawn_debouncer(true);

        h.events.send(PageEvent::Mutation).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        h.enabled.send(false).unwrap();

        assert_no_probe(&mut h.probes).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_events_close() {
        let h = spawn_debouncer(true);
        let Harness {
            events, mut probes, ..
        } = h;
        drop(events);

        assert_eq!(probes.recv().await, None);
    }
}
