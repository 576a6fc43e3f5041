// Response wait - decides when an asynchronous chat reply has finished
//
// The page gives no completion event, so readiness is inferred from three
// weak signals combined with OR semantics:
//
// - the working indicator appeared, then cleared, and a stabilization
//   sub-loop saw the body text grow past the threshold;
// - more message-like elements than at the start;
// - body text grown past the threshold with no indicator on the page.
//
// The signals race (element growth can fire before the indicator sub-loop
// confirms anything) and no priority is defined between them. A ready outcome
// means "probably done".

use super::snapshot::{PageProbe, PageSnapshot};
use crate::error::{Error, Result};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Phrase the chat shows while the agent is working
pub const WORKING_INDICATOR: &str = "Working on it";

/// Elements counted as chat messages
pub const MESSAGE_SELECTOR: &str = r#"[class*="message"], [class*="chat"], [role="article"]"#;

/// Shortest poll interval or stabilization delay; zero would never advance
/// the elapsed clock.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Tunables for [`ResponseWaiter`]
#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub indicator: String,
    pub message_selector: String,
    /// Ceiling on total polling time
    pub max_wait: Duration,
    pub poll_interval: Duration,
    /// Extra snapshots taken once the indicator clears
    pub stabilization_attempts: u32,
    pub stabilization_delay: Duration,
    /// Text growth over the initial snapshot, in characters, that counts as a reply
    pub growth_threshold: usize,
    /// Pause after readiness so the reply finishes rendering
    pub render_settle: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            indicator: WORKING_INDICATOR.to_string(),
            message_selector: MESSAGE_SELECTOR.to_string(),
            max_wait: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            stabilization_attempts: 15,
            stabilization_delay: Duration::from_secs(2),
            growth_threshold: 300,
            render_settle: Duration::from_secs(3),
        }
    }
}

impl WaitConfig {
    /// Sets the polling ceiling and interval. The interval is raised to
    /// [`MIN_INTERVAL`] if shorter.
    pub fn with_polling(mut self, max_wait: Duration, poll_interval: Duration) -> Self {
        self.max_wait = max_wait;
        self.poll_interval = poll_interval.max(MIN_INTERVAL);
        self
    }

    /// Sets the stabilization sub-loop bounds. The delay is raised to
    /// [`MIN_INTERVAL`] if shorter.
    pub fn with_stabilization(mut self, attempts: u32, delay: Duration) -> Self {
        self.stabilization_attempts = attempts;
        self.stabilization_delay = delay.max(MIN_INTERVAL);
        self
    }

    pub fn with_render_settle(mut self, settle: Duration) -> Self {
        self.render_settle = settle;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaitState {
    AwaitingIndicator,
    IndicatorActive,
    IndicatorCleared,
    StabilizationWait,
    ResponseReady,
    TimedOut,
}

/// Which heuristic declared the response ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadinessSignal {
    IndicatorCleared,
    MessageCountGrowth,
    TextGrowth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub state: WaitState,
    pub elapsed_seconds: u64,
}

/// Mutable state of one wait call.
///
/// The flags only move forward: `cleared` requires `seen`, and `detected`
/// is never reset.
#[derive(Debug, Clone)]
pub struct PollState {
    initial_snapshot: PageSnapshot,
    last_snapshot: PageSnapshot,
    elapsed: Duration,
    working_indicator_seen: bool,
    working_indicator_cleared: bool,
    response_detected: bool,
}

impl PollState {
    fn new(initial: PageSnapshot) -> Self {
        Self {
            last_snapshot: initial.clone(),
            initial_snapshot: initial,
            elapsed: Duration::ZERO,
            working_indicator_seen: false,
            working_indicator_cleared: false,
            response_detected: false,
        }
    }

    pub fn initial_snapshot(&self) -> &PageSnapshot {
        &self.initial_snapshot
    }

    pub fn last_snapshot(&self) -> &PageSnapshot {
        &self.last_snapshot
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.as_secs()
    }

    pub fn working_indicator_seen(&self) -> bool {
        self.working_indicator_seen
    }

    pub fn working_indicator_cleared(&self) -> bool {
        self.working_indicator_cleared
    }

    pub fn response_detected(&self) -> bool {
        self.response_detected
    }

    fn advance(&mut self, by: Duration, ceiling: Duration) {
        self.elapsed = (self.elapsed + by).min(ceiling);
    }

    fn observe(&mut self, snapshot: PageSnapshot) {
        self.last_snapshot = snapshot;
    }

    fn mark_seen(&mut self) -> bool {
        if self.working_indicator_seen {
            return false;
        }
        self.working_indicator_seen = true;
        true
    }

    fn mark_cleared(&mut self) -> bool {
        if !self.working_indicator_seen || self.working_indicator_cleared {
            return false;
        }
        self.working_indicator_cleared = true;
        true
    }

    fn mark_detected(&mut self) {
        self.response_detected = true;
    }

    /// Characters added since the initial snapshot (zero if the page shrank).
    fn text_growth(&self, snapshot: &PageSnapshot) -> usize {
        snapshot
            .text_len()
            .saturating_sub(self.initial_snapshot.text_len())
    }
}

/// Result of [`ResponseWaiter::wait`]
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    /// `ResponseReady` or `TimedOut`
    pub state: WaitState,
    pub signal: Option<ReadinessSignal>,
    pub poll: PollState,
    pub transitions: Vec<Transition>,
    pub snapshots_taken: usize,
    pub response_time: Duration,
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        self.state == WaitState::ResponseReady
    }

    /// [`Error::TimedOut`] when no readiness signal fired.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(Error::TimedOut {
                elapsed_secs: self.poll.elapsed_seconds(),
            })
        }
    }
}

/// Polls a page until a submitted question has been answered.
#[derive(Debug, Clone, Default)]
pub struct ResponseWaiter {
    config: WaitConfig,
}

impl ResponseWaiter {
    pub fn new(config: WaitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Runs the poll loop against `probe`.
    ///
    /// Only probe failures are errors; hitting the ceiling is reported as a
    /// `TimedOut` outcome so the caller can still extract from the page.
    pub async fn wait<P>(&self, probe: &P) -> Result<WaitOutcome>
    where
        P: PageProbe + ?Sized,
    {
        let config = &self.config;
        let poll_interval = config.poll_interval.max(MIN_INTERVAL);
        let stabilization_delay = config.stabilization_delay.max(MIN_INTERVAL);
        let start = Instant::now();

        let initial = probe.snapshot().await?;
        tracing::info!(
            "Initial state: {} messages, {} chars",
            initial.message_element_count,
            initial.text_len()
        );

        let mut run = Run {
            poll: PollState::new(initial),
            transitions: Vec::new(),
            snapshots_taken: 1,
        };
        run.enter(WaitState::AwaitingIndicator);

        let mut signal = None;

        'outer: while run.poll.elapsed < config.max_wait {
            tokio::time::sleep(poll_interval).await;
            run.poll.advance(poll_interval, config.max_wait);
            let current = run.take(probe).await?;

            let indicator_present = current.contains(&config.indicator);
            if indicator_present && run.poll.mark_seen() {
                run.enter(WaitState::IndicatorActive);
            }

            if !indicator_present && run.poll.mark_cleared() {
                run.enter(WaitState::IndicatorCleared);
                run.enter(WaitState::StabilizationWait);

                for attempt in 1..=config.stabilization_attempts {
                    if run.poll.elapsed >= config.max_wait {
                        break;
                    }
                    tokio::time::sleep(stabilization_delay).await;
                    run.poll.advance(stabilization_delay, config.max_wait);
                    let check = run.take(probe).await?;
                    let growth = run.poll.text_growth(&check);
                    tracing::debug!(
                        "Stabilization {}/{}: {} chars (+{})",
                        attempt,
                        config.stabilization_attempts,
                        check.text_len(),
                        growth
                    );

                    if growth > config.growth_threshold && !check.contains(&config.indicator) {
                        signal = Some(ReadinessSignal::IndicatorCleared);
                        break 'outer;
                    }
                }

                tracing::warn!("Stabilization window exhausted, resuming polling");
                run.enter(WaitState::IndicatorCleared);
            }

            let last = run.poll.last_snapshot().clone();
            let initial_count = run.poll.initial_snapshot().message_element_count;
            if last.message_element_count > initial_count {
                tracing::info!(
                    "New message detected ({} -> {})",
                    initial_count,
                    last.message_element_count
                );
                signal = Some(ReadinessSignal::MessageCountGrowth);
                break;
            }

            let growth = run.poll.text_growth(&last);
            if growth > config.growth_threshold && !last.contains(&config.indicator) {
                tracing::info!("Page text grew by {} chars", growth);
                signal = Some(ReadinessSignal::TextGrowth);
                break;
            }

            tracing::debug!(
                "Waiting... {}s, {} messages, {} chars",
                run.poll.elapsed_seconds(),
                last.message_element_count,
                last.text_len()
            );
        }

        let state = match signal {
            Some(signal) => {
                run.poll.mark_detected();
                run.enter(WaitState::ResponseReady);
                tracing::info!("Response ready via {:?}", signal);
                tokio::time::sleep(config.render_settle).await;
                WaitState::ResponseReady
            }
            None => {
                run.enter(WaitState::TimedOut);
                tracing::warn!(
                    "No readiness signal after {}s",
                    run.poll.elapsed_seconds()
                );
                WaitState::TimedOut
            }
        };

        Ok(WaitOutcome {
            state,
            signal,
            poll: run.poll,
            transitions: run.transitions,
            snapshots_taken: run.snapshots_taken,
            response_time: start.elapsed(),
        })
    }
}

/// Bookkeeping for a single wait call
struct Run {
    poll: PollState,
    transitions: Vec<Transition>,
    snapshots_taken: usize,
}

impl Run {
    fn enter(&mut self, state: WaitState) {
        let elapsed_seconds = self.poll.elapsed_seconds();
        if !matches!(state, WaitState::AwaitingIndicator) {
            tracing::info!("{:?} at {}s", state, elapsed_seconds);
        }
        self.transitions.push(Transition {
            state,
            elapsed_seconds,
        });
    }

    async fn take<P>(&mut self, probe: &P) -> Result<PageSnapshot>
    where
        P: PageProbe + ?Sized,
    {
        let snapshot = probe.snapshot().await?;
        self.snapshots_taken += 1;
        self.poll.observe(snapshot.clone());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::snapshot::TextElement;
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Timeline = Box<dyn Fn(u64) -> (String, usize) + Send + Sync>;

    /// Serves page states as a function of seconds since creation.
    struct ScriptedProbe {
        start: Instant,
        timeline: Timeline,
        calls: Mutex<Vec<u64>>,
    }

    impl ScriptedProbe {
        fn new(timeline: impl Fn(u64) -> (String, usize) + Send + Sync + 'static) -> Self {
            Self {
                start: Instant::now(),
                timeline: Box::new(timeline),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_times(&self) -> Vec<u64> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageProbe for ScriptedProbe {
        async fn snapshot(&self) -> Result<PageSnapshot> {
            let t = self.start.elapsed().as_secs();
            self.calls.lock().unwrap().push(t);
            let (text, count) = (self.timeline)(t);
            Ok(PageSnapshot::new(text, count))
        }

        async fn text_elements(&self) -> Result<Vec<TextElement>> {
            Ok(Vec::new())
        }
    }

    const BASE: &str = "NetMind XYZ\nI am Claudia\n列出knowledge-base目錄下的檔案";

    fn states(outcome: &WaitOutcome) -> Vec<(WaitState, u64)> {
        outcome
            .transitions
            .iter()
            .map(|t| (t.state, t.elapsed_seconds))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_indicator_then_growth_is_ready_via_indicator() {
        let probe = ScriptedProbe::new(|t| {
            let text = match t {
                0..4 => BASE.to_string(),
                4..10 => format!("{}\nWorking on it...", BASE),
                10..12 => BASE.to_string(),
                _ => format!("{}\n{}", BASE, "x".repeat(500)),
            };
            (text, 3)
        });

        let outcome = ResponseWaiter::default().wait(&probe).await.unwrap();

        assert!(outcome.is_ready());
        assert_eq!(outcome.signal, Some(ReadinessSignal::IndicatorCleared));
        assert_eq!(
            states(&outcome),
            vec![
                (WaitState::AwaitingIndicator, 0),
                (WaitState::IndicatorActive, 4),
                (WaitState::IndicatorCleared, 10),
                (WaitState::StabilizationWait, 10),
                (WaitState::ResponseReady, 12),
            ]
        );
        assert!(outcome.poll.working_indicator_seen());
        assert!(outcome.poll.working_indicator_cleared());
        assert!(outcome.poll.response_detected());
        assert_eq!(outcome.snapshots_taken, 7);
        // 12s of polling plus the render settle
        assert_eq!(outcome.response_time, Duration::from_secs(15));
    }

    #[test]
    fn test_zero_intervals_are_raised() {
        let config = WaitConfig::default()
            .with_polling(Duration::from_secs(4), Duration::ZERO)
            .with_stabilization(3, Duration::ZERO);
        assert_eq!(config.poll_interval, MIN_INTERVAL);
        assert_eq!(config.stabilization_delay, MIN_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_times_out() {
        let probe = ScriptedProbe::new(|t| {
            let text = if t % 2 == 0 {
                BASE.to_string()
            } else {
                format!("{}\nWorking on it", BASE)
            };
            (text, 1usize)
        });
        let config = WaitConfig {
            max_wait: Duration::from_secs(2),
            poll_interval: Duration::ZERO,
            stabilization_delay: Duration::ZERO,
            render_settle: Duration::ZERO,
            ..WaitConfig::default()
        };

        let outcome = ResponseWaiter::new(config).wait(&probe).await.unwrap();

        assert_eq!(outcome.state, WaitState::TimedOut);
        assert_eq!(outcome.poll.elapsed_seconds(), 2);
        assert!(outcome.snapshots_taken <= 21);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_count_growth_bypasses_indicator() {
        let probe = ScriptedProbe::new(|t| (BASE.to_string(), if t >= 6 { 4 } else { 3 }));

        let outcome = ResponseWaiter::default().wait(&probe).await.unwrap();

        assert_eq!(outcome.signal, Some(ReadinessSignal::MessageCountGrowth));
        assert_eq!(
            states(&outcome),
            vec![(WaitState::AwaitingIndicator, 0), (WaitState::ResponseReady, 6)]
        );
        assert!(!outcome.poll.working_indicator_seen());
        assert_eq!(outcome.poll.elapsed_seconds(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_growth_without_indicator() {
        let probe = ScriptedProbe::new(|t| {
            let text = if t >= 8 {
                format!("{}{}", BASE, "檔".repeat(301))
            } else {
                BASE.to_string()
            };
            (text, 0)
        });

        let outcome = ResponseWaiter::default().wait(&probe).await.unwrap();

        assert_eq!(outcome.signal, Some(ReadinessSignal::TextGrowth));
        assert_eq!(outcome.poll.elapsed_seconds(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_growth_while_indicator_present_is_not_ready() {
        let probe = ScriptedProbe::new(|t| {
            let text = if t == 0 {
                BASE.to_string()
            } else {
                format!("{}Working on it{}", BASE, "y".repeat(400))
            };
            (text, 1)
        });
        let waiter = ResponseWaiter::new(
            WaitConfig::default().with_polling(Duration::from_secs(10), Duration::from_secs(2)),
        );

        let outcome = waiter.wait(&probe).await.unwrap();

        assert_eq!(outcome.state, WaitState::TimedOut);
        assert!(outcome.poll.working_indicator_seen());
        assert!(!outcome.poll.working_indicator_cleared());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_gives_exactly_ten_iterations() {
        let probe = ScriptedProbe::new(|_| (BASE.to_string(), 3));
        let waiter = ResponseWaiter::new(
            WaitConfig::default().with_polling(Duration::from_secs(20), Duration::from_secs(2)),
        );

        let outcome = waiter.wait(&probe).await.unwrap();

        assert_eq!(outcome.state, WaitState::TimedOut);
        assert_eq!(outcome.signal, None);
        // initial snapshot + 10 iterations
        assert_eq!(outcome.snapshots_taken, 11);
        assert_eq!(probe.call_times(), vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20]);
        assert_eq!(outcome.poll.elapsed_seconds(), 20);
        assert!(!outcome.poll.response_detected());
        assert!(matches!(
            outcome.ensure_ready(),
            Err(Error::TimedOut { elapsed_secs: 20 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_stabilization_falls_back_to_polling() {
        let probe = ScriptedProbe::new(|t| {
            let text = match t {
                2..4 => format!("{}Working on it", BASE),
                _ => BASE.to_string(),
            };
            (text, 0)
        });
        let waiter = ResponseWaiter::new(
            WaitConfig::default()
                .with_polling(Duration::from_secs(20), Duration::from_secs(2))
                .with_stabilization(3, Duration::from_secs(2)),
        );

        let outcome = waiter.wait(&probe).await.unwrap();

        assert_eq!(outcome.state, WaitState::TimedOut);
        assert_eq!(
            states(&outcome),
            vec![
                (WaitState::AwaitingIndicator, 0),
                (WaitState::IndicatorActive, 2),
                (WaitState::IndicatorCleared, 4),
                (WaitState::StabilizationWait, 4),
                (WaitState::IndicatorCleared, 10),
                (WaitState::TimedOut, 20),
            ]
        );
        assert!(outcome.poll.elapsed_seconds() <= 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_snapshots_after_detection() {
        let probe = ScriptedProbe::new(|t| (BASE.to_string(), if t >= 4 { 5 } else { 2 }));

        let outcome = ResponseWaiter::default().wait(&probe).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(outcome.poll.response_detected());
        assert_eq!(probe.call_times().len(), outcome.snapshots_taken);
        assert_eq!(probe.call_times().last(), Some(&4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_never_without_seen() {
        let timelines: Vec<Timeline> = vec![
            Box::new(|_: u64| (BASE.to_string(), 0usize)) as Timeline,
            Box::new(|t: u64| {
                let text = if t % 4 == 0 {
                    format!("{}Working on it", BASE)
                } else {
                    BASE.to_string()
                };
                (text, 0usize)
            }) as Timeline,
            Box::new(|t: u64| (BASE.repeat(t as usize + 1), 0usize)) as Timeline,
            Box::new(|t: u64| (format!("Working on it{}", "z".repeat(t as usize * 40)), 0usize)) as Timeline,
        ];

        for timeline in timelines {
            let probe = ScriptedProbe::new(timeline);
            let waiter = ResponseWaiter::new(
                WaitConfig::default()
                    .with_polling(Duration::from_secs(16), Duration::from_secs(2))
                    .with_stabilization(2, Duration::from_secs(2)),
            );
            let outcome = waiter.wait(&probe).await.unwrap();

            assert!(!outcome.poll.working_indicator_cleared() || outcome.poll.working_indicator_seen());
            assert!(outcome.poll.elapsed_seconds() <= 16);
            let cleared_at = outcome
                .transitions
                .iter()
                .position(|t| t.state == WaitState::IndicatorCleared);
            let seen_at = outcome
                .transitions
                .iter()
                .position(|t| t.state == WaitState::IndicatorActive);
            if let Some(cleared_at) = cleared_at {
                assert!(seen_at.is_some_and(|seen_at| seen_at < cleared_at));
            }
        }
    }
}
