//! Deadline-bounded search for the first log line containing a pattern.
//!
//! The search runs on its own thread, spawned and retired inside
//! [`FirstMatchWaiter::await_first_match`]. The calling thread waits for it
//! up to the deadline. Whatever happens, the line source is closed before
//! the call returns, and the search thread must exit within a grace period
//! afterwards or the call fails with [`FixtureError::ThreadLeak`].

use std::any::Any;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use dockfix_common::config::FixtureConfig;
use dockfix_common::constants::{
    DEFAULT_GRACE_FACTOR, DEFAULT_WAIT_TIMEOUT, MATCHER_THREAD_NAME, POLL_INTERVAL,
};
use dockfix_common::error::{FixtureError, Result};

use crate::interrupt;
use crate::sequence::{CloseHandle, LineSource};

/// Poll intervals the search thread gets to exit, whatever the timeout.
const MIN_GRACE_POLLS: u32 = 10;

/// What to wait for in a container's log, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpec {
    pattern: Option<String>,
    timeout: Duration,
}

impl MatchSpec {
    /// Waits for a line containing `pattern`. An empty pattern requests no
    /// wait at all, like [`MatchSpec::nothing`].
    #[must_use]
    pub fn new(pattern: impl Into<String>, timeout: Duration) -> Self {
        let pattern = pattern.into();
        Self {
            pattern: (!pattern.is_empty()).then_some(pattern),
            timeout,
        }
    }

    /// Requests no wait.
    #[must_use]
    pub const fn nothing() -> Self {
        Self {
            pattern: None,
            timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Returns the text waited for, if any.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Returns the deadline of the wait.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns a copy with a different deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns whether a wait was requested.
    #[must_use]
    pub const fn is_requested(&self) -> bool {
        self.pattern.is_some()
    }

    /// Returns whether `line` satisfies this spec.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        self.pattern
            .as_deref()
            .is_some_and(|pattern| line.contains(pattern))
    }
}

impl Default for MatchSpec {
    fn default() -> Self {
        Self::nothing()
    }
}

/// Successful outcomes of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A line matched, or no wait was requested.
    Found,
    /// The waiting thread was interrupted. Its interrupt flag is still set
    /// and the source has been closed.
    Interrupted,
}

enum Search {
    Found,
    Ended,
    TimedOut,
    Aborted,
}

/// Runs bounded first-match searches over line sources.
#[derive(Debug, Clone)]
pub struct FirstMatchWaiter {
    grace_factor: u32,
    poll_interval: Duration,
}

impl FirstMatchWaiter {
    /// Creates a waiter with the default grace factor and poll interval.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            grace_factor: DEFAULT_GRACE_FACTOR,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Creates a waiter from configuration.
    #[must_use]
    pub const fn from_config(config: &FixtureConfig) -> Self {
        Self {
            grace_factor: config.grace_factor,
            poll_interval: config.poll_interval(),
        }
    }

    /// Sets the multiple of the timeout the search thread gets to exit once
    /// the source is closed.
    #[must_use]
    pub const fn with_grace_factor(mut self, grace_factor: u32) -> Self {
        self.grace_factor = grace_factor;
        self
    }

    /// Sets how often the waiting thread checks for interruption.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Returns the grace period granted after a wait of `timeout`.
    ///
    /// Never shorter than ten poll intervals, so a search
    /// thread started for a zero timeout still gets to see the close.
    #[must_use]
    pub fn grace_period(&self, timeout: Duration) -> Duration {
        timeout
            .saturating_mul(self.grace_factor)
            .max(self.poll_interval.saturating_mul(MIN_GRACE_POLLS))
    }

    /// Waits until `source` yields a line matching `spec`.
    ///
    /// When `spec` requests no wait, returns [`WaitOutcome::Found`] at once
    /// without reading `source`. The source is still consumed: dropping it
    /// closes it, as it would be after any other outcome. Callers that want
    /// to keep the stream open check [`MatchSpec::is_requested`] first.
    ///
    /// A timeout too large to be represented as an instant means no
    /// deadline: the wait lasts until a match, the end of the source or an
    /// interruption.
    ///
    /// # Errors
    ///
    /// - [`FixtureError::PatternNotFound`] if the source ended first.
    /// - [`FixtureError::Timeout`] if the deadline elapsed first.
    /// - [`FixtureError::ThreadLeak`] if the search thread did not exit
    ///   within the grace period after the source was closed.
    /// - [`FixtureError::MatcherFailed`] if the search panicked.
    /// - [`FixtureError::Thread`] if the search thread could not start.
    pub fn await_first_match<S: LineSource>(
        &self,
        source: S,
        spec: &MatchSpec,
    ) -> Result<WaitOutcome> {
        let Some(pattern) = spec.pattern() else {
            tracing::debug!("no log line requested, not waiting");
            return Ok(WaitOutcome::Found);
        };
        let timeout = spec.timeout();
        let closer = source.close_handle();
        tracing::debug!(pattern, ?timeout, "waiting for log line");

        let (tx, rx) = mpsc::channel();
        let search = spawn_search(source, spec.clone(), closer.clone(), tx).inspect_err(|_| {
            closer.close();
        })?;

        let started = Instant::now();
        let deadline = started.checked_add(timeout);
        let outcome = loop {
            if interrupt::is_interrupted() {
                tracing::debug!(pattern, "wait for log line interrupted");
                closer.close();
                return Ok(WaitOutcome::Interrupted);
            }
            let mut wait = self.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    break Search::TimedOut;
                }
                wait = wait.min(deadline - now);
            }
            match rx.recv_timeout(wait) {
                Ok(true) => break Search::Found,
                Ok(false) => break Search::Ended,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break Search::Aborted,
            }
        };

        closer.close();
        retire(search, &rx, self.grace_period(timeout))?;

        match outcome {
            Search::Found => {
                tracing::info!(pattern, elapsed = ?started.elapsed(), "log line found");
                Ok(WaitOutcome::Found)
            }
            Search::Ended => {
                tracing::warn!(pattern, "log stream ended before the pattern appeared");
                Err(FixtureError::PatternNotFound {
                    pattern: pattern.to_owned(),
                })
            }
            Search::TimedOut => {
                tracing::warn!(pattern, ?timeout, "timed out waiting for log line");
                Err(FixtureError::Timeout {
                    pattern: pattern.to_owned(),
                    timeout,
                })
            }
            Search::Aborted => Err(FixtureError::MatcherFailed {
                message: "search ended without a result".into(),
            }),
        }
    }
}

impl Default for FirstMatchWaiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Closes the source when the search thread exits, including by panic.
struct CloseOnExit(CloseHandle);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.close();
    }
}

fn spawn_search<S: LineSource>(
    mut source: S,
    spec: MatchSpec,
    closer: CloseHandle,
    found_tx: Sender<bool>,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(MATCHER_THREAD_NAME.into())
        .spawn(move || {
            let _close = CloseOnExit(closer);
            let found = source.any(|line| spec.matches(&line));
            drop(source);
            let _ = found_tx.send(found);
        })
        .map_err(|e| FixtureError::Thread {
            name: MATCHER_THREAD_NAME.into(),
            source: e,
        })
}

/// Waits up to `grace` for the search thread to exit, then joins it.
///
/// The thread has exited once its result sender is dropped. A grace too
/// large to be represented as an instant waits without bound.
fn retire(search: JoinHandle<()>, found_rx: &Receiver<bool>, grace: Duration) -> Result<()> {
    match Instant::now().checked_add(grace) {
        Some(deadline) => loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match found_rx.recv_timeout(remaining) {
                Ok(_) => {}
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::error!(?grace, "log matcher thread did not exit after cancellation");
                    return Err(FixtureError::ThreadLeak { grace });
                }
            }
        },
        None => while found_rx.recv().is_ok() {},
    }
    search.join().map_err(|payload| FixtureError::MatcherFailed {
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::bridge::LineBridge;
    use crate::sequence::LineSequence;

    /// Source that ignores closing and blocks for `delay` on its first read.
    struct Stubborn {
        closed: Arc<AtomicBool>,
        delay: Duration,
        yielded: bool,
    }

    impl Iterator for Stubborn {
        type Item = String;

        fn next(&mut self) -> Option<String> {
            if self.yielded {
                return None;
            }
            self.yielded = true;
            std::thread::sleep(self.delay);
            Some("still starting".into())
        }
    }

    impl LineSource for Stubborn {
        fn close_handle(&self) -> CloseHandle {
            let closed = Arc::clone(&self.closed);
            CloseHandle::new(move || closed.store(true, Ordering::SeqCst))
        }
    }

    /// Source whose first read panics.
    struct Exploding {
        closed: Arc<AtomicBool>,
    }

    impl Iterator for Exploding {
        type Item = String;

        fn next(&mut self) -> Option<String> {
            panic!("decoder exploded");
        }
    }

    impl LineSource for Exploding {
        fn close_handle(&self) -> CloseHandle {
            let closed = Arc::clone(&self.closed);
            CloseHandle::new(move || closed.store(true, Ordering::SeqCst))
        }
    }

    #[test]
    fn empty_pattern_means_nothing() {
        let spec = MatchSpec::new("", Duration::from_secs(1));
        assert!(!spec.is_requested());
        assert_eq!(spec.pattern(), None);
        assert_eq!(MatchSpec::default(), MatchSpec::nothing());
    }

    #[test]
    fn spec_matches_by_substring() {
        let spec = MatchSpec::new("started", Duration::from_secs(1));
        assert!(spec.matches("19/11/2016 : server started on 8080"));
        assert!(!spec.matches("starting"));
        assert!(!MatchSpec::nothing().matches("anything"));
    }

    #[test]
    fn grace_period_scales_with_timeout() {
        let waiter = FirstMatchWaiter::new();
        assert_eq!(
            waiter.grace_period(Duration::from_millis(100)),
            Duration::from_millis(200)
        );
        let waiter = waiter.with_grace_factor(3);
        assert_eq!(
            waiter.grace_period(Duration::from_secs(1)),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn grace_period_has_a_floor_of_ten_polls() {
        let waiter = FirstMatchWaiter::new().with_poll_interval(Duration::from_millis(10));
        assert_eq!(waiter.grace_period(Duration::ZERO), Duration::from_millis(100));
        assert_eq!(
            waiter.grace_period(Duration::from_millis(20)),
            Duration::from_millis(100)
        );
        assert_eq!(waiter.grace_period(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn waiter_follows_configuration() {
        let config = FixtureConfig {
            grace_factor: 5,
            ..FixtureConfig::default()
        };
        let waiter = FirstMatchWaiter::from_config(&config);
        assert_eq!(
            waiter.grace_period(Duration::from_millis(100)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn no_pattern_returns_found_without_reading() {
        let bridge = LineBridge::new();
        let sequence = LineSequence::new(bridge.clone());
        let start = Instant::now();

        let outcome = FirstMatchWaiter::new()
            .await_first_match(sequence, &MatchSpec::nothing())
            .expect("fast path");

        assert_eq!(outcome, WaitOutcome::Found);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn unresponsive_search_is_reported_as_thread_leak() {
        let closed = Arc::new(AtomicBool::new(false));
        let source = Stubborn {
            closed: Arc::clone(&closed),
            delay: Duration::from_millis(600),
            yielded: false,
        };
        let spec = MatchSpec::new("ready", Duration::from_millis(20));

        let err = FirstMatchWaiter::new()
            .with_grace_factor(1)
            .with_poll_interval(Duration::from_millis(10))
            .await_first_match(source, &spec)
            .unwrap_err();

        assert!(
            matches!(err, FixtureError::ThreadLeak { grace } if grace == Duration::from_millis(100)),
            "unexpected error: {err}"
        );
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn panicking_search_still_closes_the_source() {
        let closed = Arc::new(AtomicBool::new(false));
        let source = Exploding {
            closed: Arc::clone(&closed),
        };
        let spec = MatchSpec::new("ready", Duration::from_secs(2));

        let err = FirstMatchWaiter::new()
            .await_first_match(source, &spec)
            .unwrap_err();

        match err {
            FixtureError::MatcherFailed { message } => assert!(message.contains("exploded")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn panic_message_reads_string_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
