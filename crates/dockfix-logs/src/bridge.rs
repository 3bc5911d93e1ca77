//! Single-slot handoff between a log producer and a line consumer.
//!
//! The producer thread decodes frames and calls [`LineBridge::push`] once per
//! line; the consumer pulls lines with [`LineBridge::try_take`]. The slot holds
//! at most one unread line, so the producer advances only as fast as the
//! consumer reads. Once closed, a bridge never reopens, and nothing blocks on
//! a closed bridge.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::interrupt::{self, Wake};

/// Result of handing a line to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    /// The line is in the slot.
    Delivered,
    /// The bridge is closed; the line was dropped.
    Closed,
    /// The producer thread was interrupted; the line was dropped and the
    /// thread's flag is still set.
    Interrupted,
}

/// Result of one bounded attempt to take a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Take {
    /// A line was pending.
    Line(String),
    /// The interval elapsed with the bridge still open and no line pending.
    Empty,
    /// The bridge is closed and no line is pending.
    Closed,
    /// The consumer thread was interrupted, before or while waiting. The
    /// flag has been consumed and a pending line stays in the slot.
    Interrupted,
}

/// Why a bridge stopped accepting lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The producer reached the end of the stream.
    Ended,
    /// The producer failed; the cause is kept for diagnostics only.
    Failed(String),
    /// The consumer or a supervising timeout closed the bridge.
    Cancelled,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ended => write!(f, "ended"),
            Self::Failed(cause) => write!(f, "failed: {cause}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Default)]
struct State {
    slot: Option<String>,
    termination: Option<Termination>,
}

impl State {
    const fn is_open(&self) -> bool {
        self.termination.is_none()
    }
}

struct Shared {
    state: Mutex<State>,
    changed: Condvar,
}

impl Wake for Shared {
    fn wake(&self) {
        let _state = self.state.lock();
        let _ = self.changed.notify_all();
    }
}

/// Bounded, closable handoff of log lines between two threads.
///
/// Cloning yields another handle to the same bridge. Exactly one thread
/// pushes and one thread takes at a time.
#[derive(Clone)]
pub struct LineBridge {
    shared: Arc<Shared>,
}

impl LineBridge {
    /// Creates an open, empty bridge.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                changed: Condvar::new(),
            }),
        }
    }

    /// Hands one line to the consumer.
    ///
    /// Blocks until the previous line has been taken. Returns immediately,
    /// dropping the line, once the bridge is closed (also when it closes
    /// while this call waits) or the producer thread is interrupted.
    pub fn push(&self, line: impl Into<String>) -> Push {
        let line = line.into();
        let _blocking = interrupt::block_on(Arc::clone(&self.shared) as Arc<dyn Wake>);
        let mut state = self.shared.state.lock();
        loop {
            if !state.is_open() {
                tracing::trace!("bridge closed, dropping line");
                return Push::Closed;
            }
            if interrupt::is_interrupted() {
                return Push::Interrupted;
            }
            if state.slot.is_none() {
                state.slot = Some(line);
                let _ = self.shared.changed.notify_all();
                return Push::Delivered;
            }
            self.shared.changed.wait(&mut state);
        }
    }

    /// Signals that the producer reached the end of the stream.
    ///
    /// A line already in the slot stays readable.
    pub fn signal_end(&self) {
        self.terminate(Termination::Ended);
    }

    /// Signals that the producer failed.
    ///
    /// The cause is logged and recorded, never surfaced to the consumer: the
    /// consumer only observes the end of the lines.
    pub fn signal_error(&self, cause: impl fmt::Display) {
        let cause = cause.to_string();
        tracing::debug!(%cause, "log stream failed");
        self.terminate(Termination::Failed(cause));
    }

    /// Closes the bridge from any thread. Idempotent.
    ///
    /// Wakes a producer blocked in [`push`](Self::push) and a consumer blocked
    /// in [`try_take`](Self::try_take).
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        if state.is_open() {
            state.termination = Some(Termination::Cancelled);
            tracing::debug!("log bridge closed");
        }
        let _ = self.shared.changed.notify_all();
    }

    /// Waits up to `poll_interval` for a line.
    ///
    /// Wakes early when a line arrives, the bridge closes, or the calling
    /// thread is interrupted. Interruption wins over a pending line.
    pub fn try_take(&self, poll_interval: Duration) -> Take {
        let deadline = Instant::now().checked_add(poll_interval);
        let _blocking = interrupt::block_on(Arc::clone(&self.shared) as Arc<dyn Wake>);
        let mut state = self.shared.state.lock();
        loop {
            if interrupt::interrupted() {
                return Take::Interrupted;
            }
            if let Some(line) = state.slot.take() {
                let _ = self.shared.changed.notify_all();
                return Take::Line(line);
            }
            if !state.is_open() {
                return Take::Closed;
            }
            let timed_out = match deadline {
                Some(deadline) => self.shared.changed.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.shared.changed.wait(&mut state);
                    false
                }
            };
            if timed_out {
                if interrupt::interrupted() {
                    return Take::Interrupted;
                }
                return match state.slot.take() {
                    Some(line) => {
                        let _ = self.shared.changed.notify_all();
                        Take::Line(line)
                    }
                    None => Take::Empty,
                };
            }
        }
    }

    /// Returns whether the bridge still accepts lines.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.state.lock().is_open()
    }

    /// Returns why the bridge closed, or `None` while it is open.
    #[must_use]
    pub fn termination(&self) -> Option<Termination> {
        self.shared.state.lock().termination.clone()
    }

    fn terminate(&self, reason: Termination) {
        let mut state = self.shared.state.lock();
        match &state.termination {
            None => {
                tracing::debug!(reason = %reason, "log producer finished");
                state.termination = Some(reason);
            }
            Some(existing) => {
                tracing::warn!(%existing, ignored = %reason, "producer signalled termination twice");
            }
        }
        let _ = self.shared.changed.notify_all();
    }
}

impl Default for LineBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LineBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("LineBridge")
            .field("pending", &state.slot.is_some())
            .field("termination", &state.termination)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::interrupt::InterruptHandle;

    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn new_bridge_is_open_and_empty() {
        let bridge = LineBridge::new();
        assert!(bridge.is_open());
        assert_eq!(bridge.try_take(POLL), Take::Empty);
        assert_eq!(bridge.termination(), None);
    }

    #[test]
    fn pushed_line_is_taken_once() {
        let bridge = LineBridge::new();
        assert_eq!(bridge.push("a line"), Push::Delivered);
        assert_eq!(bridge.try_take(POLL), Take::Line("a line".into()));
        assert_eq!(bridge.try_take(POLL), Take::Empty);
    }

    #[test]
    fn pending_line_survives_end_of_stream() {
        let bridge = LineBridge::new();
        let _ = bridge.push("last");
        bridge.signal_end();
        assert_eq!(bridge.try_take(POLL), Take::Line("last".into()));
        assert_eq!(bridge.try_take(POLL), Take::Closed);
        assert_eq!(bridge.termination(), Some(Termination::Ended));
    }

    #[test]
    fn push_after_close_drops_the_line() {
        let bridge = LineBridge::new();
        bridge.close();
        assert_eq!(bridge.push("too late"), Push::Closed);
        assert_eq!(bridge.try_take(POLL), Take::Closed);
    }

    #[test]
    fn error_terminates_without_surfacing_the_cause() {
        let bridge = LineBridge::new();
        bridge.signal_error("connection reset");
        assert_eq!(bridge.try_take(POLL), Take::Closed);
        assert_eq!(
            bridge.termination(),
            Some(Termination::Failed("connection reset".into()))
        );
    }

    #[test]
    fn second_termination_is_ignored() {
        let bridge = LineBridge::new();
        bridge.signal_end();
        bridge.signal_error("late failure");
        bridge.close();
        assert_eq!(bridge.termination(), Some(Termination::Ended));
    }

    #[test]
    fn close_is_idempotent() {
        let bridge = LineBridge::new();
        bridge.close();
        bridge.close();
        assert!(!bridge.is_open());
        assert_eq!(bridge.termination(), Some(Termination::Cancelled));
    }

    #[test]
    fn push_blocks_until_slot_is_taken() {
        let bridge = LineBridge::new();
        let _ = bridge.push("first");

        let producer = bridge.clone();
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let result = producer.push("second");
            tx.send(()).expect("signal");
            result
        });

        assert!(
            rx.recv_timeout(Duration::from_millis(50)).is_err(),
            "push returned while the slot was full"
        );
        assert_eq!(bridge.try_take(POLL), Take::Line("first".into()));
        rx.recv_timeout(Duration::from_secs(1))
            .expect("push should return after take");
        assert_eq!(handle.join().expect("join"), Push::Delivered);
        assert_eq!(bridge.try_take(POLL), Take::Line("second".into()));
    }

    #[test]
    fn close_releases_a_blocked_producer() {
        let bridge = LineBridge::new();
        let _ = bridge.push("unread");

        let producer = bridge.clone();
        let handle = std::thread::spawn(move || producer.push("blocked"));
        std::thread::sleep(Duration::from_millis(20));
        bridge.close();

        assert_eq!(handle.join().expect("join"), Push::Closed);
    }

    #[test]
    fn interrupted_producer_gives_up_and_keeps_its_flag() {
        let bridge = LineBridge::new();
        let _ = bridge.push("unread");

        let producer = bridge.clone();
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            tx.send(InterruptHandle::current()).expect("send handle");
            let result = producer.push("never delivered");
            (result, interrupt::is_interrupted())
        });
        rx.recv().expect("handle").interrupt();

        let (result, flagged) = handle.join().expect("join");
        assert_eq!(result, Push::Interrupted);
        assert!(flagged);
        assert!(bridge.is_open());
    }

    #[test]
    fn try_take_consumes_the_interrupt() {
        let bridge = LineBridge::new();
        interrupt::interrupt_current();
        assert_eq!(bridge.try_take(POLL), Take::Interrupted);
        assert!(!interrupt::is_interrupted());
    }

    #[test]
    fn interrupt_wins_over_a_pending_line() {
        let bridge = LineBridge::new();
        assert_eq!(bridge.push("pending"), Push::Delivered);
        interrupt::interrupt_current();

        assert_eq!(bridge.try_take(POLL), Take::Interrupted);
        assert!(!interrupt::is_interrupted());
        assert_eq!(bridge.try_take(POLL), Take::Line("pending".into()));
    }

    #[test]
    fn try_take_wakes_when_a_line_arrives() {
        let bridge = LineBridge::new();
        let producer = bridge.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push("late")
        });

        let start = Instant::now();
        let taken = bridge.try_take(Duration::from_secs(5));
        assert_eq!(taken, Take::Line("late".into()));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(handle.join().expect("join"), Push::Delivered);
    }
}
