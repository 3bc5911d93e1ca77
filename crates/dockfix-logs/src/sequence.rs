//! Pull-based, closable sequence of log lines.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dockfix_common::constants::POLL_INTERVAL;
use dockfix_common::error::{FixtureError, Result};

use crate::bridge::{LineBridge, Take};
use crate::interrupt;

/// Closes a line source from any thread.
#[derive(Clone)]
pub struct CloseHandle {
    close: Arc<dyn Fn() + Send + Sync>,
}

impl CloseHandle {
    /// Wraps a closing action. The action must be idempotent.
    pub fn new(close: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            close: Arc::new(close),
        }
    }

    /// Closes the source.
    pub fn close(&self) {
        (self.close)();
    }
}

impl fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHandle").finish_non_exhaustive()
    }
}

/// A blocking iterator of log lines that another thread can close.
///
/// Closing must make a blocked `next` return `None` promptly.
pub trait LineSource: Iterator<Item = String> + Send + 'static {
    /// Returns a handle that closes this source.
    fn close_handle(&self) -> CloseHandle;
}

/// Cursor over the lines of one [`LineBridge`].
///
/// Owns no buffer of its own beyond the line fetched by
/// [`has_next`](Self::has_next). Dropping the sequence closes the bridge.
pub struct LineSequence {
    bridge: LineBridge,
    fetched: Option<String>,
    poll_interval: Duration,
}

impl LineSequence {
    /// Creates a sequence reading from `bridge`.
    #[must_use]
    pub fn new(bridge: LineBridge) -> Self {
        Self {
            bridge,
            fetched: None,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Sets how long each wait on the bridge lasts before closure and
    /// interruption are re-checked.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Waits until a line is available or the bridge reports closed.
    ///
    /// If the calling thread is interrupted, even with a line pending, the
    /// bridge is closed, the thread's interrupt flag is set again and `false`
    /// is returned.
    pub fn has_next(&mut self) -> bool {
        while self.fetched.is_none() {
            match self.bridge.try_take(self.poll_interval) {
                Take::Line(line) => self.fetched = Some(line),
                Take::Empty => {}
                Take::Closed => return false,
                Take::Interrupted => {
                    tracing::debug!("log reader interrupted, closing sequence");
                    self.bridge.close();
                    interrupt::interrupt_current();
                    return false;
                }
            }
        }
        true
    }

    /// Returns the line fetched by the last successful
    /// [`has_next`](Self::has_next).
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::InvalidState`] if no line has been fetched.
    pub fn next_line(&mut self) -> Result<String> {
        self.fetched.take().ok_or_else(|| FixtureError::InvalidState {
            message: "no log line fetched; call has_next first".into(),
        })
    }

    /// Closes the underlying bridge. Safe from any thread, any number of
    /// times, through [`close_handle`](LineSource::close_handle).
    pub fn close(&self) {
        self.bridge.close();
    }
}

impl Iterator for LineSequence {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.has_next() {
            self.fetched.take()
        } else {
            None
        }
    }
}

impl LineSource for LineSequence {
    fn close_handle(&self) -> CloseHandle {
        let bridge = self.bridge.clone();
        CloseHandle::new(move || bridge.close())
    }
}

impl Drop for LineSequence {
    fn drop(&mut self) {
        self.bridge.close();
    }
}

impl fmt::Debug for LineSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineSequence")
            .field("bridge", &self.bridge)
            .field("fetched", &self.fetched.is_some())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Instant;

    use super::*;
    use crate::bridge::Push;
    use crate::interrupt::InterruptHandle;

    fn sequence() -> (LineBridge, LineSequence) {
        let bridge = LineBridge::new();
        let sequence = LineSequence::new(bridge.clone());
        (bridge, sequence)
    }

    #[test]
    fn has_nothing_if_closed() {
        let (bridge, mut lines) = sequence();
        lines.close();
        assert_eq!(bridge.push("a line"), Push::Closed);
        assert!(!lines.has_next());
    }

    #[test]
    fn has_content_if_a_line_is_pending() {
        let (bridge, mut lines) = sequence();
        let _ = bridge.push("a line");
        assert!(lines.has_next());
        assert_eq!(lines.next_line().expect("line"), "a line");
    }

    #[test]
    fn interrupted_reader_ignores_a_pending_line() {
        let (bridge, mut lines) = sequence();
        assert_eq!(bridge.push("pending"), Push::Delivered);
        interrupt::interrupt_current();

        assert!(!lines.has_next());
        assert!(!bridge.is_open());
        assert!(interrupt::interrupted());
    }

    #[test]
    fn reads_a_line_only_once() {
        let (bridge, mut lines) = sequence();
        let _ = bridge.push("a line");
        assert!(lines.has_next());
        let _ = lines.next_line().expect("line");
        lines.close();
        assert!(!lines.has_next());
    }

    #[test]
    fn next_line_without_fetch_is_invalid_state() {
        let (bridge, mut lines) = sequence();
        let _ = bridge.push("a line");
        assert!(lines.has_next());
        let _ = lines.next_line().expect("line");
        let err = lines.next_line().unwrap_err();
        assert!(matches!(err, FixtureError::InvalidState { .. }));
    }

    #[test]
    fn repeated_has_next_keeps_the_first_line() {
        let (bridge, mut lines) = sequence();
        let producer = std::thread::spawn(move || {
            let _ = bridge.push("a line");
            let _ = bridge.push("a line 2");
            bridge.signal_end();
        });

        assert!(lines.has_next());
        assert!(lines.has_next());
        assert_eq!(lines.next_line().expect("line"), "a line");
        assert_eq!(lines.next(), Some("a line 2".to_string()));
        assert_eq!(lines.next(), None);
        producer.join().expect("join");
    }

    #[test]
    fn interruption_stops_closes_and_keeps_the_flag() {
        let (bridge, mut lines) = sequence();
        interrupt::interrupt_current();

        assert!(!lines.has_next());
        assert!(interrupt::interrupted(), "flag should be set again");
        assert!(!bridge.is_open());
        assert_eq!(bridge.push("after interrupt"), Push::Closed);
    }

    #[test]
    fn close_from_another_thread_ends_has_next() {
        let (_bridge, mut lines) = sequence();
        let closer = lines.close_handle();
        let (tx, rx) = mpsc::channel();

        let reader = std::thread::spawn(move || {
            tx.send(()).expect("started");
            lines.has_next()
        });
        rx.recv().expect("reader started");
        std::thread::sleep(Duration::from_millis(20));
        let closed_at = Instant::now();
        closer.close();

        let has_next = reader.join().expect("join");
        assert!(!has_next);
        assert!(closed_at.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn interrupting_the_reader_thread_ends_has_next() {
        let (bridge, mut lines) = sequence();
        let (tx, rx) = mpsc::channel();

        let reader = std::thread::spawn(move || {
            tx.send(InterruptHandle::current()).expect("send handle");
            let has_next = lines.has_next();
            (has_next, interrupt::is_interrupted())
        });
        let handle = rx.recv().expect("handle");
        std::thread::sleep(Duration::from_millis(20));
        handle.interrupt();

        let (has_next, flagged) = reader.join().expect("join");
        assert!(!has_next);
        assert!(flagged);
        assert!(!bridge.is_open());
    }

    #[test]
    fn dropping_the_sequence_closes_the_bridge() {
        let (bridge, lines) = sequence();
        drop(lines);
        assert!(!bridge.is_open());
    }

    #[test]
    fn iterates_lines_in_push_order() {
        let (bridge, lines) = sequence();
        let producer = std::thread::spawn(move || {
            for i in 0..20 {
                assert_eq!(bridge.push(format!("line {i}")), Push::Delivered);
            }
            bridge.signal_end();
        });

        let collected: Vec<String> = lines.collect();
        producer.join().expect("join");
        let expected: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
        assert_eq!(collected, expected);
    }
}
