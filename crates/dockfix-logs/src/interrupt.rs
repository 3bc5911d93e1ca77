//! Per-thread interrupt flags.
//!
//! Rust threads carry no interrupt state of their own. Every thread gets a
//! flag here, raised from any other thread through an [`InterruptHandle`].
//! Blocking calls in this crate check the flag while they wait and register
//! themselves as the thread's current blocker, so raising the flag wakes them
//! at once instead of after their next poll interval.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Something a blocked thread waits on that can be woken from outside.
pub(crate) trait Wake: Send + Sync {
    fn wake(&self);
}

#[derive(Default)]
struct Flag {
    raised: AtomicBool,
    blocker: Mutex<Option<Arc<dyn Wake>>>,
}

thread_local! {
    static CURRENT: Arc<Flag> = Arc::new(Flag::default());
}

/// Handle to one thread's interrupt flag.
///
/// Obtain it on the thread to be interrupted, then move or clone it to the
/// thread that decides to interrupt.
#[derive(Clone)]
pub struct InterruptHandle {
    flag: Arc<Flag>,
}

impl InterruptHandle {
    /// Returns a handle to the calling thread's flag.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(|flag| Self {
            flag: Arc::clone(flag),
        })
    }

    /// Raises the flag and wakes the thread if it is blocked in this crate.
    pub fn interrupt(&self) {
        self.flag.raised.store(true, Ordering::SeqCst);
        let blocker = self.flag.blocker.lock().clone();
        if let Some(blocker) = blocker {
            blocker.wake();
        }
    }

    /// Returns whether the flag is raised, without clearing it.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.flag.raised.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("interrupted", &self.is_interrupted())
            .finish_non_exhaustive()
    }
}

/// Returns whether the calling thread is interrupted, without clearing it.
#[must_use]
pub fn is_interrupted() -> bool {
    CURRENT.with(|flag| flag.raised.load(Ordering::SeqCst))
}

/// Returns whether the calling thread was interrupted and clears the flag.
pub fn interrupted() -> bool {
    CURRENT.with(|flag| flag.raised.swap(false, Ordering::SeqCst))
}

/// Marks the calling thread interrupted.
pub fn interrupt_current() {
    CURRENT.with(|flag| flag.raised.store(true, Ordering::SeqCst));
}

/// Sleeps for `duration` unless the calling thread is interrupted first.
///
/// Returns `true` if the full duration elapsed and `false` if the thread was
/// interrupted. The flag is left set in the latter case.
pub fn sleep(duration: Duration) -> bool {
    let sleeper = Arc::new(Sleeper::default());
    let _blocking = block_on(Arc::clone(&sleeper) as Arc<dyn Wake>);
    let deadline = Instant::now() + duration;
    let mut guard = sleeper.lock.lock();
    loop {
        if is_interrupted() {
            return false;
        }
        if Instant::now() >= deadline {
            return true;
        }
        let _ = sleeper.woken.wait_until(&mut guard, deadline);
    }
}

#[derive(Default)]
struct Sleeper {
    lock: Mutex<()>,
    woken: Condvar,
}

impl Wake for Sleeper {
    fn wake(&self) {
        let _guard = self.lock.lock();
        let _ = self.woken.notify_all();
    }
}

/// Registration of the calling thread as blocked on a [`Wake`] target.
///
/// Declare it before the guard of the lock the target wakes through, so the
/// guard is released first when both go out of scope.
pub(crate) struct Blocking {
    flag: Arc<Flag>,
}

pub(crate) fn block_on(target: Arc<dyn Wake>) -> Blocking {
    CURRENT.with(|flag| {
        *flag.blocker.lock() = Some(target);
        Blocking {
            flag: Arc::clone(flag),
        }
    })
}

impl Drop for Blocking {
    fn drop(&mut self) {
        *self.flag.blocker.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn flags_are_per_thread() {
        interrupt_current();
        let other = std::thread::spawn(is_interrupted).join().expect("join");
        assert!(!other);
        assert!(interrupted());
    }

    #[test]
    fn interrupted_clears_the_flag() {
        interrupt_current();
        assert!(is_interrupted());
        assert!(interrupted());
        assert!(!is_interrupted());
        assert!(!interrupted());
    }

    #[test]
    fn handle_interrupts_another_thread() {
        let (tx, rx) = mpsc::channel();
        let worker = std::thread::spawn(move || {
            tx.send(InterruptHandle::current()).expect("send handle");
            sleep(Duration::from_secs(5))
        });
        let handle = rx.recv().expect("handle");
        handle.interrupt();
        assert!(handle.is_interrupted());

        let completed = worker.join().expect("join");
        assert!(!completed);
    }

    #[test]
    fn sleep_wakes_promptly_on_interrupt() {
        let (tx, rx) = mpsc::channel();
        let worker = std::thread::spawn(move || {
            tx.send(InterruptHandle::current()).expect("send handle");
            let start = Instant::now();
            let completed = sleep(Duration::from_secs(5));
            (completed, start.elapsed(), is_interrupted())
        });
        let handle = rx.recv().expect("handle");
        std::thread::sleep(Duration::from_millis(20));
        handle.interrupt();

        let (completed, elapsed, still_interrupted) = worker.join().expect("join");
        assert!(!completed);
        assert!(still_interrupted);
        assert!(elapsed < Duration::from_secs(1), "woke after {elapsed:?}");
    }

    #[test]
    fn sleep_runs_to_completion_without_interrupt() {
        assert!(sleep(Duration::from_millis(15)));
    }
}
