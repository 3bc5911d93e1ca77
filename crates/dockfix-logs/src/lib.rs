//! # dockfix-logs
//!
//! Turns a push-driven stream of container output into a cancellable
//! sequence of lines with backpressure, and waits with a deadline for the
//! first line containing a pattern.
//!
//! - [`LineBridge`](bridge::LineBridge): single-slot handoff between the
//!   producer decoding frames and the consumer reading lines.
//! - [`LineSequence`](sequence::LineSequence): pull-based iterator over a
//!   bridge that reacts to closure and thread interruption.
//! - [`FirstMatchWaiter`](waiter::FirstMatchWaiter): searches a sequence on
//!   a background thread, bounded by a deadline.
//! - [`FrameDecoder`](frame::FrameDecoder): producer side, splitting raw
//!   output frames into lines.
//! - [`interrupt`]: per-thread interrupt flags used by all blocking calls.
//!
//! Closing the bridge is the single cancellation primitive. Timeouts,
//! explicit closes, interruption, and producer completion all funnel
//! through it.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod bridge;
pub mod frame;
pub mod interrupt;
pub mod sequence;
pub mod waiter;

pub use bridge::{LineBridge, Push, Take, Termination};
pub use frame::{Frame, FrameDecoder, StreamKind};
pub use sequence::{CloseHandle, LineSequence, LineSource};
pub use waiter::{FirstMatchWaiter, MatchSpec, WaitOutcome};
