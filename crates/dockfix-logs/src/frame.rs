//! Log frames and their decoding into lines.

use std::fmt;

use crate::bridge::{LineBridge, Push};

/// Output stream a frame was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Standard output of the container.
    Stdout,
    /// Standard error of the container.
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// One chunk of raw output delivered by a container log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Stream the bytes came from.
    pub stream: StreamKind,
    /// Raw bytes, not necessarily valid UTF-8.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame.
    #[must_use]
    pub fn new(stream: StreamKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            stream,
            payload: payload.into(),
        }
    }

    /// Decodes the payload into lines. See [`decode_lines`].
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        decode_lines(&self.payload)
    }
}

/// Splits a payload into lines.
///
/// Invalid UTF-8 becomes U+FFFD. Lines end at `\n`, a trailing `\r` is
/// dropped, and a terminating newline does not produce an empty last line.
#[must_use]
pub fn decode_lines(payload: &[u8]) -> Vec<String> {
    if payload.is_empty() {
        return Vec::new();
    }
    let text = String::from_utf8_lossy(payload);
    let body = text.strip_suffix('\n').unwrap_or(&text);
    body.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_owned())
        .collect()
}

/// Producer side of a log stream: feeds decoded frames into a bridge.
///
/// Used by exactly one producer thread per bridge.
#[derive(Debug)]
pub struct FrameDecoder {
    bridge: LineBridge,
    lines: u64,
}

impl FrameDecoder {
    /// Creates a decoder feeding `bridge`.
    #[must_use]
    pub const fn new(bridge: LineBridge) -> Self {
        Self { bridge, lines: 0 }
    }

    /// Pushes every line of `frame` to the consumer, in order.
    ///
    /// Returns `false` once the consumer stopped listening: the bridge is
    /// closed or this thread was interrupted. The remaining lines of the
    /// frame are dropped and the stream should be shut down.
    pub fn on_frame(&mut self, frame: &Frame) -> bool {
        for line in frame.lines() {
            match self.bridge.push(line) {
                Push::Delivered => self.lines += 1,
                Push::Closed | Push::Interrupted => {
                    tracing::debug!(delivered = self.lines, "log consumer gone, dropping frame");
                    return false;
                }
            }
        }
        true
    }

    /// Signals the end of the stream.
    pub fn on_complete(&self) {
        tracing::debug!(delivered = self.lines, "log stream completed");
        self.bridge.signal_end();
    }

    /// Signals that the stream failed. The consumer only sees the end of
    /// the lines.
    pub fn on_error(&self, cause: impl fmt::Display) {
        self.bridge.signal_error(cause);
    }

    /// Returns how many lines were delivered so far.
    #[must_use]
    pub const fn delivered(&self) -> u64 {
        self.lines
    }

    /// Returns whether the consumer may still read lines.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.bridge.is_open()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bridge::{Take, Termination};
    use crate::sequence::LineSequence;

    #[test]
    fn splits_on_newlines_without_trailing_empty_line() {
        assert_eq!(decode_lines(b"one\ntwo\n"), vec!["one", "two"]);
        assert_eq!(decode_lines(b"single"), vec!["single"]);
        assert!(decode_lines(b"").is_empty());
    }

    #[test]
    fn keeps_blank_lines_inside_the_payload() {
        assert_eq!(decode_lines(b"a\n\nb\n"), vec!["a", "", "b"]);
        assert_eq!(decode_lines(b"\n"), vec![""]);
    }

    #[test]
    fn strips_carriage_returns() {
        assert_eq!(decode_lines(b"dos line\r\nnext\r\n"), vec!["dos line", "next"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let lines = decode_lines(b"caf\xe9 ready\n");
        assert_eq!(lines, vec!["caf\u{fffd} ready"]);
    }

    #[test]
    fn decoder_feeds_a_sequence_in_order() {
        let bridge = LineBridge::new();
        let lines = LineSequence::new(bridge.clone());
        let producer = std::thread::spawn(move || {
            let mut decoder = FrameDecoder::new(bridge);
            assert!(decoder.on_frame(&Frame::new(StreamKind::Stdout, "a\nb\n")));
            assert!(decoder.on_frame(&Frame::new(StreamKind::Stderr, "c\n")));
            decoder.on_complete();
            decoder.delivered()
        });

        let collected: Vec<String> = lines.collect();
        assert_eq!(collected, vec!["a", "b", "c"]);
        assert_eq!(producer.join().expect("join"), 3);
    }

    #[test]
    fn decoder_stops_once_the_consumer_closed() {
        let bridge = LineBridge::new();
        bridge.close();
        let mut decoder = FrameDecoder::new(bridge);
        assert!(!decoder.is_listening());
        assert!(!decoder.on_frame(&Frame::new(StreamKind::Stdout, "dropped\n")));
        assert_eq!(decoder.delivered(), 0);
    }

    #[test]
    fn decoder_error_ends_the_stream() {
        let bridge = LineBridge::new();
        let decoder = FrameDecoder::new(bridge.clone());
        decoder.on_error("broken pipe");
        assert_eq!(bridge.try_take(Duration::from_millis(10)), Take::Closed);
        assert_eq!(
            bridge.termination(),
            Some(Termination::Failed("broken pipe".into()))
        );
    }

    #[test]
    fn stream_kind_displays_lowercase() {
        assert_eq!(StreamKind::Stdout.to_string(), "stdout");
        assert_eq!(StreamKind::Stderr.to_string(), "stderr");
    }
}
