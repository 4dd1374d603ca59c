// StockScan - app/debounce.rs
//
// Scanner input debounce. Barcode scanners emit payloads as a burst of
// keystrokes with no terminator; the buffer is considered complete once no
// input has arrived for the configured idle period. Modelled as a pure
// poll-based state machine — the hosting shell feeds keystrokes with their
// arrival times and polls on its tick — so the timing logic is testable
// without an event loop.

use std::time::{Duration, Instant};

use crate::util::constants;

/// Accumulating scan buffer with an idle-fire timer.
///
/// Every `push_input` restarts the timer; `poll` hands the payload out once
/// the idle period has elapsed, emptying the buffer for the next scan.
#[derive(Debug)]
pub struct ScanBuffer {
    buffer: String,
    last_input: Option<Instant>,
    idle: Duration,
}

impl ScanBuffer {
    pub fn new(idle: Duration) -> Self {
        Self {
            buffer: String::new(),
            last_input: None,
            idle,
        }
    }

    /// Append scanner keystrokes, restarting the idle timer.
    pub fn push_input(&mut self, text: &str, now: Instant) {
        self.buffer.push_str(text);
        self.last_input = Some(now);
    }

    /// True while input has arrived and not yet been taken.
    pub fn is_pending(&self) -> bool {
        self.last_input.is_some()
    }

    /// Current buffer contents (for echo display).
    pub fn contents(&self) -> &str {
        &self.buffer
    }

    /// Hand out the buffered payload once the idle period has elapsed.
    ///
    /// Returns `None` while input is still arriving (or the buffer holds
    /// only whitespace, which is discarded). On `Some`, the buffer resets
    /// and is ready for the next scan.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        let last = self.last_input?;
        if now.duration_since(last) < self.idle {
            return None;
        }

        let payload = std::mem::take(&mut self.buffer);
        self.last_input = None;

        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Discard any buffered input and cancel the pending fire.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.last_input = None;
    }
}

impl Default for ScanBuffer {
    fn default() -> Self {
        Self::new(Duration::from_millis(constants::DEFAULT_SCAN_IDLE_MS))
    }
}
