//! Operator inputs polled once per loop iteration.

use core::time::Duration;

use crate::repl::{Line, LineError};
use crate::time::Instant;

/// Shortest accepted spacing between two button presses.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// Front-panel button. Returns `true` once per debounced press.
pub trait Button {
    fn poll_press(&mut self, now: Instant) -> bool;
}

/// Source of framed command lines.
///
/// A line that failed framing is still yielded, as its [`LineError`], so the
/// harness can treat it like any other malformed command.
pub trait CommandSource {
    fn poll_line(&mut self) -> Option<Result<Line, LineError>>;
}

/// Board without a button.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoButton;

impl Button for NoButton {
    fn poll_press(&mut self, _now: Instant) -> bool {
        false
    }
}

/// Board without a command link.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoCommands;

impl CommandSource for NoCommands {
    fn poll_line(&mut self) -> Option<Result<Line, LineError>> {
        None
    }
}

/// Turns raw level samples into press events.
///
/// A press is the released-to-pressed edge. Edges that arrive within the
/// window of the last accepted press are treated as contact bounce.
#[derive(Copy, Clone, Debug)]
pub struct Debouncer {
    window: Duration,
    was_pressed: bool,
    last_press: Option<Instant>,
}

impl Debouncer {
    /// Windows shorter than [`DEBOUNCE_WINDOW`] are raised to it.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(DEBOUNCE_WINDOW),
            was_pressed: false,
            last_press: None,
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Feeds one sample; returns `true` on an accepted press.
    pub fn update(&mut self, pressed: bool, now: Instant) -> bool {
        let rising = pressed && !self.was_pressed;
        self.was_pressed = pressed;
        if !rising {
            return false;
        }

        if let Some(last) = self.last_press
            && now.saturating_duration_since(last) < self.window
        {
            return false;
        }

        self.last_press = Some(now);
        true
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}
