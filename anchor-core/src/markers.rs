//! GPIO timing markers consumed by the external power analyzer.
//!
//! Every pulse is a busy-wait: the pin goes high, the caller blocks for the
//! requested width on the supplied [`DelayNs`], and the pin goes low again.
//! There is no queueing or cancellation, so a pulse in progress stalls the
//! main loop for its full width. Callers budget for that explicitly; the
//! analyzer correlation depends on real wall-clock pulse widths.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// Marks a ranging request (poll) received by the anchor.
pub const REQUEST_PULSE: Duration = Duration::from_micros(50);
/// Marks a completed range computation.
pub const RANGE_PULSE: Duration = Duration::from_millis(2);
/// Marks the start of an idle measurement window.
pub const IDLE_START_PULSE: Duration = Duration::from_millis(2);
/// Width of the dual-pin pulse placed on phase boundaries.
pub const BOUNDARY_PULSE: Duration = Duration::from_millis(20);

/// The two analyzer-facing marker lines.
///
/// In direct-control tests `A` marks transmit-busy / idle-start and `B` marks
/// receive-armed. In ranging tests `A` marks "request received" and `B` marks
/// "range computed".
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MarkerPin {
    A,
    B,
}

impl MarkerPin {
    const fn as_index(self) -> usize {
        match self {
            MarkerPin::A => 0,
            MarkerPin::B => 1,
        }
    }
}

/// Owns both marker outputs and the busy-wait delay used for pulse widths.
pub struct TimingMarkers<A, B, D> {
    pin_a: A,
    pin_b: B,
    delay: D,
    levels: [bool; 2],
}

impl<A, B, D> TimingMarkers<A, B, D>
where
    A: OutputPin,
    B: OutputPin,
    D: DelayNs,
{
    /// Takes ownership of the pins and drives both low.
    pub fn new(pin_a: A, pin_b: B, delay: D) -> Self {
        let mut markers = Self {
            pin_a,
            pin_b,
            delay,
            levels: [true; 2],
        };
        markers.all_low();
        markers
    }

    /// Drives a single marker to the requested level.
    pub fn set(&mut self, pin: MarkerPin, high: bool) {
        // Marker writes are fire-and-forget; a pin fault only shows up on the analyzer.
        let _ = match (pin, high) {
            (MarkerPin::A, true) => self.pin_a.set_high().map_err(|_| ()),
            (MarkerPin::A, false) => self.pin_a.set_low().map_err(|_| ()),
            (MarkerPin::B, true) => self.pin_b.set_high().map_err(|_| ()),
            (MarkerPin::B, false) => self.pin_b.set_low().map_err(|_| ()),
        };
        self.levels[pin.as_index()] = high;
    }

    /// Raises `pin`, blocks for `high_for`, then lowers it.
    pub fn pulse(&mut self, pin: MarkerPin, high_for: Duration) {
        self.set(pin, true);
        self.block_for(high_for);
        self.set(pin, false);
    }

    /// Raises both pins together, blocks for `high_for`, then lowers both.
    pub fn pulse_both(&mut self, high_for: Duration) {
        self.set(MarkerPin::A, true);
        self.set(MarkerPin::B, true);
        self.block_for(high_for);
        self.set(MarkerPin::A, false);
        self.set(MarkerPin::B, false);
    }

    /// Drives both markers low.
    pub fn all_low(&mut self) {
        self.set(MarkerPin::A, false);
        self.set(MarkerPin::B, false);
    }

    /// Last level written to `pin`.
    #[must_use]
    pub fn is_high(&self, pin: MarkerPin) -> bool {
        self.levels[pin.as_index()]
    }

    /// Busy-waits for `duration` on the marker delay source.
    pub fn block_for(&mut self, duration: Duration) {
        let micros = u32::try_from(duration.as_micros()).unwrap_or(u32::MAX);
        self.delay.delay_us(micros);
    }
}
