//! Periodic transmit routine shared by `TX_TEST` and the auto sequence.
//!
//! Marker A rises when a frame is handed to the radio and falls when the
//! driver reports [`RadioEvent::TxDone`](crate::radio::RadioEvent::TxDone).
//! Successive attempts are spaced by at least the configured interval,
//! measured from the previous attempt.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::markers::{MarkerPin, TimingMarkers};
use crate::radio::Radio;
use crate::time::Instant;

/// Interval used by `TX_TEST` without an argument.
pub const DEFAULT_TX_INTERVAL: Duration = Duration::from_millis(50);

/// Fixed payload sent on every attempt.
pub const TX_PAYLOAD: &[u8] = b"UWB-ANCHOR-POWER-TEST";

/// State of one periodic transmit run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PeriodicTransmitter {
    interval: Duration,
    last_attempt: Instant,
    attempts: u32,
    in_flight: bool,
}

impl PeriodicTransmitter {
    /// Starts a run at `now`; the first frame goes out one interval later.
    #[must_use]
    pub const fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_attempt: now,
            attempts: 0,
            in_flight: false,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub const fn in_flight(&self) -> bool {
        self.in_flight
    }

    #[must_use]
    pub const fn last_attempt(&self) -> Instant {
        self.last_attempt
    }

    /// Sends a frame when the interval has elapsed. Returns `true` on an attempt.
    pub fn tick<R, A, B, D>(
        &mut self,
        now: Instant,
        radio: &mut R,
        markers: &mut TimingMarkers<A, B, D>,
        payload: &[u8],
    ) -> bool
    where
        R: Radio,
        A: OutputPin,
        B: OutputPin,
        D: DelayNs,
    {
        if now.saturating_duration_since(self.last_attempt) < self.interval {
            return false;
        }

        self.last_attempt = now;
        self.attempts = self.attempts.saturating_add(1);
        self.in_flight = true;
        markers.set(MarkerPin::A, true);
        radio.start_transmit(payload);
        true
    }

    /// Handles the driver's transmit-done notification.
    pub fn on_tx_done<A, B, D>(&mut self, markers: &mut TimingMarkers<A, B, D>)
    where
        A: OutputPin,
        B: OutputPin,
        D: DelayNs,
    {
        if self.in_flight {
            self.in_flight = false;
            markers.set(MarkerPin::A, false);
        }
    }

    /// Abandons any in-flight frame and releases the busy marker.
    pub fn cancel<A, B, D>(&mut self, markers: &mut TimingMarkers<A, B, D>)
    where
        A: OutputPin,
        B: OutputPin,
        D: DelayNs,
    {
        self.in_flight = false;
        markers.set(MarkerPin::A, false);
    }
}
