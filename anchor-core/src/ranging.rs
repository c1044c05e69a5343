//! Bounded ranging session driven by `RANGING_TEST <n>`.
//!
//! A session settles with the radio idle for [`SETTLE_DURATION`], then hands
//! the radio to the ranging stack and counts completed exchanges until the
//! target is reached. Counters only grow within a session; a new session
//! always starts from zero.

use core::num::NonZeroU32;
use core::time::Duration;

use crate::radio::RangeTimestamps;
use crate::time::Instant;

/// Idle period before active ranging so the power trace can stabilize.
pub const SETTLE_DURATION: Duration = Duration::from_millis(1_000);

/// Session phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RangingPhase {
    Settling,
    Active,
    Finished,
}

/// Per-session counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RangingCounters {
    /// Completed exchanges.
    pub completed: u32,
    /// Pulses emitted for received ranging requests.
    pub request_pulses: u32,
    /// Pulses emitted for computed ranges.
    pub range_pulses: u32,
}

/// One completed exchange, as reported on the status output.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RangeRecord {
    pub index: u32,
    pub distance_m: f32,
    pub request_pulses: u32,
    pub range_pulses: u32,
    pub elapsed: Duration,
    pub timestamps: RangeTimestamps,
}

/// Totals reported when a session ends.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RangingSummary {
    pub target: u32,
    pub counters: RangingCounters,
    pub elapsed: Duration,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RangingTestSession {
    target: NonZeroU32,
    counters: RangingCounters,
    phase: RangingPhase,
    started_at: Instant,
}

impl RangingTestSession {
    /// Opens a session in the settle phase with zeroed counters.
    #[must_use]
    pub const fn new(target: NonZeroU32, now: Instant) -> Self {
        Self {
            target,
            counters: RangingCounters {
                completed: 0,
                request_pulses: 0,
                range_pulses: 0,
            },
            phase: RangingPhase::Settling,
            started_at: now,
        }
    }

    #[must_use]
    pub const fn target(&self) -> u32 {
        self.target.get()
    }

    #[must_use]
    pub const fn counters(&self) -> RangingCounters {
        self.counters
    }

    #[must_use]
    pub const fn phase(&self) -> RangingPhase {
        self.phase
    }

    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.phase, RangingPhase::Active)
    }

    /// `true` once the settle period has fully elapsed while still settling.
    #[must_use]
    pub fn settle_elapsed(&self, now: Instant) -> bool {
        self.phase == RangingPhase::Settling
            && now.saturating_duration_since(self.started_at) >= SETTLE_DURATION
    }

    /// Moves from settling to active.
    pub fn activate(&mut self) {
        if self.phase == RangingPhase::Settling {
            self.phase = RangingPhase::Active;
        }
    }

    /// Counts a received ranging request. Ignored outside the active phase
    /// and once the target has been reached.
    pub fn record_request(&mut self) -> bool {
        if !self.accepting() {
            return false;
        }
        self.counters.request_pulses = self.counters.request_pulses.saturating_add(1);
        true
    }

    /// Counts a computed range. Ignored outside the active phase and once
    /// the target has been reached.
    pub fn record_range(
        &mut self,
        now: Instant,
        distance_m: f32,
        timestamps: RangeTimestamps,
    ) -> Option<RangeRecord> {
        if !self.accepting() {
            return None;
        }

        self.counters.completed = self.counters.completed.saturating_add(1);
        self.counters.range_pulses = self.counters.range_pulses.saturating_add(1);

        Some(RangeRecord {
            index: self.counters.completed,
            distance_m,
            request_pulses: self.counters.request_pulses,
            range_pulses: self.counters.range_pulses,
            elapsed: now.saturating_duration_since(self.started_at),
            timestamps,
        })
    }

    const fn accepting(&self) -> bool {
        self.is_active() && !self.target_reached()
    }

    /// `true` when the completion count has reached the target.
    #[must_use]
    pub const fn target_reached(&self) -> bool {
        self.counters.completed >= self.target.get()
    }

    /// Marks the session finished and returns its totals.
    pub fn finish(&mut self, now: Instant) -> RangingSummary {
        self.phase = RangingPhase::Finished;
        self.summary(now)
    }

    #[must_use]
    pub fn summary(&self, now: Instant) -> RangingSummary {
        RangingSummary {
            target: self.target.get(),
            counters: self.counters,
            elapsed: now.saturating_duration_since(self.started_at),
        }
    }
}
