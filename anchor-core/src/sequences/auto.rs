//! Seven-phase automatic power profile run by the `auto` command.
//!
//! Receive and idle phases alternate around a transmit burst and a final deep
//! sleep so one capture on the power analyzer shows every radio state in a
//! fixed order. Phase timing is measured from the moment each phase was
//! entered; a phase never ends before its hold time has fully elapsed.

use core::time::Duration;

use crate::time::Instant;

use super::{PhaseActivity, PhaseStep, SequenceStep, SequenceTemplate};

/// Retransmission interval used during the transmit phase.
pub const AUTO_TX_INTERVAL: Duration = Duration::from_millis(500);

/// Ordered phases of the automatic sequence.
pub const AUTO_SEQUENCE_STEPS: [PhaseStep; 7] = [
    PhaseStep::new(
        SequenceStep::Receive1,
        PhaseActivity::Receive,
        Duration::from_millis(2_000),
    ),
    PhaseStep::new(
        SequenceStep::Idle1,
        PhaseActivity::Idle,
        Duration::from_millis(4_000),
    ),
    PhaseStep::new(
        SequenceStep::Transmit,
        PhaseActivity::Transmit {
            interval: AUTO_TX_INTERVAL,
        },
        Duration::from_millis(3_000),
    ),
    PhaseStep::new(
        SequenceStep::Idle2,
        PhaseActivity::Idle,
        Duration::from_millis(2_000),
    ),
    PhaseStep::new(
        SequenceStep::Receive2,
        PhaseActivity::Receive,
        Duration::from_millis(4_000),
    ),
    PhaseStep::new(
        SequenceStep::Idle3,
        PhaseActivity::Idle,
        Duration::from_millis(2_000),
    ),
    PhaseStep::new(
        SequenceStep::Sleep,
        PhaseActivity::Sleep,
        Duration::from_millis(3_000),
    ),
];

pub const AUTO_SEQUENCE_TEMPLATE: SequenceTemplate = SequenceTemplate::new(&AUTO_SEQUENCE_STEPS);

/// Result of a phase boundary crossed by [`AutoSequence::advance`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StepChange {
    /// Phase that just ended.
    pub exited: PhaseStep,
    /// Phase that just started, or `None` when the sequence is complete.
    pub entered: Option<PhaseStep>,
    /// 1-based position of `entered`.
    pub number: usize,
}

/// Position and timing of one run through a [`SequenceTemplate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AutoSequence {
    template: SequenceTemplate,
    position: usize,
    step_started_at: Instant,
}

impl AutoSequence {
    /// Starts the standard automatic sequence at its first phase.
    #[must_use]
    pub const fn start(now: Instant) -> Self {
        Self::with_template(AUTO_SEQUENCE_TEMPLATE, now)
    }

    #[must_use]
    pub const fn with_template(template: SequenceTemplate, now: Instant) -> Self {
        Self {
            template,
            position: 0,
            step_started_at: now,
        }
    }

    /// Phase currently holding, `None` once complete.
    #[must_use]
    pub fn current(&self) -> Option<PhaseStep> {
        self.template.phases.get(self.position).copied()
    }

    #[must_use]
    pub fn step(&self) -> SequenceStep {
        self.current()
            .map_or(SequenceStep::Complete, |phase| phase.step)
    }

    /// 1-based position of the current phase.
    #[must_use]
    pub const fn number(&self) -> usize {
        self.position + 1
    }

    #[must_use]
    pub const fn step_count(&self) -> usize {
        self.template.step_count()
    }

    #[must_use]
    pub const fn step_started_at(&self) -> Instant {
        self.step_started_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.position >= self.template.step_count()
    }

    /// Moves to the next phase once the current one has held for its full
    /// duration. The new phase is timed from `now`. Completed sequences never
    /// advance again.
    pub fn advance(&mut self, now: Instant) -> Option<StepChange> {
        let exited = self.current()?;
        if now.saturating_duration_since(self.step_started_at) < exited.hold_for {
            return None;
        }

        self.position += 1;
        self.step_started_at = now;

        Some(StepChange {
            exited,
            entered: self.current(),
            number: self.number(),
        })
    }
}
