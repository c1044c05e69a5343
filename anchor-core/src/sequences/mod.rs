//! Scripted test-phase data structures.
//!
//! A sequence is an immutable table of [`PhaseStep`]s, each naming the
//! activity the harness performs and how long it holds before moving on. The
//! stepper in [`auto`] only tracks position and timing; the harness owns the
//! radio and markers and applies the enter/exit actions itself.

use core::fmt;
use core::time::Duration;

pub mod auto;

pub use auto::{AUTO_SEQUENCE_STEPS, AUTO_SEQUENCE_TEMPLATE, AutoSequence, StepChange};

/// Phases of the automatic power-profiling sequence, in execution order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceStep {
    Receive1,
    Idle1,
    Transmit,
    Idle2,
    Receive2,
    Idle3,
    Sleep,
    Complete,
}

impl SequenceStep {
    /// Short tag used on status lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SequenceStep::Receive1 => "RX1",
            SequenceStep::Idle1 => "IDLE1",
            SequenceStep::Transmit => "TX",
            SequenceStep::Idle2 => "IDLE2",
            SequenceStep::Receive2 => "RX2",
            SequenceStep::Idle3 => "IDLE3",
            SequenceStep::Sleep => "SLEEP",
            SequenceStep::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for SequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the radio does while a phase holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PhaseActivity {
    /// Continuous receive with marker B high.
    Receive,
    /// Transceiver forced off, markers low.
    Idle,
    /// Periodic transmit at `interval`.
    Transmit { interval: Duration },
    /// Blocking deep sleep for the phase duration, then full reconfiguration.
    Sleep,
}

/// One timed entry of a sequence table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PhaseStep {
    pub step: SequenceStep,
    pub activity: PhaseActivity,
    pub hold_for: Duration,
}

impl PhaseStep {
    pub const fn new(step: SequenceStep, activity: PhaseActivity, hold_for: Duration) -> Self {
        Self {
            step,
            activity,
            hold_for,
        }
    }
}

/// Immutable sequence description shared across targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequenceTemplate {
    pub phases: &'static [PhaseStep],
}

impl SequenceTemplate {
    pub const fn new(phases: &'static [PhaseStep]) -> Self {
        Self { phases }
    }

    /// Returns the ordered phases that make up the sequence.
    pub const fn steps(&self) -> &'static [PhaseStep] {
        self.phases
    }

    pub const fn step_count(&self) -> usize {
        self.phases.len()
    }

    /// Sum of every phase's hold time.
    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(|phase| phase.hold_for).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_reports_steps_and_total_duration() {
        const STEPS: [PhaseStep; 2] = [
            PhaseStep::new(
                SequenceStep::Receive1,
                PhaseActivity::Receive,
                Duration::from_millis(200),
            ),
            PhaseStep::new(
                SequenceStep::Idle1,
                PhaseActivity::Idle,
                Duration::from_millis(300),
            ),
        ];
        const TEMPLATE: SequenceTemplate = SequenceTemplate::new(&STEPS);

        assert_eq!(TEMPLATE.step_count(), 2);
        assert_eq!(TEMPLATE.steps()[1].step, SequenceStep::Idle1);
        assert_eq!(TEMPLATE.total_duration(), Duration::from_millis(500));
    }

    #[test]
    fn step_labels_are_stable() {
        assert_eq!(SequenceStep::Receive2.label(), "RX2");
        assert_eq!(SequenceStep::Transmit.label(), "TX");
    }
}
