//! Pure mode transition table.
//!
//! Every change of [`TestMode`] is decided here from the current mode and one
//! [`HarnessEvent`]; the harness then carries out the returned [`Action`].
//! Any start request stops the running test first, including a request for
//! the mode that is already active.

use crate::repl::TestRequest;
use crate::telemetry::Rejection;

use super::TestMode;

/// Inputs that may change the active test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarnessEvent {
    /// A parsed operator command.
    Request(TestRequest),
    /// An operator command that failed to parse.
    Rejected(Rejection),
    /// Debounced front-panel button press.
    ButtonPress,
    /// The ranging session reached its completion target.
    RangingTargetReached,
    /// The automatic sequence passed its last phase.
    SequenceFinished,
    /// The sleep cycle woke up and reconfigured the radio.
    SleepFinished,
}

/// Work the harness performs for a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Leave everything as it is.
    Ignore,
    /// Select the next channel slot and reconfigure the radio.
    CycleChannel,
    /// Stop the active test.
    Stop,
    /// Stop the active test, then start `request`.
    Restart(TestRequest),
    /// Stop the active test and report why the command was refused.
    Reject(Rejection),
    /// Report the ranging summary, stop, then start idle measurement.
    CompleteRanging,
}

/// Mode a start request leads to.
#[must_use]
pub const fn requested_mode(request: &TestRequest) -> TestMode {
    match request {
        TestRequest::Idle => TestMode::IdleTest,
        TestRequest::Rx => TestMode::RxTest,
        TestRequest::Tx { .. } => TestMode::TxTest,
        TestRequest::Ranging { .. } => TestMode::RangingTest,
        TestRequest::Sleep { .. } => TestMode::SleepCycle,
        TestRequest::Auto => TestMode::AutoSequence,
        TestRequest::Stop => TestMode::None,
    }
}

/// Maps `(mode, event)` to the action to run and the resulting mode.
#[must_use]
pub fn transition(mode: TestMode, event: &HarnessEvent) -> (Action, TestMode) {
    match (mode, event) {
        (_, HarnessEvent::Request(TestRequest::Stop)) => (Action::Stop, TestMode::None),
        (_, HarnessEvent::Request(request)) => {
            (Action::Restart(*request), requested_mode(request))
        }
        (_, HarnessEvent::Rejected(reason)) => (Action::Reject(reason.clone()), TestMode::None),
        (TestMode::None, HarnessEvent::ButtonPress) => (Action::CycleChannel, TestMode::None),
        (TestMode::RangingTest, HarnessEvent::RangingTargetReached) => {
            (Action::CompleteRanging, TestMode::IdleTest)
        }
        (TestMode::AutoSequence, HarnessEvent::SequenceFinished)
        | (TestMode::SleepCycle, HarnessEvent::SleepFinished) => (Action::Stop, TestMode::None),
        (current, _) => (Action::Ignore, current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repl::CommandError;
    use core::num::NonZeroU32;

    const ALL_MODES: [TestMode; 7] = [
        TestMode::None,
        TestMode::IdleTest,
        TestMode::RxTest,
        TestMode::TxTest,
        TestMode::RangingTest,
        TestMode::SleepCycle,
        TestMode::AutoSequence,
    ];

    #[test]
    fn every_request_restarts_from_any_mode() {
        let request = TestRequest::Ranging {
            target: NonZeroU32::new(4).expect("non-zero"),
        };
        for mode in ALL_MODES {
            assert_eq!(
                transition(mode, &HarnessEvent::Request(request)),
                (Action::Restart(request), TestMode::RangingTest)
            );
        }
    }

    #[test]
    fn rejected_command_cancels_the_running_test() {
        let event = HarnessEvent::Rejected(Rejection::Command(CommandError::Malformed));
        for mode in ALL_MODES {
            let (action, next) = transition(mode, &event);
            assert!(matches!(action, Action::Reject(_)));
            assert_eq!(next, TestMode::None);
        }
    }

    #[test]
    fn button_only_acts_without_a_test() {
        assert_eq!(
            transition(TestMode::None, &HarnessEvent::ButtonPress),
            (Action::CycleChannel, TestMode::None)
        );
        for mode in &ALL_MODES[1..] {
            assert_eq!(
                transition(*mode, &HarnessEvent::ButtonPress),
                (Action::Ignore, *mode)
            );
        }
    }

    #[test]
    fn ranging_completion_lands_in_idle_test() {
        assert_eq!(
            transition(TestMode::RangingTest, &HarnessEvent::RangingTargetReached),
            (Action::CompleteRanging, TestMode::IdleTest)
        );
        assert_eq!(
            transition(TestMode::TxTest, &HarnessEvent::RangingTargetReached),
            (Action::Ignore, TestMode::TxTest)
        );
    }

    #[test]
    fn finished_runs_return_to_none() {
        assert_eq!(
            transition(TestMode::AutoSequence, &HarnessEvent::SequenceFinished),
            (Action::Stop, TestMode::None)
        );
        assert_eq!(
            transition(TestMode::SleepCycle, &HarnessEvent::SleepFinished),
            (Action::Stop, TestMode::None)
        );
    }
}
