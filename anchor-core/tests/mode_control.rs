mod common;

use std::collections::VecDeque;
use std::time::Duration;

use anchor_core::channels::ChannelIndex;
use anchor_core::input::{Button, CommandSource, NoButton};
use anchor_core::radio::{RadioEvent, RadioMode};
use anchor_core::repl::{Line, LineAssembler, LineError};
use anchor_core::time::Instant;
use anchor_core::{AnchorState, TestMode};

use common::{RadioCall, Rig, level, pulses};

#[test]
fn begin_announces_channel_and_listens() {
    let rig = Rig::new();

    assert_eq!(rig.lines(), ["CHANNEL,1,1,16436"]);
    assert_eq!(rig.harness.mode(), TestMode::None);
    assert_eq!(rig.harness.anchor_state(), AnchorState::Idle);
    assert_eq!(
        rig.harness.radio().calls[..2],
        [RadioCall::ConfigureDirect(1), RadioCall::ClearInterrupts]
    );
    assert_eq!(rig.harness.radio().calls.last(), Some(&RadioCall::StartReceive));

    let status = rig.sink.status().expect("display refreshed");
    assert_eq!(status.top(), "NONE");
    assert_eq!(status.bottom(), "CH 1/1");
}

#[test]
fn exactly_one_mode_is_active_after_each_command() {
    let mut rig = Rig::new();
    let script = [
        ("IDLE_TEST", TestMode::IdleTest),
        ("RX_TEST", TestMode::RxTest),
        ("TX_TEST", TestMode::TxTest),
        ("RANGING_TEST 5", TestMode::RangingTest),
        ("auto", TestMode::AutoSequence),
        ("TX_TEST 20", TestMode::TxTest),
        ("STOP_TEST", TestMode::None),
    ];

    for (line, expected) in script {
        rig.command(line);
        assert_eq!(rig.harness.mode(), expected, "after {line}");
        rig.run_for(5);
    }

    let started = rig.lines_tagged("MODE").len();
    let stopped = rig.lines_tagged("STOP").len();
    assert_eq!(started, 6);
    assert_eq!(stopped, 6);

    // Every start is preceded by the stop of the test it replaced.
    let tags = rig.tags();
    let modes: Vec<&str> = tags
        .iter()
        .map(String::as_str)
        .filter(|tag| matches!(*tag, "MODE" | "STOP"))
        .collect();
    assert_eq!(
        modes,
        [
            "MODE", "STOP", "MODE", "STOP", "MODE", "STOP", "MODE", "STOP", "MODE", "STOP",
            "MODE", "STOP"
        ]
    );
}

#[test]
fn restarting_the_same_mode_stops_it_first() {
    let mut rig = Rig::new();
    rig.command("RX_TEST");
    rig.command("RX_TEST");

    let lines = rig.lines();
    assert_eq!(lines[1..], ["MODE,RX_TEST,0", "STOP,RX_TEST,0", "MODE,RX_TEST,0"]);
    assert!(level(&rig.pins, 'B'));
}

#[test]
fn stop_without_a_test_is_a_quiet_noop() {
    let mut rig = Rig::new();
    rig.clear_reports();

    rig.command("STOP_TEST");
    rig.command("STOP_TEST");

    assert!(rig.sink.is_empty());
    assert_eq!(rig.harness.mode(), TestMode::None);
    assert_eq!(rig.harness.counters(), Default::default());
    assert!(!level(&rig.pins, 'A'));
    assert!(!level(&rig.pins, 'B'));
}

#[test]
fn unknown_command_cancels_the_running_test() {
    let mut rig = Rig::new();
    rig.command("RX_TEST");
    assert!(level(&rig.pins, 'B'));

    rig.command("SELF_DESTRUCT");

    assert_eq!(rig.harness.mode(), TestMode::None);
    assert!(!level(&rig.pins, 'B'));
    assert_eq!(
        rig.lines()[2..],
        ["STOP,RX_TEST,0", "ERR,unknown command SELF_DESTRUCT"]
    );
}

#[test]
fn malformed_argument_is_rejected_without_starting() {
    let mut rig = Rig::new();
    rig.command("TX_TEST 100");
    rig.command("RANGING_TEST 0");

    assert_eq!(rig.harness.mode(), TestMode::None);
    assert_eq!(
        rig.lines().last().map(String::as_str),
        Some("ERR,RANGING_TEST argument must be a positive integer")
    );
    assert!(rig.lines_tagged("RANGING_START").is_empty());
}

#[test]
fn blank_lines_do_not_interrupt_a_test() {
    let mut rig = Rig::new();
    rig.command("RX_TEST");
    rig.command("   ");
    assert_eq!(rig.harness.mode(), TestMode::RxTest);
}

#[test]
fn idle_test_forces_radio_off_and_marks_the_start() {
    let mut rig = Rig::new();
    rig.command("IDLE_TEST");

    assert_eq!(rig.harness.radio().calls.last(), Some(&RadioCall::ForceIdle));
    assert_eq!(pulses(&rig.pins, 'A'), [(0, 2_000)]);
    assert!(pulses(&rig.pins, 'B').is_empty());
}

#[test]
fn tx_test_spaces_attempts_by_the_interval() {
    let mut rig = Rig::new();
    rig.command("TX_TEST 100");
    rig.run_for(1_001);

    let times = rig.harness.radio().transmit_times();
    assert_eq!(times.len(), 10);
    assert_eq!(rig.harness.transmit_attempts(), 10);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= 100, "attempts too close: {pair:?}");
    }
    assert_eq!(times.first(), Some(&100));
    assert_eq!(times.last(), Some(&1_000));

    let transmitter = rig.harness.transmitter().expect("TX_TEST is running");
    assert_eq!(transmitter.interval(), Duration::from_millis(100));
    assert_eq!(transmitter.last_attempt(), Instant::from_millis(1_000));
}

#[test]
fn tx_test_defaults_to_fifty_millisecond_interval() {
    let mut rig = Rig::new();
    rig.command("TX_TEST");
    rig.run_for(501);

    assert_eq!(rig.harness.radio().transmit_times().len(), 10);
    let interval = rig.harness.transmitter().map(|tx| tx.interval());
    assert_eq!(interval, Some(Duration::from_millis(50)));
}

#[test]
fn transmit_marker_tracks_frames_in_flight() {
    let mut rig = Rig::new();
    rig.harness.radio_mut().auto_tx_done = false;
    rig.command("TX_TEST 10");
    rig.run_for(11);
    assert!(level(&rig.pins, 'A'));

    rig.harness.radio_mut().events.push_back(RadioEvent::TxDone);
    rig.tick();
    assert!(!level(&rig.pins, 'A'));

    rig.harness.radio_mut().events.push_back(RadioEvent::TxDone);
    rig.command("STOP_TEST");
    assert!(!level(&rig.pins, 'A'));
}

#[test]
fn rx_test_rearms_after_timeouts_and_failures() {
    let mut rig = Rig::new();
    rig.command("RX_TEST");
    let before = rig.harness.radio().count(&RadioCall::StartReceive);

    rig.harness.radio_mut().events.extend([
        RadioEvent::RxTimeout,
        RadioEvent::RxFailed,
        RadioEvent::RxFrame,
    ]);
    rig.tick();

    assert_eq!(rig.harness.rx_rearms(), 3);
    assert_eq!(
        rig.harness.radio().count(&RadioCall::StartReceive),
        before + 3
    );
    assert!(level(&rig.pins, 'B'));
}

#[test]
fn receive_events_outside_rx_test_are_not_rearmed() {
    let mut rig = Rig::new();
    rig.command("IDLE_TEST");
    let before = rig.harness.radio().count(&RadioCall::StartReceive);

    rig.harness.radio_mut().events.push_back(RadioEvent::RxTimeout);
    rig.tick();

    assert_eq!(rig.harness.radio().count(&RadioCall::StartReceive), before);
}

#[test]
fn sleep_cycle_sleeps_reconfigures_and_returns_to_none() {
    let mut rig = Rig::new();
    rig.command("SLEEP_CYCLE 2000");
    assert_eq!(rig.harness.mode(), TestMode::SleepCycle);
    rig.tick();

    assert_eq!(rig.harness.mode(), TestMode::None);
    assert_eq!(pulses(&rig.pins, 'A'), [(0, 20_000)]);

    let calls = &rig.harness.radio().calls;
    let slept = calls
        .iter()
        .position(|call| *call == RadioCall::DeepSleep(Duration::from_millis(2_000)))
        .expect("deep sleep requested");
    assert_eq!(calls[slept + 1], RadioCall::ConfigureDirect(1));

    assert_eq!(
        rig.lines()[1..],
        [
            "MODE,SLEEP_CYCLE,0",
            "SLEEP_WAKE,2000,2020",
            "STOP,SLEEP_CYCLE,2020"
        ]
    );
}

#[test]
fn sleep_cycle_uses_the_default_duration() {
    let mut rig = Rig::new();
    rig.command("SLEEP_CYCLE");
    rig.tick();

    assert!(
        rig.harness
            .radio()
            .calls
            .contains(&RadioCall::DeepSleep(Duration::from_millis(5_000)))
    );
}

#[test]
fn button_cycles_channels_only_without_a_test() {
    let mut rig = Rig::new();

    rig.harness.press_button(&mut rig.sink);
    assert_eq!(rig.harness.channel().get(), 2);
    assert_eq!(rig.lines().last().map(String::as_str), Some("CHANNEL,2,2,16436"));
    assert_eq!(
        rig.harness.radio().calls.iter().rev().nth(2),
        Some(&RadioCall::ConfigureDirect(2))
    );

    rig.command("RX_TEST");
    rig.harness.press_button(&mut rig.sink);
    assert_eq!(rig.harness.channel().get(), 2);

    rig.command("STOP_TEST");
    for _ in 0..5 {
        rig.harness.press_button(&mut rig.sink);
    }
    assert_eq!(rig.harness.channel(), ChannelIndex::FIRST);
    assert_eq!(rig.sink.status().map(|s| s.bottom()), Some("CH 1/1"));
}

struct OnePress(bool);

impl Button for OnePress {
    fn poll_press(&mut self, _now: Instant) -> bool {
        std::mem::take(&mut self.0)
    }
}

struct Lines(Vec<&'static str>);

impl CommandSource for Lines {
    fn poll_line(&mut self) -> Option<Result<Line, LineError>> {
        if self.0.is_empty() {
            return None;
        }
        let mut line = Line::new();
        line.push_str(self.0.remove(0)).ok()?;
        Some(Ok(line))
    }
}

/// Raw serial bytes framed the way the console does it.
#[derive(Default)]
struct Serial {
    assembler: LineAssembler,
    framed: VecDeque<Result<Line, LineError>>,
}

impl Serial {
    fn type_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            match self.assembler.push(byte) {
                Ok(Some(line)) => self.framed.push_back(Ok(line)),
                Ok(None) => {}
                Err(err) => self.framed.push_back(Err(err)),
            }
        }
    }
}

impl CommandSource for Serial {
    fn poll_line(&mut self) -> Option<Result<Line, LineError>> {
        self.framed.pop_front()
    }
}

#[test]
fn dispatch_handles_button_before_command() {
    let mut rig = Rig::new();
    let mut button = OnePress(true);
    let mut commands = Lines(vec!["RX_TEST"]);

    rig.harness
        .dispatch(&mut button, &mut commands, &mut rig.sink);

    assert_eq!(rig.harness.channel().get(), 2);
    assert_eq!(rig.harness.mode(), TestMode::RxTest);
    assert_eq!(rig.harness.radio_mode(), RadioMode::Direct);
    assert_eq!(rig.tags()[1..], ["CHANNEL", "MODE"]);
}

#[test]
fn overlong_line_cancels_the_running_test() {
    let mut rig = Rig::new();
    let mut serial = Serial::default();

    serial.type_bytes(b"RX_TEST\n");
    rig.harness
        .dispatch(&mut NoButton, &mut serial, &mut rig.sink);
    assert_eq!(rig.harness.mode(), TestMode::RxTest);

    let mut garbage = vec![b'X'; 120];
    garbage.push(b'\n');
    serial.type_bytes(&garbage);
    rig.harness
        .dispatch(&mut NoButton, &mut serial, &mut rig.sink);

    assert_eq!(rig.harness.mode(), TestMode::None);
    assert!(!level(&rig.pins, 'B'));
    assert_eq!(rig.tags()[1..], ["MODE", "STOP", "ERR"]);
    assert_eq!(
        rig.lines().last().map(String::as_str),
        Some("ERR,line longer than 96 bytes")
    );
}

#[test]
fn undecodable_line_cancels_the_running_test() {
    let mut rig = Rig::new();
    rig.command("TX_TEST 50");

    let mut serial = Serial::default();
    serial.type_bytes(b"\xff\xfe\r\n");
    rig.harness
        .dispatch(&mut NoButton, &mut serial, &mut rig.sink);

    assert_eq!(rig.harness.mode(), TestMode::None);
    assert_eq!(
        rig.lines().last().map(String::as_str),
        Some("ERR,line is not valid UTF-8")
    );
}
