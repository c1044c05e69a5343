//! The test harness: one owned state machine driving every test mode.
//!
//! [`TestHarness::dispatch`] is called once per main-loop iteration. It polls
//! the button, then the command source, then runs the per-tick handler of the
//! active mode. Mode changes are decided by [`transition`] and always pass
//! through the stop path, so no two tests are ever active together and every
//! start begins from released markers and reset counters.
//!
//! The loop is single threaded. Marker pulses and deep sleep block the loop
//! for their full duration; radio and ranging notifications are drained from
//! bounded queues at the start of each tick.

use core::mem;
use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::channels::{ChannelIndex, RadioConfig};
use crate::config::HarnessConfig;
use crate::display::StatusLines;
use crate::input::{Button, CommandSource};
use crate::markers::{
    BOUNDARY_PULSE, IDLE_START_PULSE, MarkerPin, RANGE_PULSE, REQUEST_PULSE, TimingMarkers,
};
use crate::radio::{
    ModeSwitch, Radio, RadioEvent, RadioMode, RangingEvent, RangingEvents, RangingProtocol,
};
use crate::ranging::{RangingCounters, RangingPhase, RangingTestSession};
use crate::repl::{self, LineError, TestRequest};
use crate::sequences::{AutoSequence, PhaseActivity, PhaseStep, SequenceStep};
use crate::telemetry::{Rejection, Report, ReportSink};
use crate::time::{Clock, Instant};
use crate::transmit::PeriodicTransmitter;

pub mod transition;

pub use transition::{Action, HarnessEvent, requested_mode, transition};

/// Test the harness is running. Exactly one is active at a time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TestMode {
    None,
    IdleTest,
    RxTest,
    TxTest,
    RangingTest,
    SleepCycle,
    AutoSequence,
}

impl TestMode {
    /// Name used on status lines and the display.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TestMode::None => "NONE",
            TestMode::IdleTest => "IDLE_TEST",
            TestMode::RxTest => "RX_TEST",
            TestMode::TxTest => "TX_TEST",
            TestMode::RangingTest => "RANGING_TEST",
            TestMode::SleepCycle => "SLEEP_CYCLE",
            TestMode::AutoSequence => "AUTO",
        }
    }
}

/// Whether the anchor role of the ranging stack is live.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AnchorState {
    Idle,
    Active,
}

/// Per-mode state; the variant is the single source of truth for the mode.
#[derive(Copy, Clone, Debug)]
enum ActiveTest {
    None,
    Idle,
    Rx {
        rearms: u32,
    },
    Tx(PeriodicTransmitter),
    Ranging(RangingTestSession),
    Sleep {
        duration: Duration,
    },
    Auto {
        sequence: AutoSequence,
        transmitter: Option<PeriodicTransmitter>,
    },
}

impl ActiveTest {
    const fn mode(&self) -> TestMode {
        match self {
            ActiveTest::None => TestMode::None,
            ActiveTest::Idle => TestMode::IdleTest,
            ActiveTest::Rx { .. } => TestMode::RxTest,
            ActiveTest::Tx(_) => TestMode::TxTest,
            ActiveTest::Ranging(_) => TestMode::RangingTest,
            ActiveTest::Sleep { .. } => TestMode::SleepCycle,
            ActiveTest::Auto { .. } => TestMode::AutoSequence,
        }
    }

    fn transmitter_mut(&mut self) -> Option<&mut PeriodicTransmitter> {
        match self {
            ActiveTest::Tx(transmitter)
            | ActiveTest::Auto {
                transmitter: Some(transmitter),
                ..
            } => Some(transmitter),
            _ => None,
        }
    }
}

/// Owns the radio, the ranging stack, the markers and all test state.
pub struct TestHarness<C, R, P, A, B, D> {
    clock: C,
    radio: R,
    ranging: P,
    markers: TimingMarkers<A, B, D>,
    modes: ModeSwitch,
    config: HarnessConfig,
    channel: ChannelIndex,
    active: ActiveTest,
    anchor: AnchorState,
    ranging_events: RangingEvents,
}

impl<C, R, P, A, B, D> TestHarness<C, R, P, A, B, D>
where
    C: Clock,
    R: Radio,
    P: RangingProtocol,
    A: OutputPin,
    B: OutputPin,
    D: DelayNs,
{
    pub fn new(
        clock: C,
        radio: R,
        ranging: P,
        markers: TimingMarkers<A, B, D>,
        config: HarnessConfig,
    ) -> Self {
        Self {
            clock,
            radio,
            ranging,
            markers,
            modes: ModeSwitch::new(),
            channel: config.initial_channel,
            config,
            active: ActiveTest::None,
            anchor: AnchorState::Idle,
            ranging_events: RangingEvents::new(),
        }
    }

    /// Power-up: configures the radio for direct control on the initial
    /// channel and leaves it listening.
    pub fn begin<S: ReportSink>(&mut self, sink: &mut S) {
        let config = self.radio_config();
        self.radio.configure_direct(&config);
        self.radio.clear_interrupts();
        self.markers.all_low();
        self.modes.listen(&mut self.radio, &mut self.ranging);
        sink.report(&Report::Channel(self.channel.entry()));
        self.refresh_status(&self.active, sink);
    }

    /// One main-loop iteration: button, then command, then the mode handler.
    pub fn dispatch<Btn, Cmd, S>(&mut self, button: &mut Btn, commands: &mut Cmd, sink: &mut S)
    where
        Btn: Button,
        Cmd: CommandSource,
        S: ReportSink,
    {
        if button.poll_press(self.clock.now()) {
            self.press_button(sink);
        }

        match commands.poll_line() {
            Some(Ok(line)) => self.execute_line(&line, sink),
            Some(Err(err)) => self.reject_line(err, sink),
            None => {}
        }

        self.tick(sink);
    }

    /// Parses and applies one command line. Blank lines are ignored.
    pub fn execute_line<S: ReportSink>(&mut self, line: &str, sink: &mut S) {
        if line.trim().is_empty() {
            return;
        }

        let event = match repl::parse(line) {
            Ok(request) => HarnessEvent::Request(request),
            Err(err) => HarnessEvent::Rejected(Rejection::Command(err)),
        };
        self.handle(event, sink);
    }

    /// A line that could not be framed cancels the running test like any
    /// other malformed command.
    pub fn reject_line<S: ReportSink>(&mut self, err: LineError, sink: &mut S) {
        self.handle(HarnessEvent::Rejected(Rejection::Line(err)), sink);
    }

    /// Stops the active test and starts `request`.
    pub fn start<S: ReportSink>(&mut self, request: TestRequest, sink: &mut S) {
        self.handle(HarnessEvent::Request(request), sink);
    }

    /// Stops the active test. Safe to call with nothing running.
    pub fn stop<S: ReportSink>(&mut self, sink: &mut S) {
        self.handle(HarnessEvent::Request(TestRequest::Stop), sink);
    }

    pub fn press_button<S: ReportSink>(&mut self, sink: &mut S) {
        self.handle(HarnessEvent::ButtonPress, sink);
    }

    /// Drains pending radio and ranging notifications, then runs the active
    /// mode's per-tick work.
    pub fn tick<S: ReportSink>(&mut self, sink: &mut S) {
        let mut active = mem::replace(&mut self.active, ActiveTest::None);
        let event = self.step(&mut active, sink);
        self.active = active;

        if let Some(event) = event {
            self.handle(event, sink);
        }
    }

    /// Applies one event through the transition table.
    pub fn handle<S: ReportSink>(&mut self, event: HarnessEvent, sink: &mut S) {
        let (action, next) = transition(self.mode(), &event);

        match action {
            Action::Ignore => {}
            Action::CycleChannel => self.cycle_channel(sink),
            Action::Stop => self.stop_all(sink),
            Action::Restart(request) => {
                self.stop_all(sink);
                self.start_test(request, sink);
            }
            Action::Reject(reason) => {
                self.stop_all(sink);
                sink.report(&Report::Rejected(reason));
            }
            Action::CompleteRanging => {
                let now = self.clock.now();
                if let ActiveTest::Ranging(session) = &mut self.active {
                    let summary = session.finish(now);
                    sink.report(&Report::RangingComplete(summary));
                }
                self.stop_all(sink);
                self.start_test(TestRequest::Idle, sink);
            }
        }

        debug_assert_eq!(self.mode(), next);
    }

    #[must_use]
    pub fn mode(&self) -> TestMode {
        self.active.mode()
    }

    #[must_use]
    pub const fn anchor_state(&self) -> AnchorState {
        self.anchor
    }

    /// Counters of the running ranging session, zero otherwise.
    #[must_use]
    pub fn counters(&self) -> RangingCounters {
        self.ranging_session()
            .map(RangingTestSession::counters)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn ranging_session(&self) -> Option<&RangingTestSession> {
        match &self.active {
            ActiveTest::Ranging(session) => Some(session),
            _ => None,
        }
    }

    #[must_use]
    pub const fn channel(&self) -> ChannelIndex {
        self.channel
    }

    #[must_use]
    pub fn radio_config(&self) -> RadioConfig {
        RadioConfig::for_slot(self.channel, self.config.profile)
    }

    #[must_use]
    pub const fn radio_mode(&self) -> RadioMode {
        self.modes.mode()
    }

    /// Current auto-sequence phase, if the sequence is running.
    #[must_use]
    pub fn sequence_step(&self) -> Option<SequenceStep> {
        match &self.active {
            ActiveTest::Auto { sequence, .. } => Some(sequence.step()),
            _ => None,
        }
    }

    /// The periodic transmitter of `TX_TEST` or the auto transmit phase.
    #[must_use]
    pub fn transmitter(&self) -> Option<&PeriodicTransmitter> {
        match &self.active {
            ActiveTest::Tx(transmitter)
            | ActiveTest::Auto {
                transmitter: Some(transmitter),
                ..
            } => Some(transmitter),
            _ => None,
        }
    }

    /// Transmit attempts of the running periodic transmitter.
    #[must_use]
    pub fn transmit_attempts(&self) -> u32 {
        self.transmitter().map_or(0, PeriodicTransmitter::attempts)
    }

    /// Receiver re-arms during the running `RX_TEST`.
    #[must_use]
    pub const fn rx_rearms(&self) -> u32 {
        match self.active {
            ActiveTest::Rx { rearms } => rearms,
            _ => 0,
        }
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn ranging(&self) -> &P {
        &self.ranging
    }

    /// The single stop path. Releases every resource of the active test and
    /// leaves the radio listening in whichever layer currently owns it.
    fn stop_all<S: ReportSink>(&mut self, sink: &mut S) {
        let mut previous = mem::replace(&mut self.active, ActiveTest::None);
        let mode = previous.mode();

        if let Some(transmitter) = previous.transmitter_mut() {
            transmitter.cancel(&mut self.markers);
        }
        if let ActiveTest::Ranging(session) = &previous {
            self.close_ranging(session, sink);
        }

        self.anchor = AnchorState::Idle;
        self.markers.all_low();
        self.radio.clear_interrupts();
        self.ranging_events.clear();
        self.modes.listen(&mut self.radio, &mut self.ranging);

        if mode != TestMode::None {
            sink.report(&Report::ModeStopped {
                mode,
                at: self.clock.now(),
            });
        }
        self.refresh_status(&self.active, sink);
    }

    /// Emits the stop boundary of a ranging session in any phase. The early
    /// stop summary is only reported once the session reached active ranging.
    fn close_ranging<S: ReportSink>(&mut self, session: &RangingTestSession, sink: &mut S) {
        self.markers.pulse_both(BOUNDARY_PULSE);
        if session.phase() == RangingPhase::Active {
            sink.report(&Report::RangingStopped(session.summary(self.clock.now())));
        }
    }

    fn start_test<S: ReportSink>(&mut self, request: TestRequest, sink: &mut S) {
        let mode = requested_mode(&request);
        if mode == TestMode::None {
            return;
        }

        let now = self.clock.now();
        let config = self.radio_config();
        sink.report(&Report::ModeStarted { mode, at: now });
        self.modes
            .enter_direct(&mut self.radio, &mut self.ranging, &config);

        self.active = match request {
            TestRequest::Idle => {
                self.radio.force_idle();
                self.markers.pulse(MarkerPin::A, IDLE_START_PULSE);
                ActiveTest::Idle
            }
            TestRequest::Rx => {
                self.radio.start_receive();
                self.markers.set(MarkerPin::B, true);
                ActiveTest::Rx { rearms: 0 }
            }
            TestRequest::Tx { interval } => {
                self.radio.force_idle();
                let interval = interval.unwrap_or(self.config.default_tx_interval);
                ActiveTest::Tx(PeriodicTransmitter::new(interval, now))
            }
            TestRequest::Ranging { target } => {
                self.radio.force_idle();
                ActiveTest::Ranging(RangingTestSession::new(target, now))
            }
            TestRequest::Sleep { duration } => ActiveTest::Sleep {
                duration: duration.unwrap_or(self.config.default_sleep),
            },
            TestRequest::Auto => {
                let sequence = AutoSequence::start(now);
                let mut transmitter = None;
                if let Some(phase) = sequence.current() {
                    self.enter_phase(phase, &sequence, &mut transmitter, now, sink);
                }
                ActiveTest::Auto {
                    sequence,
                    transmitter,
                }
            }
            TestRequest::Stop => ActiveTest::None,
        };

        self.refresh_status(&self.active, sink);
    }

    fn cycle_channel<S: ReportSink>(&mut self, sink: &mut S) {
        self.channel = self.channel.next();
        let config = self.radio_config();
        self.modes
            .reinitialize(&mut self.radio, &mut self.ranging, &config);
        self.modes.listen(&mut self.radio, &mut self.ranging);
        sink.report(&Report::Channel(self.channel.entry()));
        self.refresh_status(&self.active, sink);
    }

    /// Per-tick work on a test taken out of `self.active`.
    fn step<S: ReportSink>(
        &mut self,
        active: &mut ActiveTest,
        sink: &mut S,
    ) -> Option<HarnessEvent> {
        if self.modes.ranging_active() {
            self.drain_ranging(active, sink);
        } else {
            self.drain_radio(active);
        }

        let now = self.clock.now();
        match active {
            ActiveTest::None | ActiveTest::Idle | ActiveTest::Rx { .. } => None,
            ActiveTest::Tx(transmitter) => {
                transmitter.tick(now, &mut self.radio, &mut self.markers, self.config.tx_payload);
                None
            }
            ActiveTest::Ranging(session) => self.step_ranging(session, now, sink),
            ActiveTest::Sleep { duration } => {
                let duration = *duration;
                self.markers.pulse(MarkerPin::A, BOUNDARY_PULSE);
                self.radio.force_idle();
                self.radio.deep_sleep(duration);
                let config = self.radio_config();
                self.modes
                    .reinitialize(&mut self.radio, &mut self.ranging, &config);
                sink.report(&Report::SleepWake {
                    slept: duration,
                    at: self.clock.now(),
                });
                Some(HarnessEvent::SleepFinished)
            }
            ActiveTest::Auto {
                sequence,
                transmitter,
            } => self.step_auto(sequence, transmitter, now, sink),
        }
    }

    fn step_ranging<S: ReportSink>(
        &mut self,
        session: &mut RangingTestSession,
        now: Instant,
        sink: &mut S,
    ) -> Option<HarnessEvent> {
        if session.settle_elapsed(now) {
            let config = self.radio_config();
            self.modes
                .enter_ranging(&mut self.radio, &mut self.ranging, &config);
            self.markers.pulse_both(BOUNDARY_PULSE);
            self.anchor = AnchorState::Active;
            session.activate();
            self.modes.listen(&mut self.radio, &mut self.ranging);
            sink.report(&Report::RangingStarted {
                target: session.target(),
                at: self.clock.now(),
            });
            return None;
        }

        (session.is_active() && session.target_reached())
            .then_some(HarnessEvent::RangingTargetReached)
    }

    fn step_auto<S: ReportSink>(
        &mut self,
        sequence: &mut AutoSequence,
        transmitter: &mut Option<PeriodicTransmitter>,
        now: Instant,
        sink: &mut S,
    ) -> Option<HarnessEvent> {
        if let Some(transmitter) = transmitter {
            transmitter.tick(now, &mut self.radio, &mut self.markers, self.config.tx_payload);
        }

        let change = sequence.advance(now)?;
        self.exit_phase(change.exited, transmitter);

        if let Some(phase) = change.entered {
            self.enter_phase(phase, sequence, transmitter, now, sink);
            None
        } else {
            sink.report(&Report::AutoComplete { at: now });
            Some(HarnessEvent::SequenceFinished)
        }
    }

    fn enter_phase<S: ReportSink>(
        &mut self,
        phase: PhaseStep,
        sequence: &AutoSequence,
        transmitter: &mut Option<PeriodicTransmitter>,
        now: Instant,
        sink: &mut S,
    ) {
        sink.report(&Report::AutoStep {
            number: sequence.number(),
            total: sequence.step_count(),
            step: phase.step,
            duration: phase.hold_for,
            at: now,
        });

        match phase.activity {
            PhaseActivity::Receive => {
                self.radio.start_receive();
                self.markers.set(MarkerPin::B, true);
            }
            PhaseActivity::Idle => {
                self.radio.force_idle();
                self.markers.all_low();
            }
            PhaseActivity::Transmit { interval } => {
                self.radio.force_idle();
                *transmitter = Some(PeriodicTransmitter::new(interval, now));
            }
            PhaseActivity::Sleep => {
                self.radio.force_idle();
                self.markers.all_low();
                self.radio.deep_sleep(phase.hold_for);
                let config = self.radio_config();
                self.modes
                    .reinitialize(&mut self.radio, &mut self.ranging, &config);
            }
        }
    }

    fn exit_phase(&mut self, phase: PhaseStep, transmitter: &mut Option<PeriodicTransmitter>) {
        match phase.activity {
            PhaseActivity::Receive => {
                self.markers.set(MarkerPin::B, false);
                self.radio.force_idle();
            }
            PhaseActivity::Transmit { .. } => {
                if let Some(mut transmitter) = transmitter.take() {
                    transmitter.cancel(&mut self.markers);
                }
                self.radio.force_idle();
            }
            PhaseActivity::Idle | PhaseActivity::Sleep => {}
        }
    }

    fn drain_radio(&mut self, active: &mut ActiveTest) {
        while let Some(event) = self.radio.poll_event() {
            match event {
                RadioEvent::TxDone => {
                    if let Some(transmitter) = active.transmitter_mut() {
                        transmitter.on_tx_done(&mut self.markers);
                    }
                }
                RadioEvent::RxFrame | RadioEvent::RxTimeout | RadioEvent::RxFailed => {
                    if let ActiveTest::Rx { rearms } = active {
                        self.radio.clear_interrupts();
                        self.radio.start_receive();
                        *rearms = rearms.saturating_add(1);
                    }
                }
            }
        }
    }

    fn drain_ranging<S: ReportSink>(&mut self, active: &mut ActiveTest, sink: &mut S) {
        self.ranging
            .poll(self.clock.now(), &mut self.ranging_events);

        while let Some(event) = self.ranging_events.pop_front() {
            match event {
                RangingEvent::PollReceived => {
                    if let ActiveTest::Ranging(session) = active
                        && session.record_request()
                    {
                        self.markers.pulse(MarkerPin::A, REQUEST_PULSE);
                    }
                }
                RangingEvent::RangeComputed {
                    device: Some(_),
                    distance_m,
                    timestamps,
                } => {
                    let ActiveTest::Ranging(session) = active else {
                        continue;
                    };
                    let Some(record) =
                        session.record_range(self.clock.now(), distance_m, timestamps)
                    else {
                        continue;
                    };
                    self.markers.pulse(MarkerPin::B, RANGE_PULSE);
                    sink.report(&Report::Range(record));
                    self.refresh_status(active, sink);
                }
                // Exchanges the stack could not attribute to a peer.
                RangingEvent::RangeComputed { device: None, .. } => {}
                RangingEvent::DeviceAdded(device) => sink.report(&Report::DeviceAdded {
                    device,
                    at: self.clock.now(),
                }),
                RangingEvent::DeviceRemoved(device) => sink.report(&Report::DeviceRemoved {
                    device,
                    at: self.clock.now(),
                }),
            }
        }
    }

    fn refresh_status<S: ReportSink>(&self, active: &ActiveTest, sink: &mut S) {
        let progress = match active {
            ActiveTest::Ranging(session) => Some((session.counters().completed, session.target())),
            _ => None,
        };
        sink.show_status(&StatusLines::render(active.mode(), self.channel, progress));
    }
}
