#![allow(dead_code)]

//! Hand-written fakes shared by the harness integration tests.
//!
//! Every fake shares one microsecond counter: marker pulses advance it through
//! [`FakeDelay`] and deep sleep advances it through [`RecordingRadio`], so
//! blocking calls show up in the timestamps exactly as they would on the board.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::Duration;

use anchor_core::channels::RadioConfig;
use anchor_core::config::HarnessConfig;
use anchor_core::markers::TimingMarkers;
use anchor_core::radio::{
    Device, Radio, RadioEvent, RangeTimestamps, RangingEvent, RangingEvents, RangingProtocol,
};
use anchor_core::telemetry::{Report, ReportRecorder};
use anchor_core::time::{Clock, Instant};
use anchor_core::TestHarness;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

/// Shared simulated time in microseconds.
#[derive(Clone, Default)]
pub struct SimClock {
    micros: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn micros(&self) -> u64 {
        self.micros.get()
    }

    pub fn millis(&self) -> u64 {
        self.micros.get() / 1_000
    }

    pub fn advance(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).expect("duration fits");
        self.micros.set(self.micros.get() + micros);
    }

    pub fn advance_ms(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.millis())
    }
}

/// Busy-wait stand-in that moves simulated time forward.
pub struct FakeDelay {
    clock: SimClock,
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.clock
            .micros
            .set(self.clock.micros() + u64::from(ns).div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.clock.micros.set(self.clock.micros() + u64::from(us));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.advance_ms(u64::from(ms));
    }
}

/// One level written to a marker pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Edge {
    pub pin: char,
    pub high: bool,
    pub at_us: u64,
}

pub type PinLog = Rc<RefCell<Vec<Edge>>>;

pub struct RecordingPin {
    name: char,
    clock: SimClock,
    log: PinLog,
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.record(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.record(true);
        Ok(())
    }
}

impl RecordingPin {
    fn record(&self, high: bool) {
        self.log.borrow_mut().push(Edge {
            pin: self.name,
            high,
            at_us: self.clock.micros(),
        });
    }
}

/// Completed high periods on `pin` as `(start_us, width_us)`.
pub fn pulses(log: &PinLog, pin: char) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    let mut rose_at = None;
    for edge in log.borrow().iter().filter(|edge| edge.pin == pin) {
        match (edge.high, rose_at) {
            (true, None) => rose_at = Some(edge.at_us),
            (false, Some(start)) => {
                out.push((start, edge.at_us - start));
                rose_at = None;
            }
            _ => {}
        }
    }
    out
}

/// Last level written to `pin`.
pub fn level(log: &PinLog, pin: char) -> bool {
    log.borrow()
        .iter()
        .rev()
        .find(|edge| edge.pin == pin)
        .is_some_and(|edge| edge.high)
}

#[derive(Clone, Debug, PartialEq)]
pub enum RadioCall {
    ConfigureDirect(u8),
    ConfigureRanging(u8),
    ForceIdle,
    StartReceive,
    Transmit { at_ms: u64, len: usize },
    ClearInterrupts,
    DeepSleep(Duration),
}

/// Radio driver fake that records every call.
pub struct RecordingRadio {
    clock: SimClock,
    pub calls: Vec<RadioCall>,
    pub events: VecDeque<RadioEvent>,
    /// Queue `TxDone` right after every transmit.
    pub auto_tx_done: bool,
}

impl RecordingRadio {
    pub fn transmit_times(&self) -> Vec<u64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                RadioCall::Transmit { at_ms, .. } => Some(*at_ms),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &RadioCall) -> usize {
        self.calls.iter().filter(|call| *call == wanted).count()
    }
}

impl Radio for RecordingRadio {
    fn configure_direct(&mut self, config: &RadioConfig) {
        self.calls
            .push(RadioCall::ConfigureDirect(config.channel.number()));
    }

    fn configure_ranging(&mut self, config: &RadioConfig) {
        self.calls
            .push(RadioCall::ConfigureRanging(config.channel.number()));
    }

    fn force_idle(&mut self) {
        self.calls.push(RadioCall::ForceIdle);
    }

    fn start_receive(&mut self) {
        self.calls.push(RadioCall::StartReceive);
    }

    fn start_transmit(&mut self, payload: &[u8]) {
        self.calls.push(RadioCall::Transmit {
            at_ms: self.clock.millis(),
            len: payload.len(),
        });
        if self.auto_tx_done {
            self.events.push_back(RadioEvent::TxDone);
        }
    }

    fn clear_interrupts(&mut self) {
        self.calls.push(RadioCall::ClearInterrupts);
    }

    fn deep_sleep(&mut self, duration: Duration) {
        self.calls.push(RadioCall::DeepSleep(duration));
        self.clock.advance(duration);
    }

    fn poll_event(&mut self) -> Option<RadioEvent> {
        self.events.pop_front()
    }
}

/// Events a test wants the ranging stack to deliver on its next poll.
pub type TagScript = Rc<RefCell<VecDeque<RangingEvent>>>;

/// Ranging stack fake: replays scripted events while attached.
pub struct ScriptedTag {
    script: TagScript,
    pub attached: bool,
    pub attaches: u32,
    pub detaches: u32,
    pub listens: u32,
}

impl RangingProtocol for ScriptedTag {
    fn attach(&mut self, _config: &RadioConfig) {
        self.attached = true;
        self.attaches += 1;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.detaches += 1;
    }

    fn listen(&mut self) {
        self.listens += 1;
    }

    fn poll(&mut self, _now: Instant, events: &mut RangingEvents) {
        if !self.attached {
            return;
        }
        let mut script = self.script.borrow_mut();
        while !events.is_full() {
            let Some(event) = script.pop_front() else {
                break;
            };
            let _ = events.push_back(event);
        }
    }
}

pub const TAG: Device = Device::new(0x1A2B);

pub fn range(distance_m: f32, seed: u64) -> RangingEvent {
    RangingEvent::RangeComputed {
        device: Some(TAG),
        distance_m,
        timestamps: RangeTimestamps {
            poll_sent: seed,
            poll_received: seed + 1,
            response_sent: seed + 2,
            response_received: seed + 3,
            final_sent: seed + 4,
            final_received: seed + 5,
        },
    }
}

pub type Harness =
    TestHarness<SimClock, RecordingRadio, ScriptedTag, RecordingPin, RecordingPin, FakeDelay>;

/// A harness wired to fakes plus handles into them.
pub struct Rig {
    pub harness: Harness,
    pub sink: ReportRecorder<512>,
    pub clock: SimClock,
    pub pins: PinLog,
    pub script: TagScript,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default())
    }

    pub fn with_config(config: HarnessConfig) -> Self {
        let clock = SimClock::default();
        let pins: PinLog = Rc::new(RefCell::new(Vec::new()));
        let script: TagScript = Rc::new(RefCell::new(VecDeque::new()));

        let markers = TimingMarkers::new(
            RecordingPin {
                name: 'A',
                clock: clock.clone(),
                log: pins.clone(),
            },
            RecordingPin {
                name: 'B',
                clock: clock.clone(),
                log: pins.clone(),
            },
            FakeDelay {
                clock: clock.clone(),
            },
        );
        let radio = RecordingRadio {
            clock: clock.clone(),
            calls: Vec::new(),
            events: VecDeque::new(),
            auto_tx_done: true,
        };
        let tag = ScriptedTag {
            script: script.clone(),
            attached: false,
            attaches: 0,
            detaches: 0,
            listens: 0,
        };

        let mut harness = TestHarness::new(clock.clone(), radio, tag, markers, config);
        let mut sink = ReportRecorder::new();
        harness.begin(&mut sink);

        Self {
            harness,
            sink,
            clock,
            pins,
            script,
        }
    }

    pub fn command(&mut self, line: &str) {
        self.harness.execute_line(line, &mut self.sink);
    }

    pub fn tick(&mut self) {
        self.harness.tick(&mut self.sink);
    }

    /// Ticks once per simulated millisecond for `millis` milliseconds.
    pub fn run_for(&mut self, millis: u64) {
        for _ in 0..millis {
            self.tick();
            self.clock.advance_ms(1);
        }
    }

    /// Queues events for the tag and ticks once so they are drained.
    pub fn deliver(&mut self, events: impl IntoIterator<Item = RangingEvent>) {
        self.script.borrow_mut().extend(events);
        self.tick();
    }

    pub fn reports(&self) -> Vec<Report> {
        self.sink.oldest_first().cloned().collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.sink.oldest_first().map(ToString::to_string).collect()
    }

    /// First field of every rendered line.
    pub fn tags(&self) -> Vec<String> {
        self.lines()
            .iter()
            .map(|line| line.split(',').next().unwrap_or_default().to_string())
            .collect()
    }

    /// Rendered lines starting with `tag`.
    pub fn lines_tagged(&self, tag: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.split(',').next() == Some(tag))
            .collect()
    }

    pub fn clear_reports(&mut self) {
        self.sink.clear();
    }
}
