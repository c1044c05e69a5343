//! Host stand-ins for the board peripherals.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::thread;
use std::time::{Duration, Instant as HostInstant};

use anchor_core::channels::RadioConfig;
use anchor_core::radio::{
    Device, Radio, RadioEvent, RangeTimestamps, RangingEvent, RangingEvents, RangingProtocol,
};
use anchor_core::time::{Clock, Instant};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

/// Short address the simulated tag ranges with.
pub const SIM_TAG: Device = Device::new(0x1A2B);

/// Radio timestamp ticks per millisecond (63.8976 GHz counter).
const TICKS_PER_MS: u64 = 63_897_600;
/// Timestamps wrap at 40 bits.
const TIMESTAMP_MASK: u64 = (1 << 40) - 1;
/// Turnaround between frames of one exchange.
const REPLY_DELAY_TICKS: u64 = 2 * TICKS_PER_MS;
const SPEED_OF_LIGHT_M_PER_S: f64 = 299_702_547.0;

/// Milliseconds since the emulator started.
#[derive(Copy, Clone, Debug)]
pub struct HostClock {
    origin: HostInstant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            origin: HostInstant::now(),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HostClock {
    fn now(&self) -> Instant {
        let millis = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        Instant::from_millis(millis)
    }
}

/// Busy-wait delay backed by `thread::sleep`.
#[derive(Copy, Clone, Debug, Default)]
pub struct HostDelay;

impl DelayNs for HostDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// Marker output that optionally prints its edges.
pub struct SimPin {
    name: char,
    high: bool,
    trace: bool,
    clock: HostClock,
}

impl SimPin {
    pub fn new(name: char, trace: bool, clock: HostClock) -> Self {
        Self {
            name,
            high: false,
            trace,
            clock,
        }
    }

    fn drive(&mut self, high: bool) {
        if self.trace && self.high != high {
            let level = if high { "high" } else { "low" };
            eprintln!("[pin] {} {level} @ {}ms", self.name, self.clock.now());
        }
        self.high = high;
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum RadioState {
    Off,
    Idle,
    Receiving,
    Transmitting,
}

/// Transceiver model: accepts every operation, completes transmits on the
/// next poll and blocks the thread through deep sleep.
pub struct SimRadio {
    state: RadioState,
    channel: Option<u8>,
    events: VecDeque<RadioEvent>,
    frames_sent: u64,
    trace: bool,
}

impl SimRadio {
    pub fn new(trace: bool) -> Self {
        Self {
            state: RadioState::Off,
            channel: None,
            events: VecDeque::new(),
            frames_sent: 0,
            trace,
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    fn log(&self, message: &str) {
        if self.trace {
            eprintln!("[radio] {message}");
        }
    }
}

impl Radio for SimRadio {
    fn configure_direct(&mut self, config: &RadioConfig) {
        self.channel = Some(config.channel.number());
        self.state = RadioState::Idle;
        self.events.clear();
        self.log(&format!(
            "direct config ch{} antenna delay {}",
            config.channel.number(),
            config.antenna_delay
        ));
    }

    fn configure_ranging(&mut self, config: &RadioConfig) {
        self.channel = Some(config.channel.number());
        self.state = RadioState::Idle;
        self.events.clear();
        self.log(&format!("ranging config ch{}", config.channel.number()));
    }

    fn force_idle(&mut self) {
        self.state = RadioState::Idle;
    }

    fn start_receive(&mut self) {
        self.state = RadioState::Receiving;
    }

    fn start_transmit(&mut self, payload: &[u8]) {
        self.state = RadioState::Transmitting;
        self.frames_sent += 1;
        self.events.push_back(RadioEvent::TxDone);
        self.log(&format!("tx #{} ({} bytes)", self.frames_sent, payload.len()));
    }

    fn clear_interrupts(&mut self) {}

    fn deep_sleep(&mut self, duration: Duration) {
        self.log(&format!("deep sleep {}ms", duration.as_millis()));
        self.state = RadioState::Off;
        thread::sleep(duration);
        self.log("awake");
    }

    fn poll_event(&mut self) -> Option<RadioEvent> {
        let event = self.events.pop_front()?;
        if event == RadioEvent::TxDone && self.state == RadioState::Transmitting {
            self.state = RadioState::Idle;
        }
        Some(event)
    }
}

/// A single tag ranging against the anchor at a fixed cadence.
pub struct SimTag {
    interval: Duration,
    distance_m: f32,
    attached: bool,
    announced: bool,
    next_exchange: Option<Instant>,
    exchanges: u32,
}

impl SimTag {
    pub fn new(interval: Duration, distance_m: f32) -> Self {
        Self {
            interval,
            distance_m,
            attached: false,
            announced: false,
            next_exchange: None,
            exchanges: 0,
        }
    }

    /// Distance wobbling a few centimetres around the configured value.
    fn distance_for(&self, exchange: u32) -> f32 {
        let phase = f64::from(exchange) * 0.7;
        #[allow(clippy::cast_possible_truncation)]
        let wobble = (phase.sin() * 0.05) as f32;
        (self.distance_m + wobble).max(0.0)
    }

    fn timestamps(now: Instant, distance_m: f32) -> RangeTimestamps {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            clippy::cast_sign_loss
        )]
        let flight = (f64::from(distance_m) / SPEED_OF_LIGHT_M_PER_S
            * TICKS_PER_MS as f64
            * 1_000.0) as u64;

        let poll_sent = now.as_millis().wrapping_mul(TICKS_PER_MS) & TIMESTAMP_MASK;
        let response_sent = poll_sent + flight + REPLY_DELAY_TICKS;
        let final_sent = response_sent + flight + REPLY_DELAY_TICKS;
        RangeTimestamps {
            poll_sent,
            poll_received: (poll_sent + flight) & TIMESTAMP_MASK,
            response_sent: response_sent & TIMESTAMP_MASK,
            response_received: (response_sent + flight) & TIMESTAMP_MASK,
            final_sent: final_sent & TIMESTAMP_MASK,
            final_received: (final_sent + flight) & TIMESTAMP_MASK,
        }
    }
}

impl RangingProtocol for SimTag {
    fn attach(&mut self, _config: &RadioConfig) {
        self.attached = true;
        self.announced = false;
        self.next_exchange = None;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.next_exchange = None;
    }

    fn listen(&mut self) {}

    fn poll(&mut self, now: Instant, events: &mut RangingEvents) {
        if !self.attached {
            return;
        }

        if !self.announced && events.push_back(RangingEvent::DeviceAdded(SIM_TAG)).is_ok() {
            self.announced = true;
        }

        let due = *self.next_exchange.get_or_insert(now + self.interval);
        if now < due || events.capacity() - events.len() < 2 {
            return;
        }

        self.exchanges = self.exchanges.wrapping_add(1);
        let distance_m = self.distance_for(self.exchanges);
        let _ = events.push_back(RangingEvent::PollReceived);
        let _ = events.push_back(RangingEvent::RangeComputed {
            device: Some(SIM_TAG),
            distance_m,
            timestamps: Self::timestamps(now, distance_m),
        });
        self.next_exchange = Some(now + self.interval);
    }
}
