//! Board bindings for the STM32G0 anchor: clock, button, radio and the
//! concrete harness type the runtime owns.

use core::time::Duration;

use anchor_core::TestHarness;
use anchor_core::channels::RadioConfig;
use anchor_core::input::{Button, Debouncer};
use anchor_core::radio::{NoopRanging, Radio, RadioEvent};
use anchor_core::time::{Clock, Instant};
use embassy_stm32::gpio::{Input, Output};
use embassy_time::Delay;
use heapless::Deque;

/// Harness wired to the board peripherals.
pub type BoardHarness = TestHarness<
    BoardClock,
    BoardRadio,
    NoopRanging,
    Output<'static>,
    Output<'static>,
    Delay,
>;

/// Millisecond view of the embassy time driver.
#[derive(Copy, Clone, Debug, Default)]
pub struct BoardClock;

impl Clock for BoardClock {
    fn now(&self) -> Instant {
        Instant::from_millis(embassy_time::Instant::now().as_millis())
    }
}

/// Active-low push button with software debounce.
pub struct BoardButton {
    input: Input<'static>,
    debouncer: Debouncer,
}

impl BoardButton {
    pub fn new(input: Input<'static>) -> Self {
        Self {
            input,
            debouncer: Debouncer::default(),
        }
    }
}

impl Button for BoardButton {
    fn poll_press(&mut self, now: Instant) -> bool {
        self.debouncer.update(self.input.is_low(), now)
    }
}

const RADIO_EVENT_DEPTH: usize = 4;

/// Transceiver front end at the external-driver boundary.
///
/// This is a logging stand-in: every operation is accepted and logged, and
/// transmits complete on the next poll. No frames reach the air.
pub struct BoardRadio {
    events: Deque<RadioEvent, RADIO_EVENT_DEPTH>,
    frames_sent: u32,
}

impl BoardRadio {
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            frames_sent: 0,
        }
    }
}

impl Default for BoardRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl Radio for BoardRadio {
    fn configure_direct(&mut self, config: &RadioConfig) {
        self.events.clear();
        defmt::info!(
            "radio: direct ch{} antenna_delay={}",
            config.channel.number(),
            config.antenna_delay
        );
    }

    fn configure_ranging(&mut self, config: &RadioConfig) {
        self.events.clear();
        defmt::info!("radio: ranging ch{}", config.channel.number());
    }

    fn force_idle(&mut self) {
        defmt::debug!("radio: idle");
    }

    fn start_receive(&mut self) {
        defmt::debug!("radio: rx on");
    }

    fn start_transmit(&mut self, payload: &[u8]) {
        self.frames_sent = self.frames_sent.wrapping_add(1);
        defmt::debug!("radio: tx #{} len={}", self.frames_sent, payload.len());
        if self.events.push_back(RadioEvent::TxDone).is_err() {
            defmt::warn!("radio: event queue full");
        }
    }

    fn clear_interrupts(&mut self) {}

    fn deep_sleep(&mut self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        defmt::info!("radio: deep sleep {}ms", millis);
        embassy_time::block_for(embassy_time::Duration::from_millis(millis));
    }

    fn poll_event(&mut self) -> Option<RadioEvent> {
        self.events.pop_front()
    }
}
