//! Boundary traits for the radio driver and the two-way-ranging stack.
//!
//! Neither collaborator is implemented here. The register-level driver sits
//! behind [`Radio`]; the ranging protocol sits behind [`RangingProtocol`].
//! Interrupt-time callbacks from either side never touch harness state
//! directly: the driver exposes a drained event source
//! ([`Radio::poll_event`]) and the ranging stack pushes into a bounded
//! [`RangingEvents`] queue that the harness drains once per tick.

use core::time::Duration;

use heapless::Deque;

use crate::channels::RadioConfig;
use crate::time::Instant;

pub mod mode;

pub use mode::{ModeSwitch, RadioMode};

/// Depth of the ranging event queue drained every tick.
pub const RANGING_EVENT_DEPTH: usize = 16;

/// Low-level events raised by the radio driver while in direct mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RadioEvent {
    /// A frame handed to [`Radio::start_transmit`] left the antenna.
    TxDone,
    /// A frame was received.
    RxFrame,
    /// Receiver timed out waiting for a frame.
    RxTimeout,
    /// Receiver reported a PHY/CRC failure.
    RxFailed,
}

/// Register-level radio driver.
///
/// All operations are treated as infallible; hardware faults are silent at
/// this layer and are corrected by the operator issuing a new command.
pub trait Radio {
    /// Full reset and reconfiguration for direct register control.
    fn configure_direct(&mut self, config: &RadioConfig);

    /// Applies the full channel configuration ahead of handing the radio to the ranging stack.
    fn configure_ranging(&mut self, config: &RadioConfig);

    /// Forces the transceiver off: no receive, no transmit.
    fn force_idle(&mut self);

    /// Arms the receiver in continuous mode.
    fn start_receive(&mut self);

    /// Starts transmitting `payload`; completion arrives as [`RadioEvent::TxDone`].
    fn start_transmit(&mut self, payload: &[u8]);

    /// Clears latched interrupt status.
    fn clear_interrupts(&mut self);

    /// Puts the radio (and, where supported, the MCU) into deep sleep and
    /// blocks until it is awake again. The radio needs a full
    /// reconfiguration afterwards.
    fn deep_sleep(&mut self, duration: Duration);

    /// Pops the next pending driver event, if any.
    fn poll_event(&mut self) -> Option<RadioEvent>;
}

/// Ranging peer as reported by the ranging stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Device {
    pub short_address: u16,
}

impl Device {
    #[must_use]
    pub const fn new(short_address: u16) -> Self {
        Self { short_address }
    }
}

/// Raw 40-bit radio timestamps of one two-way-ranging exchange.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RangeTimestamps {
    pub poll_sent: u64,
    pub poll_received: u64,
    pub response_sent: u64,
    pub response_received: u64,
    pub final_sent: u64,
    pub final_received: u64,
}

impl RangeTimestamps {
    /// Timestamps in exchange order.
    #[must_use]
    pub const fn as_array(&self) -> [u64; 6] {
        [
            self.poll_sent,
            self.poll_received,
            self.response_sent,
            self.response_received,
            self.final_sent,
            self.final_received,
        ]
    }
}

/// Callback-equivalent notifications produced by the ranging stack.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RangingEvent {
    /// A poll (ranging request) frame was timestamped on reception.
    PollReceived,
    /// A range computation finished. `device` is `None` when the stack could
    /// not attribute the exchange to a known peer.
    RangeComputed {
        device: Option<Device>,
        distance_m: f32,
        timestamps: RangeTimestamps,
    },
    DeviceAdded(Device),
    DeviceRemoved(Device),
}

/// Bounded queue the ranging stack fills during [`RangingProtocol::poll`].
pub type RangingEvents = Deque<RangingEvent, RANGING_EVENT_DEPTH>;

/// External two-way-ranging protocol running in the anchor role.
pub trait RangingProtocol {
    /// Starts the anchor role on an already configured radio.
    fn attach(&mut self, config: &RadioConfig);

    /// Stops the anchor role and releases the radio.
    fn detach(&mut self);

    /// Resumes continuous listening for tags.
    fn listen(&mut self);

    /// Per-tick protocol work. Must run every loop iteration while attached.
    fn poll(&mut self, now: Instant, events: &mut RangingEvents);
}

/// Ranging stack stand-in for boards built without one.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRanging;

impl NoopRanging {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RangingProtocol for NoopRanging {
    fn attach(&mut self, _: &RadioConfig) {}

    fn detach(&mut self) {}

    fn listen(&mut self) {}

    fn poll(&mut self, _: Instant, _: &mut RangingEvents) {}
}
