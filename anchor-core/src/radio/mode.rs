//! Switches the radio between direct register control and the ranging stack.
//!
//! Both switches fully reinitialize the radio. A switch to the mode that is
//! already active is a no-op.

use crate::channels::RadioConfig;

use super::{Radio, RangingProtocol};

/// Which layer currently owns the radio.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RadioMode {
    /// Raw register control for power tests.
    Direct,
    /// The two-way-ranging stack in the anchor role.
    Ranging,
}

/// Tracks the single "ranging-protocol layer active" flag.
#[derive(Copy, Clone, Debug)]
pub struct ModeSwitch {
    ranging_active: bool,
}

impl ModeSwitch {
    /// Starts out in direct mode.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ranging_active: false,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> RadioMode {
        if self.ranging_active {
            RadioMode::Ranging
        } else {
            RadioMode::Direct
        }
    }

    #[must_use]
    pub const fn ranging_active(&self) -> bool {
        self.ranging_active
    }

    /// Hands the radio to direct register control. Returns `true` when a switch happened.
    pub fn enter_direct<R, P>(
        &mut self,
        radio: &mut R,
        ranging: &mut P,
        config: &RadioConfig,
    ) -> bool
    where
        R: Radio,
        P: RangingProtocol,
    {
        if !self.ranging_active {
            return false;
        }

        ranging.detach();
        radio.configure_direct(config);
        radio.clear_interrupts();
        self.ranging_active = false;
        true
    }

    /// Hands the radio to the ranging stack. Returns `true` when a switch happened.
    pub fn enter_ranging<R, P>(
        &mut self,
        radio: &mut R,
        ranging: &mut P,
        config: &RadioConfig,
    ) -> bool
    where
        R: Radio,
        P: RangingProtocol,
    {
        if self.ranging_active {
            return false;
        }

        radio.configure_ranging(config);
        radio.clear_interrupts();
        ranging.attach(config);
        self.ranging_active = true;
        true
    }

    /// Reapplies the full configuration for whichever mode is active, e.g.
    /// after a channel change or a wake from deep sleep.
    pub fn reinitialize<R, P>(&self, radio: &mut R, ranging: &mut P, config: &RadioConfig)
    where
        R: Radio,
        P: RangingProtocol,
    {
        if self.ranging_active {
            ranging.detach();
            radio.configure_ranging(config);
            radio.clear_interrupts();
            ranging.attach(config);
        } else {
            radio.configure_direct(config);
            radio.clear_interrupts();
        }
    }

    /// Leaves the radio listening continuously in the active mode.
    pub fn listen<R, P>(&self, radio: &mut R, ranging: &mut P)
    where
        R: Radio,
        P: RangingProtocol,
    {
        if self.ranging_active {
            ranging.listen();
        } else {
            radio.start_receive();
        }
    }
}

impl Default for ModeSwitch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelIndex, RadioProfile};
    use crate::radio::{RadioEvent, RangingEvents};
    use crate::time::Instant;
    use core::time::Duration;
    use std::vec::Vec;

    #[derive(Default)]
    struct CountingRadio {
        calls: Vec<&'static str>,
    }

    impl Radio for CountingRadio {
        fn configure_direct(&mut self, _: &RadioConfig) {
            self.calls.push("direct");
        }

        fn configure_ranging(&mut self, _: &RadioConfig) {
            self.calls.push("ranging");
        }

        fn force_idle(&mut self) {}

        fn start_receive(&mut self) {
            self.calls.push("rx");
        }

        fn start_transmit(&mut self, _: &[u8]) {}

        fn clear_interrupts(&mut self) {}

        fn deep_sleep(&mut self, _: Duration) {}

        fn poll_event(&mut self) -> Option<RadioEvent> {
            None
        }
    }

    #[derive(Default)]
    struct CountingRanging {
        attached: u32,
        detached: u32,
    }

    impl RangingProtocol for CountingRanging {
        fn attach(&mut self, _: &RadioConfig) {
            self.attached += 1;
        }

        fn detach(&mut self) {
            self.detached += 1;
        }

        fn listen(&mut self) {}

        fn poll(&mut self, _: Instant, _: &mut RangingEvents) {}
    }

    fn config() -> RadioConfig {
        RadioConfig::for_slot(ChannelIndex::FIRST, RadioProfile::default())
    }

    #[test]
    fn repeated_switches_to_the_same_mode_are_noops() {
        let mut radio = CountingRadio::default();
        let mut ranging = CountingRanging::default();
        let mut modes = ModeSwitch::new();

        assert!(!modes.enter_direct(&mut radio, &mut ranging, &config()));
        assert!(modes.enter_ranging(&mut radio, &mut ranging, &config()));
        assert!(!modes.enter_ranging(&mut radio, &mut ranging, &config()));

        assert_eq!(radio.calls, ["ranging"]);
        assert_eq!(ranging.attached, 1);
        assert_eq!(modes.mode(), RadioMode::Ranging);
    }

    #[test]
    fn leaving_ranging_detaches_the_stack_and_reconfigures() {
        let mut radio = CountingRadio::default();
        let mut ranging = CountingRanging::default();
        let mut modes = ModeSwitch::new();

        modes.enter_ranging(&mut radio, &mut ranging, &config());
        assert!(modes.enter_direct(&mut radio, &mut ranging, &config()));
        modes.listen(&mut radio, &mut ranging);

        assert_eq!(ranging.detached, 1);
        assert_eq!(radio.calls, ["ranging", "direct", "rx"]);
        assert!(!modes.ranging_active());
    }
}
