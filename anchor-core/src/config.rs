//! Runtime configuration handed to [`TestHarness::new`](crate::TestHarness::new).

use core::time::Duration;

use crate::channels::{ChannelIndex, RadioProfile};
use crate::transmit::{DEFAULT_TX_INTERVAL, TX_PAYLOAD};

/// Duration of `SLEEP_CYCLE` without an argument.
pub const DEFAULT_SLEEP_DURATION: Duration = Duration::from_millis(5_000);

/// Board-level settings that do not change while the harness runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HarnessConfig {
    /// Channel slot selected at power-up.
    pub initial_channel: ChannelIndex,
    /// PHY settings applied on every radio reconfiguration.
    pub profile: RadioProfile,
    /// Frame body sent by the periodic transmitter.
    pub tx_payload: &'static [u8],
    pub default_tx_interval: Duration,
    pub default_sleep: Duration,
}

impl HarnessConfig {
    #[must_use]
    pub const fn with_channel(mut self, channel: ChannelIndex) -> Self {
        self.initial_channel = channel;
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            initial_channel: ChannelIndex::FIRST,
            profile: RadioProfile::SHORT_DATA_FAST,
            tx_payload: TX_PAYLOAD,
            default_tx_interval: DEFAULT_TX_INTERVAL,
            default_sleep: DEFAULT_SLEEP_DURATION,
        }
    }
}
