//! Static channel configuration table and radio PHY profile.
//!
//! The operator cycles through six configuration slots with the front-panel
//! button. Each slot selects one UWB channel and carries the antenna-delay
//! calibration measured for this board on that channel. The table is
//! read-only; the harness only ever moves the selected index.

use core::fmt;

/// UWB channels supported by the anchor's radio.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UwbChannel {
    Channel1,
    Channel2,
    Channel3,
    Channel4,
    Channel5,
    Channel7,
}

impl UwbChannel {
    /// IEEE 802.15.4a channel number.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            UwbChannel::Channel1 => 1,
            UwbChannel::Channel2 => 2,
            UwbChannel::Channel3 => 3,
            UwbChannel::Channel4 => 4,
            UwbChannel::Channel5 => 5,
            UwbChannel::Channel7 => 7,
        }
    }
}

impl fmt::Display for UwbChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Air data rate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataRate {
    Kbps110,
    Kbps850,
    Kbps6800,
}

/// Pulse repetition frequency.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PulseFrequency {
    Mhz16,
    Mhz64,
}

/// Preamble length in symbols.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PreambleLength {
    Symbols64,
    Symbols128,
    Symbols256,
    Symbols512,
    Symbols1024,
    Symbols1536,
    Symbols2048,
    Symbols4096,
}

/// PHY settings applied on every reconfiguration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RadioProfile {
    pub data_rate: DataRate,
    pub pulse_frequency: PulseFrequency,
    pub preamble: PreambleLength,
}

impl RadioProfile {
    /// Short frames at 6.8 Mbps, the profile used for both power and ranging tests.
    pub const SHORT_DATA_FAST: Self = Self {
        data_rate: DataRate::Kbps6800,
        pulse_frequency: PulseFrequency::Mhz16,
        preamble: PreambleLength::Symbols128,
    };
}

impl Default for RadioProfile {
    fn default() -> Self {
        Self::SHORT_DATA_FAST
    }
}

/// One slot of the channel configuration table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelEntry {
    pub index: u8,
    pub channel: UwbChannel,
    pub antenna_delay: u16,
}

impl ChannelEntry {
    pub const fn new(index: u8, channel: UwbChannel, antenna_delay: u16) -> Self {
        Self {
            index,
            channel,
            antenna_delay,
        }
    }
}

/// Number of selectable configuration slots.
pub const CHANNEL_SLOTS: u8 = 6;

/// Compile-time catalog of every configuration slot, ordered by index.
pub const CHANNEL_TABLE: [ChannelEntry; CHANNEL_SLOTS as usize] = [
    ChannelEntry::new(1, UwbChannel::Channel1, 16_436),
    ChannelEntry::new(2, UwbChannel::Channel2, 16_436),
    ChannelEntry::new(3, UwbChannel::Channel3, 16_442),
    ChannelEntry::new(4, UwbChannel::Channel4, 16_450),
    ChannelEntry::new(5, UwbChannel::Channel5, 16_456),
    ChannelEntry::new(6, UwbChannel::Channel7, 16_470),
];

/// 1-based index into [`CHANNEL_TABLE`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelIndex(u8);

impl ChannelIndex {
    pub const FIRST: Self = Self(1);

    /// Validates a 1-based slot number.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if index >= 1 && index <= CHANNEL_SLOTS {
            Some(Self(index))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Next slot, wrapping from the last back to the first.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.0 >= CHANNEL_SLOTS {
            Self::FIRST
        } else {
            Self(self.0 + 1)
        }
    }

    #[must_use]
    pub const fn entry(self) -> ChannelEntry {
        CHANNEL_TABLE[(self.0 - 1) as usize]
    }
}

impl Default for ChannelIndex {
    fn default() -> Self {
        Self::FIRST
    }
}

/// Everything the radio driver needs for a full reconfiguration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RadioConfig {
    pub channel: UwbChannel,
    pub antenna_delay: u16,
    pub profile: RadioProfile,
}

impl RadioConfig {
    #[must_use]
    pub const fn for_slot(index: ChannelIndex, profile: RadioProfile) -> Self {
        let entry = index.entry();
        Self {
            channel: entry.channel,
            antenna_delay: entry.antenna_delay,
            profile,
        }
    }
}
