//! Status records emitted by the harness and the sinks that receive them.
//!
//! The core never writes output itself. Every observable event becomes a
//! [`Report`], handed to a caller-supplied [`ReportSink`]; the firmware
//! forwards rendered lines to the command UART and the emulator prints them.
//! Each report renders to exactly one comma-separated line whose first field
//! is a fixed tag, so captures can be parsed alongside the analyzer trace.

use core::fmt;
use core::time::Duration;

use heapless::HistoryBuf;

use crate::channels::ChannelEntry;
use crate::display::StatusLines;
use crate::harness::TestMode;
use crate::radio::Device;
use crate::ranging::{RangeRecord, RangingSummary};
use crate::repl::{CommandError, LineError};
use crate::sequences::SequenceStep;
use crate::time::{Instant, duration_millis};

/// Input the harness refused to act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    Command(CommandError),
    Line(LineError),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Command(err) => err.fmt(f),
            Rejection::Line(err) => err.fmt(f),
        }
    }
}

/// One status event.
#[derive(Clone, Debug, PartialEq)]
pub enum Report {
    ModeStarted {
        mode: TestMode,
        at: Instant,
    },
    ModeStopped {
        mode: TestMode,
        at: Instant,
    },
    DeviceAdded {
        device: Device,
        at: Instant,
    },
    DeviceRemoved {
        device: Device,
        at: Instant,
    },
    RangingStarted {
        target: u32,
        at: Instant,
    },
    Range(RangeRecord),
    RangingComplete(RangingSummary),
    /// Session ended before reaching its target.
    RangingStopped(RangingSummary),
    AutoStep {
        number: usize,
        total: usize,
        step: SequenceStep,
        duration: Duration,
        at: Instant,
    },
    AutoComplete {
        at: Instant,
    },
    SleepWake {
        slept: Duration,
        at: Instant,
    },
    Channel(ChannelEntry),
    Rejected(Rejection),
}

impl Report {
    /// Fixed first field of the rendered line.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Report::ModeStarted { .. } => "MODE",
            Report::ModeStopped { .. } => "STOP",
            Report::DeviceAdded { .. } => "DEVICE_ADDED",
            Report::DeviceRemoved { .. } => "DEVICE_REMOVED",
            Report::RangingStarted { .. } => "RANGING_START",
            Report::Range(_) => "RANGE",
            Report::RangingComplete(_) => "RANGING_COMPLETE",
            Report::RangingStopped(_) => "RANGING_STOP",
            Report::AutoStep { .. } | Report::AutoComplete { .. } => "AUTO",
            Report::SleepWake { .. } => "SLEEP_WAKE",
            Report::Channel(_) => "CHANNEL",
            Report::Rejected(_) => "ERR",
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        match self {
            Report::ModeStarted { mode, at } | Report::ModeStopped { mode, at } => {
                write!(f, "{tag},{},{at}", mode.name())
            }
            Report::DeviceAdded { device, at } | Report::DeviceRemoved { device, at } => {
                write!(f, "{tag},0x{:04X},{at}", device.short_address)
            }
            Report::RangingStarted { target, at } => write!(f, "{tag},{target},{at}"),
            Report::Range(record) => {
                write!(
                    f,
                    "{tag},{},{:.2},{},{},{}",
                    record.index,
                    record.distance_m,
                    record.request_pulses,
                    record.range_pulses,
                    duration_millis(record.elapsed),
                )?;
                for stamp in record.timestamps.as_array() {
                    write!(f, ",{stamp}")?;
                }
                Ok(())
            }
            Report::RangingComplete(summary) => write!(
                f,
                "{tag},{},{},{},{}",
                summary.counters.completed,
                summary.counters.request_pulses,
                summary.counters.range_pulses,
                duration_millis(summary.elapsed),
            ),
            Report::RangingStopped(summary) => write!(
                f,
                "{tag},{}/{},{},{},{}",
                summary.counters.completed,
                summary.target,
                summary.counters.request_pulses,
                summary.counters.range_pulses,
                duration_millis(summary.elapsed),
            ),
            Report::AutoStep {
                number,
                total,
                step,
                duration,
                at,
            } => write!(
                f,
                "{tag},{number}/{total},{step},{},{at}",
                duration_millis(*duration)
            ),
            Report::AutoComplete { at } => write!(f, "{tag},COMPLETE,{at}"),
            Report::SleepWake { slept, at } => {
                write!(f, "{tag},{},{at}", duration_millis(*slept))
            }
            Report::Channel(entry) => write!(
                f,
                "{tag},{},{},{}",
                entry.index, entry.channel, entry.antenna_delay
            ),
            Report::Rejected(reason) => write!(f, "{tag},{reason}"),
        }
    }
}

/// Destination for harness output.
pub trait ReportSink {
    fn report(&mut self, report: &Report);

    /// Refreshes the two-line display. Boards without one ignore it.
    fn show_status(&mut self, _status: &StatusLines) {}
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn report(&mut self, report: &Report) {
        (**self).report(report);
    }

    fn show_status(&mut self, status: &StatusLines) {
        (**self).show_status(status);
    }
}

/// Total number of reports retained in memory by default.
pub const REPORT_RING_CAPACITY: usize = 64;

/// Keeps the most recent reports and display state in a fixed-size ring.
pub struct ReportRecorder<const CAPACITY: usize = REPORT_RING_CAPACITY> {
    ring: HistoryBuf<Report, CAPACITY>,
    status: Option<StatusLines>,
    total: u32,
}

impl<const CAPACITY: usize> ReportRecorder<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            status: None,
            total: 0,
        }
    }

    /// Returns the recorded reports in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &Report> + '_ {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&Report> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Reports received since construction, including ones overwritten in the ring.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.total
    }

    /// Last display content pushed by the harness.
    #[must_use]
    pub fn status(&self) -> Option<&StatusLines> {
        self.status.as_ref()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<const CAPACITY: usize> Default for ReportRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> ReportSink for ReportRecorder<CAPACITY> {
    fn report(&mut self, report: &Report) {
        self.total = self.total.wrapping_add(1);
        self.ring.write(report.clone());
    }

    fn show_status(&mut self, status: &StatusLines) {
        self.status = Some(status.clone());
    }
}
