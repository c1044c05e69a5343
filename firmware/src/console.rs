//! Command UART plumbing between the harness task and the UART task.
//!
//! The harness never awaits. Rendered report lines are pushed into a bounded
//! channel with `try_send` and dropped (and counted) when the UART falls
//! behind. Framed command lines, including lines that failed framing, travel
//! the other way through a second channel that the harness drains once per
//! loop iteration.

use core::fmt::Write as _;

use anchor_core::display::StatusLines;
use anchor_core::input::CommandSource;
use anchor_core::repl::{Line, LineAssembler, LineError};
use anchor_core::telemetry::{Report, ReportSink};
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use heapless::String;
use portable_atomic::{AtomicU32, Ordering};

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
type ConsoleMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ConsoleMutex = NoopRawMutex;

/// Longest rendered report line, excluding the terminator.
pub const REPORT_LINE_LEN: usize = 160;

/// Report lines buffered ahead of the UART writer.
pub const REPORT_QUEUE_DEPTH: usize = 16;

/// Command lines buffered ahead of the harness.
pub const COMMAND_QUEUE_DEPTH: usize = 4;

pub type ReportLine = String<REPORT_LINE_LEN>;

pub type ReportChannel = Channel<ConsoleMutex, ReportLine, REPORT_QUEUE_DEPTH>;
pub type ReportSender<'a> = Sender<'a, ConsoleMutex, ReportLine, REPORT_QUEUE_DEPTH>;
pub type ReportReceiver<'a> = Receiver<'a, ConsoleMutex, ReportLine, REPORT_QUEUE_DEPTH>;

/// A framed command line, or the reason framing failed.
pub type CommandFrame = Result<Line, LineError>;

pub type CommandChannel = Channel<ConsoleMutex, CommandFrame, COMMAND_QUEUE_DEPTH>;
pub type CommandSender<'a> = Sender<'a, ConsoleMutex, CommandFrame, COMMAND_QUEUE_DEPTH>;
pub type CommandReceiver<'a> = Receiver<'a, ConsoleMutex, CommandFrame, COMMAND_QUEUE_DEPTH>;

/// Both console channels, shared as one static.
pub struct ConsoleQueues {
    reports: ReportChannel,
    commands: CommandChannel,
}

impl ConsoleQueues {
    pub const fn new() -> Self {
        Self {
            reports: Channel::new(),
            commands: Channel::new(),
        }
    }

    pub fn report_sender(&self) -> ReportSender<'_> {
        self.reports.sender()
    }

    pub fn report_receiver(&self) -> ReportReceiver<'_> {
        self.reports.receiver()
    }

    pub fn command_sender(&self) -> CommandSender<'_> {
        self.commands.sender()
    }

    pub fn command_receiver(&self) -> CommandReceiver<'_> {
        self.commands.receiver()
    }
}

impl Default for ConsoleQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders reports into the UART queue without blocking the harness.
pub struct UartReportSink<'a> {
    sender: ReportSender<'a>,
    dropped: &'a AtomicU32,
}

impl<'a> UartReportSink<'a> {
    pub fn new(sender: ReportSender<'a>, dropped: &'a AtomicU32) -> Self {
        Self { sender, dropped }
    }

    fn drop_line(&self, reason: &'static str) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        emit_dropped(reason, total);
    }
}

impl ReportSink for UartReportSink<'_> {
    fn report(&mut self, report: &Report) {
        let mut line = ReportLine::new();
        if write!(line, "{report}").is_err() {
            self.drop_line("overlong");
            return;
        }

        match self.sender.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.drop_line("queue full"),
        }
    }

    fn show_status(&mut self, status: &StatusLines) {
        emit_status(status.top(), status.bottom());
    }
}

/// Feeds the harness from the command channel, one line per loop iteration.
pub struct QueuedCommands<'a> {
    receiver: CommandReceiver<'a>,
}

impl<'a> QueuedCommands<'a> {
    pub fn new(receiver: CommandReceiver<'a>) -> Self {
        Self { receiver }
    }
}

impl CommandSource for QueuedCommands<'_> {
    fn poll_line(&mut self) -> Option<CommandFrame> {
        self.receiver.try_receive().ok()
    }
}

/// UART-side line assembly.
///
/// Framing errors are queued alongside good lines so the harness rejects
/// them in order, cancelling whatever test is running.
pub struct CommandIntake<'a> {
    assembler: LineAssembler,
    sender: CommandSender<'a>,
}

impl<'a> CommandIntake<'a> {
    pub fn new(sender: CommandSender<'a>) -> Self {
        Self {
            assembler: LineAssembler::new(),
            sender,
        }
    }

    /// Returns the number of frames queued for the harness.
    pub fn ingest(&mut self, bytes: &[u8]) -> usize {
        let mut queued = 0;
        for &byte in bytes {
            let frame = match self.assembler.push(byte) {
                Ok(Some(line)) => Ok(line),
                Ok(None) => continue,
                Err(err) => Err(err),
            };
            match self.sender.try_send(frame) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => emit_busy(),
            }
        }
        queued
    }
}

#[cfg(target_os = "none")]
fn emit_dropped(reason: &'static str, total: u32) {
    defmt::warn!("console: dropped report line ({}), total={}", reason, total);
}

#[cfg(not(target_os = "none"))]
fn emit_dropped(reason: &'static str, total: u32) {
    eprintln!("console: dropped report line ({reason}), total={total}");
}

#[cfg(target_os = "none")]
fn emit_status(top: &str, bottom: &str) {
    defmt::info!("display: {} | {}", top, bottom);
}

#[cfg(not(target_os = "none"))]
fn emit_status(top: &str, bottom: &str) {
    println!("display: {top} | {bottom}");
}

#[cfg(target_os = "none")]
fn emit_busy() {
    defmt::warn!("console: command queue full, line discarded");
}

#[cfg(not(target_os = "none"))]
fn emit_busy() {
    eprintln!("console: command queue full, line discarded");
}
