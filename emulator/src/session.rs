use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use anchor_core::TestHarness;
use anchor_core::config::HarnessConfig;
use anchor_core::display::StatusLines;
use anchor_core::input::{Button, CommandSource};
use anchor_core::markers::TimingMarkers;
use anchor_core::repl::grammar::{ArgumentSpec, COMMANDS};
use anchor_core::repl::{Line, LineAssembler, LineError};
use anchor_core::telemetry::{Report, ReportSink};
use anchor_core::time::Instant;

use crate::sim::{HostClock, HostDelay, SimPin, SimRadio, SimTag};

type EmulatorHarness = TestHarness<HostClock, SimRadio, SimTag, SimPin, SimPin, HostDelay>;

/// Emulator-side commands handled before the harness sees a line.
pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("button", "button                 - press the channel button"),
    ("status", "status                 - show mode, channel and counters"),
    ("help", "help                   - list commands"),
    ("exit", "exit | quit            - close the session"),
];

/// Settings collected from the command line.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub config: HarnessConfig,
    pub tag_interval: Duration,
    pub distance_m: f32,
    pub trace_pins: bool,
    pub trace_radio: bool,
    pub transcript: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            config: HarnessConfig::default(),
            tag_interval: Duration::from_millis(200),
            distance_m: 1.5,
            trace_pins: false,
            trace_radio: false,
            transcript: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Control {
    Continue,
    Exit,
}

pub struct Session {
    harness: EmulatorHarness,
    console: Console,
    assembler: LineAssembler,
    button: HostButton,
    lines: PendingLines,
}

impl Session {
    pub fn new(options: &SessionOptions) -> io::Result<Self> {
        let clock = HostClock::new();
        let markers = TimingMarkers::new(
            SimPin::new('A', options.trace_pins, clock),
            SimPin::new('B', options.trace_pins, clock),
            HostDelay,
        );
        let radio = SimRadio::new(options.trace_radio);
        let tag = SimTag::new(options.tag_interval, options.distance_m);

        let transcript = match &options.transcript {
            Some(path) => Some(TranscriptLogger::new(Path::new(path))?),
            None => None,
        };
        let mut console = Console {
            transcript,
            started_at: HostInstant::now(),
            last_status: None,
        };

        let mut harness = TestHarness::new(clock, radio, tag, markers, options.config);
        harness.begin(&mut console);

        Ok(Self {
            harness,
            console,
            assembler: LineAssembler::new(),
            button: HostButton::default(),
            lines: PendingLines::default(),
        })
    }

    /// Routes one line typed by the operator.
    pub fn handle_input(&mut self, input: &str) -> Control {
        let trimmed = input.trim();
        self.console.record_host(trimmed);

        if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            return Control::Exit;
        }
        if trimmed.eq_ignore_ascii_case("help") {
            self.print_help();
            return Control::Continue;
        }
        if trimmed.eq_ignore_ascii_case("button") {
            self.button.pending = true;
            return Control::Continue;
        }
        if trimmed.eq_ignore_ascii_case("status") {
            self.print_status();
            return Control::Continue;
        }

        // Same byte path as the command UART.
        for byte in input.bytes().chain(Some(b'\n')) {
            match self.assembler.push(byte) {
                Ok(Some(line)) => self.lines.0.push_back(Ok(line)),
                Ok(None) => {}
                Err(err) => self.lines.0.push_back(Err(err)),
            }
        }
        Control::Continue
    }

    /// One main-loop iteration of the harness.
    pub fn step(&mut self) {
        self.harness
            .dispatch(&mut self.button, &mut self.lines, &mut self.console);
    }

    /// Radio frames handed to the simulated transmitter so far.
    pub fn frames_sent(&self) -> u64 {
        self.harness.radio().frames_sent()
    }

    fn print_help(&mut self) {
        let mut lines = Vec::new();
        lines.push("Harness commands:".to_string());
        for spec in &COMMANDS {
            let usage = match spec.argument {
                ArgumentSpec::None => spec.keyword.to_string(),
                ArgumentSpec::Optional => format!("{} [n]", spec.keyword),
                ArgumentSpec::Required => format!("{} <n>", spec.keyword),
            };
            lines.push(format!("  {usage:<22} - {}", spec.help));
        }
        lines.push("Emulator commands:".to_string());
        for (_, help) in HELP_TOPICS {
            lines.push(format!("  {help}"));
        }
        self.console.print(&lines);
    }

    fn print_status(&mut self) {
        let harness = &self.harness;
        let entry = harness.channel().entry();
        let mut lines = vec![format!(
            "mode={} anchor={:?} radio={:?} channel={}/{} frames={}",
            harness.mode().name(),
            harness.anchor_state(),
            harness.radio_mode(),
            entry.index,
            entry.channel.number(),
            harness.radio().frames_sent(),
        )];
        if let Some(session) = harness.ranging_session() {
            let counters = session.counters();
            lines.push(format!(
                "ranging phase={:?} completed={}/{} requests={} ranges={}",
                session.phase(),
                counters.completed,
                session.target(),
                counters.request_pulses,
                counters.range_pulses,
            ));
        }
        if let Some(tx) = harness.transmitter() {
            lines.push(format!(
                "tx attempts={} interval={}ms last={}ms in_flight={}",
                tx.attempts(),
                tx.interval().as_millis(),
                tx.last_attempt(),
                tx.in_flight(),
            ));
        }
        if let Some(step) = harness.sequence_step() {
            lines.push(format!("auto step={step}"));
        }
        self.console.print(&lines);
    }
}

/// Button pressed by typing `button`.
#[derive(Default)]
struct HostButton {
    pending: bool,
}

impl Button for HostButton {
    fn poll_press(&mut self, _now: Instant) -> bool {
        std::mem::take(&mut self.pending)
    }
}

#[derive(Default)]
struct PendingLines(VecDeque<Result<Line, LineError>>);

impl CommandSource for PendingLines {
    fn poll_line(&mut self) -> Option<Result<Line, LineError>> {
        self.0.pop_front()
    }
}

/// Prints report lines on stdout and display refreshes on stderr, mirroring
/// both into the optional transcript.
struct Console {
    transcript: Option<TranscriptLogger>,
    started_at: HostInstant,
    last_status: Option<StatusLines>,
}

impl Console {
    fn print(&mut self, lines: &[String]) {
        for line in lines {
            println!("{line}");
            self.record(TranscriptRole::Emulator, line);
        }
    }

    fn record_host(&mut self, line: &str) {
        if !line.is_empty() {
            self.record(TranscriptRole::Host, line);
        }
    }

    fn record(&mut self, role: TranscriptRole, line: &str) {
        let elapsed = self.started_at.elapsed();
        let Some(transcript) = self.transcript.as_mut() else {
            return;
        };
        if let Err(err) = transcript.append_line(elapsed, role, line) {
            eprintln!("transcript disabled: {err}");
            self.transcript = None;
        }
    }
}

impl ReportSink for Console {
    fn report(&mut self, report: &Report) {
        let line = report.to_string();
        println!("{line}");
        self.record(TranscriptRole::Emulator, &line);
    }

    fn show_status(&mut self, status: &StatusLines) {
        if self.last_status.as_ref() == Some(status) {
            return;
        }
        eprintln!("[display] {:<20} | {}", status.top(), status.bottom());
        self.last_status = Some(status.clone());
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# UWB anchor emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Copy, Clone)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_core::TestMode;

    fn session() -> Session {
        Session::new(&SessionOptions::default())
            .expect("session without transcript")
    }

    #[test]
    fn overlong_input_cancels_the_running_test() {
        let mut session = session();
        session.handle_input("RX_TEST");
        session.step();
        assert_eq!(session.harness.mode(), TestMode::RxTest);

        session.handle_input(&"X".repeat(120));
        session.step();
        assert_eq!(session.harness.mode(), TestMode::None);
    }

    #[test]
    fn local_commands_leave_the_test_running() {
        let mut session = session();
        session.handle_input("RX_TEST");
        session.step();

        assert_eq!(session.handle_input("status"), Control::Continue);
        assert_eq!(session.handle_input("help"), Control::Continue);
        session.step();
        assert_eq!(session.harness.mode(), TestMode::RxTest);

        assert_eq!(session.handle_input("quit"), Control::Exit);
    }
}
