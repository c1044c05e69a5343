//! Content for the anchor's two-line status display.
//!
//! The harness only renders text; pushing it to a panel is the sink's job
//! ([`ReportSink::show_status`](crate::telemetry::ReportSink::show_status)).

use core::fmt::Write;

use heapless::String;

use crate::channels::ChannelIndex;
use crate::harness::TestMode;

/// Characters per display line; longer text is cut off.
pub const DISPLAY_WIDTH: usize = 20;

pub type DisplayLine = String<DISPLAY_WIDTH>;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StatusLines {
    pub top: DisplayLine,
    pub bottom: DisplayLine,
}

impl StatusLines {
    /// Line 1 names the mode; line 2 shows the channel slot and, while
    /// ranging, `completed/target`.
    #[must_use]
    pub fn render(mode: TestMode, channel: ChannelIndex, progress: Option<(u32, u32)>) -> Self {
        let mut lines = Self::default();
        truncating_push(&mut lines.top, mode.name());

        let entry = channel.entry();
        // Overflow only drops trailing characters.
        let _ = write!(lines.bottom, "CH {}/{}", entry.index, entry.channel);
        if let Some((completed, target)) = progress {
            let _ = write!(lines.bottom, " {completed}/{target}");
        }
        lines
    }

    #[must_use]
    pub fn top(&self) -> &str {
        &self.top
    }

    #[must_use]
    pub fn bottom(&self) -> &str {
        &self.bottom
    }
}

fn truncating_push(line: &mut DisplayLine, text: &str) {
    for ch in text.chars() {
        if line.push(ch).is_err() {
            break;
        }
    }
}
