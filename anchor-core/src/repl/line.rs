//! Byte-at-a-time line assembly for serial command input.

use core::fmt;
use core::str;

use heapless::{String, Vec};

/// Maximum number of bytes accepted on a single line (excluding terminator).
pub const MAX_LINE_LEN: usize = 96;

/// A complete, terminator-free command line.
pub type Line = String<MAX_LINE_LEN>;

/// Errors surfaced while assembling a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineError {
    /// Input exceeded [`MAX_LINE_LEN`]; the rest of the line is discarded.
    Overflow,
    /// The assembled bytes are not UTF-8.
    InvalidUtf8,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::Overflow => write!(f, "line longer than {MAX_LINE_LEN} bytes"),
            LineError::InvalidUtf8 => f.write_str("line is not valid UTF-8"),
        }
    }
}

/// Collects bytes until CR or LF. Backspace (0x08) and DEL (0x7f) drop the
/// previous byte. Empty lines are swallowed, so CR LF yields one line.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    discarding: bool,
}

impl LineAssembler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feeds one byte. Returns a line when a terminator completes one.
    pub fn push(&mut self, byte: u8) -> Result<Option<Line>, LineError> {
        match byte {
            b'\r' | b'\n' => {
                if core::mem::take(&mut self.discarding) {
                    self.buffer.clear();
                    return Ok(None);
                }
                self.take_line()
            }
            _ if self.discarding => Ok(None),
            0x08 | 0x7f => {
                self.buffer.pop();
                Ok(None)
            }
            value => {
                if self.buffer.push(value).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(LineError::Overflow);
                }
                Ok(None)
            }
        }
    }

    /// Bytes collected so far on the current line.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    fn take_line(&mut self) -> Result<Option<Line>, LineError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let mut line = Line::new();
        let result = str::from_utf8(&self.buffer)
            .map_err(|_| LineError::InvalidUtf8)
            .and_then(|text| line.push_str(text).map_err(|_| LineError::Overflow));
        self.buffer.clear();
        result.map(|()| Some(line))
    }
}
