//! Operator command input shared between firmware and emulator targets.
//!
//! [`line`] turns a serial byte stream into bounded lines and [`grammar`]
//! turns a line into a [`TestRequest`](grammar::TestRequest).

pub mod grammar;
pub mod line;

pub use grammar::{CommandError, CommandName, TestRequest, parse};
pub use line::{Line, LineAssembler, LineError, MAX_LINE_LEN};
