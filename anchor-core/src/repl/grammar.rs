#![allow(clippy::module_name_repetitions)]

//! Parser for operator command lines.
//!
//! A line is one command keyword optionally followed by a single decimal
//! integer, separated by spaces or tabs. Keywords are matched exactly as
//! listed in [`COMMANDS`]. The shape of the line is recognized with `winnow`
//! combinators; argument rules are then checked against the catalog entry.

use core::fmt;
use core::num::NonZeroU32;
use core::time::Duration;

use heapless::String;
use winnow::ascii::{digit1, space0, space1};
use winnow::combinator::{eof, opt, preceded};
use winnow::prelude::*;
use winnow::token::take_while;

/// Longest command keyword echoed back in an error.
pub const MAX_KEYWORD_LEN: usize = 24;

/// Commands understood by the harness.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandName {
    IdleTest,
    RxTest,
    TxTest,
    RangingTest,
    SleepCycle,
    Auto,
    StopTest,
}

/// Whether a command takes its trailing integer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArgumentSpec {
    None,
    Optional,
    Required,
}

/// Catalog entry pairing a keyword with its argument rule.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    pub name: CommandName,
    pub keyword: &'static str,
    pub argument: ArgumentSpec,
    pub help: &'static str,
}

impl CommandSpec {
    const fn new(
        name: CommandName,
        keyword: &'static str,
        argument: ArgumentSpec,
        help: &'static str,
    ) -> Self {
        Self {
            name,
            keyword,
            argument,
            help,
        }
    }
}

/// Every accepted command keyword.
pub static COMMANDS: [CommandSpec; 7] = [
    CommandSpec::new(
        CommandName::IdleTest,
        "IDLE_TEST",
        ArgumentSpec::None,
        "idle power measurement",
    ),
    CommandSpec::new(
        CommandName::RxTest,
        "RX_TEST",
        ArgumentSpec::None,
        "continuous receive",
    ),
    CommandSpec::new(
        CommandName::TxTest,
        "TX_TEST",
        ArgumentSpec::Optional,
        "periodic transmit [interval ms]",
    ),
    CommandSpec::new(
        CommandName::RangingTest,
        "RANGING_TEST",
        ArgumentSpec::Required,
        "bounded ranging session <count>",
    ),
    CommandSpec::new(
        CommandName::SleepCycle,
        "SLEEP_CYCLE",
        ArgumentSpec::Optional,
        "one deep-sleep cycle [duration ms]",
    ),
    CommandSpec::new(
        CommandName::Auto,
        "auto",
        ArgumentSpec::None,
        "seven-phase automatic sequence",
    ),
    CommandSpec::new(
        CommandName::StopTest,
        "STOP_TEST",
        ArgumentSpec::None,
        "stop and return to no test",
    ),
];

impl CommandName {
    #[must_use]
    pub fn spec(self) -> &'static CommandSpec {
        let index = match self {
            CommandName::IdleTest => 0,
            CommandName::RxTest => 1,
            CommandName::TxTest => 2,
            CommandName::RangingTest => 3,
            CommandName::SleepCycle => 4,
            CommandName::Auto => 5,
            CommandName::StopTest => 6,
        };
        &COMMANDS[index]
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        self.spec().keyword
    }
}

/// Looks up a catalog entry by its exact keyword.
#[must_use]
pub fn find(keyword: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.keyword == keyword)
}

/// A validated request to start or stop a test.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TestRequest {
    Idle,
    Rx,
    /// `None` selects the configured default interval.
    Tx { interval: Option<Duration> },
    Ranging { target: NonZeroU32 },
    /// `None` selects the configured default duration.
    Sleep { duration: Option<Duration> },
    Auto,
    Stop,
}

/// Reasons a command line was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// The line is not `KEYWORD [integer]`.
    Malformed,
    /// The keyword is not in the catalog.
    Unknown(String<MAX_KEYWORD_LEN>),
    MissingArgument(CommandName),
    /// Zero or out-of-range argument.
    InvalidArgument(CommandName),
    /// An argument was given to a command that takes none.
    UnexpectedArgument(CommandName),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Malformed => f.write_str("malformed command"),
            CommandError::Unknown(keyword) => write!(f, "unknown command {keyword}"),
            CommandError::MissingArgument(name) => {
                write!(f, "{} requires an argument", name.keyword())
            }
            CommandError::InvalidArgument(name) => {
                write!(f, "{} argument must be a positive integer", name.keyword())
            }
            CommandError::UnexpectedArgument(name) => {
                write!(f, "{} takes no argument", name.keyword())
            }
        }
    }
}

/// Raw `(keyword, argument)` split of a line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandLine<'a> {
    pub keyword: &'a str,
    pub argument: Option<&'a str>,
}

fn keyword<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

fn argument<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    preceded(space1, digit1).parse_next(input)
}

fn command_line<'s>(input: &mut &'s str) -> ModalResult<CommandLine<'s>> {
    let (_, keyword, argument, _, _) =
        (space0, keyword, opt(argument), space0, eof).parse_next(input)?;
    Ok(CommandLine { keyword, argument })
}

/// Splits a line into keyword and optional integer text without validating either.
pub fn split(line: &str) -> Result<CommandLine<'_>, CommandError> {
    command_line.parse(line).map_err(|_| CommandError::Malformed)
}

/// Parses a full command line into a [`TestRequest`].
pub fn parse(line: &str) -> Result<TestRequest, CommandError> {
    let CommandLine { keyword, argument } = split(line)?;

    let Some(spec) = find(keyword) else {
        return Err(CommandError::Unknown(truncated(keyword)));
    };

    let value = match (spec.argument, argument) {
        (ArgumentSpec::None, Some(_)) => {
            return Err(CommandError::UnexpectedArgument(spec.name));
        }
        (ArgumentSpec::Required, None) => return Err(CommandError::MissingArgument(spec.name)),
        (_, Some(text)) => Some(positive(text).ok_or(CommandError::InvalidArgument(spec.name))?),
        (_, None) => None,
    };

    let millis = |value: Option<NonZeroU32>| value.map(|v| Duration::from_millis(v.get().into()));

    Ok(match spec.name {
        CommandName::IdleTest => TestRequest::Idle,
        CommandName::RxTest => TestRequest::Rx,
        CommandName::TxTest => TestRequest::Tx {
            interval: millis(value),
        },
        CommandName::RangingTest => match value {
            Some(target) => TestRequest::Ranging { target },
            None => return Err(CommandError::MissingArgument(spec.name)),
        },
        CommandName::SleepCycle => TestRequest::Sleep {
            duration: millis(value),
        },
        CommandName::Auto => TestRequest::Auto,
        CommandName::StopTest => TestRequest::Stop,
    })
}

fn positive(text: &str) -> Option<NonZeroU32> {
    text.parse::<u32>().ok().and_then(NonZeroU32::new)
}

fn truncated(keyword: &str) -> String<MAX_KEYWORD_LEN> {
    let mut out = String::new();
    for ch in keyword.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
