//! Console command dispatcher.
//!
//! Parsed [`Command`]s are applied to a [`ConsoleTarget`], the front-end's
//! handle on a driver and whatever drives its time base. The dispatcher stays
//! `no_std` so any front-end can reuse it.

use core::fmt;
use core::time::Duration;

use crate::config::{ConfigError, RegisterLength};

use super::grammar::{self, Command, InputPattern};
use super::help_for;
use super::status::StatusSnapshot;

/// What a batch of polling did.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AdvanceReport {
    pub transitions: u32,
    pub bits: u32,
    pub cycles: u32,
    /// Counter time that passed while advancing.
    pub elapsed_us: u64,
}

/// Answer to a `help` command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HelpReply {
    /// Usage line for one topic.
    Topic(&'static str),
    /// Every topic was requested.
    All,
}

/// Command execution successes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Status(StatusSnapshot),
    LengthChanged(RegisterLength),
    Advanced(AdvanceReport),
    /// Number of contacts the new pattern describes.
    InputsApplied(usize),
    Help(HelpReply),
}

/// Errors surfaced while executing a command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError),
    Config(ConfigError),
    UnknownTopic(&'a str),
    /// The target has no use for the command (e.g. `inputs` on real hardware).
    Unsupported(&'static str),
    PatternTooLong { provided: usize, max: usize },
}

impl From<grammar::ParseError> for CommandError<'_> {
    fn from(error: grammar::ParseError) -> Self {
        Self::Parse(error)
    }
}

impl From<ConfigError> for CommandError<'_> {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => write!(f, "syntax {error}"),
            CommandError::Config(error) => write!(f, "config {error}"),
            CommandError::UnknownTopic(topic) => write!(f, "help no topic `{topic}`"),
            CommandError::Unsupported(what) => write!(f, "unsupported {what}"),
            CommandError::PatternTooLong { provided, max } => {
                write!(f, "inputs {provided} contacts exceed the chain size {max}")
            }
        }
    }
}

/// Front-end side of the console: a driver plus its time base.
pub trait ConsoleTarget {
    /// Captures the current status.
    fn snapshot(&self) -> StatusSnapshot;

    /// Changes the register length.
    fn set_length(&mut self, length: RegisterLength) -> Result<(), ConfigError>;

    /// Polls until `count` transitions were performed.
    fn step(&mut self, count: u32) -> AdvanceReport;

    /// Lets `duration` of counter time pass, polling as it goes.
    fn run_for(&mut self, duration: Duration) -> AdvanceReport;

    /// Replaces the contact stimulus. Hardware targets refuse.
    fn set_inputs(&mut self, pattern: InputPattern<'_>) -> Result<usize, CommandError<'static>> {
        let _ = pattern;
        Err(CommandError::Unsupported("inputs"))
    }
}

/// Dispatches console commands into a [`ConsoleTarget`].
pub struct CommandExecutor<T> {
    target: T,
}

impl<T> CommandExecutor<T> {
    /// Creates a new executor around the provided target.
    pub const fn new(target: T) -> Self {
        Self { target }
    }

    /// Returns an immutable reference to the underlying target.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Returns a mutable reference to the underlying target.
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Consumes the executor and yields the inner target.
    pub fn into_inner(self) -> T {
        self.target
    }
}

impl<T> CommandExecutor<T>
where
    T: ConsoleTarget,
{
    /// Parses and executes a console line.
    pub fn execute<'a>(&mut self, line: &'a str) -> Result<CommandOutcome, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>) -> Result<CommandOutcome, CommandError<'a>> {
        match command {
            Command::Status => Ok(CommandOutcome::Status(self.target.snapshot())),
            Command::Length(length) => {
                self.target.set_length(length)?;
                Ok(CommandOutcome::LengthChanged(length))
            }
            Command::Step(count) => Ok(CommandOutcome::Advanced(self.target.step(count))),
            Command::Run(duration) => Ok(CommandOutcome::Advanced(self.target.run_for(duration))),
            Command::Inputs(pattern) => self
                .target
                .set_inputs(pattern)
                .map(CommandOutcome::InputsApplied),
            Command::Help(None) => Ok(CommandOutcome::Help(HelpReply::All)),
            Command::Help(Some(topic)) => help_for(topic)
                .map(|detail| CommandOutcome::Help(HelpReply::Topic(detail)))
                .ok_or(CommandError::UnknownTopic(topic)),
        }
    }
}
