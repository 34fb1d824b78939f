#![allow(clippy::module_name_repetitions)]

//! Parser for the operator console.
//!
//! Commands are short single lines, so the grammar runs `winnow` combinators
//! straight over the `&str` without a separate token pass. Keywords are
//! case-insensitive; arguments are whitespace separated.

use core::fmt;
use core::time::Duration;

use winnow::ascii::{Caseless, Uint, dec_uint, space0, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::config::RegisterLength;

type GrammarResult<T> = Result<T, ErrMode<ContextError>>;

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Status,
    /// Change the register length (restarts the cycle).
    Length(RegisterLength),
    /// Advance the emulated clock until this many transitions happened.
    Step(u32),
    /// Advance the emulated clock by a fixed amount, polling along the way.
    Run(Duration),
    /// Replace the emulated contact pattern (`0`/`1`, `_` ignored).
    Inputs(InputPattern<'a>),
    Help(Option<&'a str>),
}

/// Validated contact pattern borrowed from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputPattern<'a> {
    raw: &'a str,
}

impl<'a> InputPattern<'a> {
    /// Returns the pattern as typed, separators included.
    #[must_use]
    pub const fn as_str(&self) -> &'a str {
        self.raw
    }

    /// Iterates the contact levels in chain order (`true` == occupied).
    pub fn levels(&self) -> impl Iterator<Item = bool> + 'a {
        self.raw
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c == '1')
    }

    /// Number of contacts described.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels().count()
    }

    /// Returns `true` when the pattern holds separators only.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What went wrong while parsing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    Empty,
    UnknownCommand,
    ExpectedInteger,
    ExpectedDuration,
    ExpectedPattern,
    TrailingInput,
}

/// Parse failure with the byte offset into the trimmed line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl ParseError {
    const fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            ParseErrorKind::Empty => "empty command",
            ParseErrorKind::UnknownCommand => "unknown command",
            ParseErrorKind::ExpectedInteger => "expected an unsigned integer",
            ParseErrorKind::ExpectedDuration => "expected a duration like 250us, 5ms or 1s",
            ParseErrorKind::ExpectedPattern => "expected a pattern of 0/1 characters",
            ParseErrorKind::TrailingInput => "unexpected trailing input",
        };
        write!(f, "{what} at offset {}", self.offset)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Keyword {
    Status,
    Length,
    Step,
    Run,
    Inputs,
    Help,
}

fn lookup_keyword(word: &str) -> Option<Keyword> {
    const TABLE: [(&str, Keyword); 6] = [
        ("status", Keyword::Status),
        ("length", Keyword::Length),
        ("step", Keyword::Step),
        ("run", Keyword::Run),
        ("inputs", Keyword::Inputs),
        ("help", Keyword::Help),
    ];

    TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(word))
        .map(|(_, keyword)| *keyword)
}

/// Parses a console line into a [`Command`].
pub fn parse(line: &str) -> Result<Command<'_>, ParseError> {
    let source = line.trim();
    if source.is_empty() {
        return Err(ParseError::new(ParseErrorKind::Empty, 0));
    }

    let mut input = source;
    let offset = |rest: &str| source.len() - rest.len();

    let name = word(&mut input).map_err(|_| ParseError::new(ParseErrorKind::UnknownCommand, 0))?;
    let keyword =
        lookup_keyword(name).ok_or(ParseError::new(ParseErrorKind::UnknownCommand, 0))?;

    let argument_at = offset(input);
    let command = match keyword {
        Keyword::Status => Command::Status,
        Keyword::Length => integer_argument(&mut input)
            .map(Command::Length)
            .map_err(|_| ParseError::new(ParseErrorKind::ExpectedInteger, argument_at))?,
        Keyword::Step => opt(integer_argument)
            .parse_next(&mut input)
            .map(|count| Command::Step(count.unwrap_or(1)))
            .map_err(|_| ParseError::new(ParseErrorKind::ExpectedInteger, argument_at))?,
        Keyword::Run => preceded(space1, duration)
            .parse_next(&mut input)
            .map(Command::Run)
            .map_err(|_| ParseError::new(ParseErrorKind::ExpectedDuration, argument_at))?,
        Keyword::Inputs => preceded(space1, pattern)
            .parse_next(&mut input)
            .map(Command::Inputs)
            .map_err(|_| ParseError::new(ParseErrorKind::ExpectedPattern, argument_at))?,
        Keyword::Help => opt(preceded(space1, word))
            .parse_next(&mut input)
            .map(Command::Help)
            .map_err(|_| ParseError::new(ParseErrorKind::TrailingInput, argument_at))?,
    };

    let _ = space0::<_, ErrMode<ContextError>>.parse_next(&mut input);
    if !input.is_empty() {
        return Err(ParseError::new(ParseErrorKind::TrailingInput, offset(input)));
    }

    Ok(command)
}

fn word<'a>(input: &mut &'a str) -> GrammarResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphabetic()).parse_next(input)
}

fn integer_argument<T: Uint>(input: &mut &str) -> GrammarResult<T> {
    preceded(space1, dec_uint).parse_next(input)
}

fn duration(input: &mut &str) -> GrammarResult<Duration> {
    let amount: u64 = dec_uint.parse_next(input)?;
    let unit = alt((
        Caseless("us").value(Duration::from_micros as fn(u64) -> Duration),
        Caseless("ms").value(Duration::from_millis as fn(u64) -> Duration),
        Caseless("s").value(Duration::from_secs as fn(u64) -> Duration),
    ))
    .parse_next(input)?;
    Ok(unit(amount))
}

fn pattern<'a>(input: &mut &'a str) -> GrammarResult<InputPattern<'a>> {
    take_while(1.., |c: char| matches!(c, '0' | '1' | '_'))
        .map(|raw| InputPattern { raw })
        .parse_next(input)
}
