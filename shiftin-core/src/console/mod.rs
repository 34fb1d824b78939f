//! Operator console shared between the emulator and other front-ends.
//!
//! The grammar lives in [`grammar`]; [`commands`] dispatches parsed commands
//! to a [`commands::ConsoleTarget`] and [`status`] renders driver state for
//! the `status` command. Front-ends own the I/O and the platform behind the
//! target.

pub mod commands;
pub mod grammar;
pub mod status;

/// One-line usage text per command, in display order.
pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "status",
        "status                  - show driver state, timing and the last cycle",
    ),
    (
        "length",
        "length <bits>           - change the register length (restarts the cycle)",
    ),
    (
        "step",
        "step [count]            - advance until <count> transitions happened",
    ),
    (
        "run",
        "run <n>(us|ms|s)        - advance the clock by a duration, polling as it goes",
    ),
    (
        "inputs",
        "inputs <pattern>        - set contact levels, e.g. 1010_0000",
    ),
    ("help", "help [topic]            - show help for a command"),
];

/// Looks up the usage line for `topic`, ignoring case.
#[must_use]
pub fn help_for(topic: &str) -> Option<&'static str> {
    HELP_TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        .map(|(_, detail)| *detail)
}
