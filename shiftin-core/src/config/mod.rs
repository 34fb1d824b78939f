//! Register configuration and its validation rules.
//!
//! A [`RegisterConfig`] binds platform lines to protocol roles and fixes the
//! two periods the state machine runs on. Validation happens once, when a
//! driver is built or its length changes; `poll` itself never fails.

use core::fmt;
use core::time::Duration;

use crate::lines::{LineRole, LineRoles, Micros};

/// Number of bits per read cycle.
pub type RegisterLength = u16;

/// Shortest accepted period. Anything shorter yields a zero half-period gate.
pub const MIN_PERIOD: Duration = Duration::from_micros(2);
/// Clock period used when a front-end does not override it.
pub const DEFAULT_CLOCK_PERIOD: Duration = Duration::from_micros(100);
/// Reset period used when a front-end does not override it.
pub const DEFAULT_RESET_PERIOD: Duration = Duration::from_micros(60);

/// Reasons a configuration or length is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// Register length must be at least one bit.
    ZeroLength,
    /// Clock period shorter than [`MIN_PERIOD`].
    ClockPeriodTooShort,
    /// Reset period shorter than [`MIN_PERIOD`].
    ResetPeriodTooShort,
    /// Period the 32-bit microsecond counter cannot time. The gate needs
    /// `elapsed > period`, so `Micros::MAX` itself is out of range.
    PeriodTooLong(Duration),
    /// Two roles were bound to the same line.
    AliasedLines { first: LineRole, second: LineRole },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroLength => f.write_str("register length must be at least 1"),
            ConfigError::ClockPeriodTooShort => {
                write!(f, "clock period must be at least {}us", MIN_PERIOD.as_micros())
            }
            ConfigError::ResetPeriodTooShort => {
                write!(f, "reset period must be at least {}us", MIN_PERIOD.as_micros())
            }
            ConfigError::PeriodTooLong(period) => {
                write!(f, "period {}us exceeds the counter range", period.as_micros())
            }
            ConfigError::AliasedLines { first, second } => {
                write!(f, "{first} and {second} share a line")
            }
        }
    }
}

/// Validated periods in counter units.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timing {
    pub clock_period: Micros,
    pub reset_period: Micros,
}

impl Timing {
    /// Half of the clock period, truncated.
    #[must_use]
    pub const fn half_clock(&self) -> Micros {
        self.clock_period / 2
    }

    /// Half of the reset period, truncated.
    #[must_use]
    pub const fn half_reset(&self) -> Micros {
        self.reset_period / 2
    }
}

/// Line roles and timing for one register chain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegisterConfig {
    pub lines: LineRoles,
    pub clock_period: Duration,
    pub reset_period: Duration,
}

impl RegisterConfig {
    pub const fn new(lines: LineRoles, clock_period: Duration, reset_period: Duration) -> Self {
        Self {
            lines,
            clock_period,
            reset_period,
        }
    }

    /// Configuration with [`DEFAULT_CLOCK_PERIOD`] and [`DEFAULT_RESET_PERIOD`].
    pub const fn with_default_timing(lines: LineRoles) -> Self {
        Self::new(lines, DEFAULT_CLOCK_PERIOD, DEFAULT_RESET_PERIOD)
    }

    /// Checks line assignments and periods, returning the periods in counter units.
    pub fn validate(&self) -> Result<Timing, ConfigError> {
        if let Some((first, second)) = self.lines.aliased_pair() {
            return Err(ConfigError::AliasedLines { first, second });
        }

        if self.clock_period < MIN_PERIOD {
            return Err(ConfigError::ClockPeriodTooShort);
        }
        if self.reset_period < MIN_PERIOD {
            return Err(ConfigError::ResetPeriodTooShort);
        }

        Ok(Timing {
            clock_period: period_micros(self.clock_period)?,
            reset_period: period_micros(self.reset_period)?,
        })
    }
}

/// Rejects lengths the state machine cannot run.
pub const fn validate_length(length: RegisterLength) -> Result<RegisterLength, ConfigError> {
    if length == 0 {
        Err(ConfigError::ZeroLength)
    } else {
        Ok(length)
    }
}

fn period_micros(period: Duration) -> Result<Micros, ConfigError> {
    match Micros::try_from(period.as_micros()) {
        Ok(micros) if micros < Micros::MAX => Ok(micros),
        _ => Err(ConfigError::PeriodTooLong(period)),
    }
}
