//! Capability interface between the driver and the platform.
//!
//! The driver never touches hardware directly. Firmware and the emulator
//! implement [`LinePort`] and [`MicrosClock`] for their own pin and timer
//! types, and hand them to [`ShiftIn`](crate::driver::ShiftIn) at
//! initialization.

use core::fmt;

/// Timestamp or duration in microseconds on a free-running, wrapping counter.
pub type Micros = u32;

/// Logic level observed on or driven onto a line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Returns `true` for [`Level::High`].
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    /// Converts a boolean into a level (`true` == high).
    #[must_use]
    pub const fn from_bool(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }

    /// Single-character rendering used by transcripts (`1`/`0`).
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Level::Low => '0',
            Level::High => '1',
        }
    }
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        Level::from_bool(value)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Low => "low",
            Level::High => "high",
        })
    }
}

/// Direction a line is configured for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Input,
    Output,
}

/// Platform-specific line number (GPIO index, pin id, ...).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LineId(pub u8);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Logical role a line plays in the shift-in protocol.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineRole {
    Data,
    Clock,
    Load,
    Reset,
}

impl LineRole {
    /// Deterministic index for lookups into [`ALL_ROLES`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            LineRole::Data => 0,
            LineRole::Clock => 1,
            LineRole::Load => 2,
            LineRole::Reset => 3,
        }
    }

    /// Attempts to construct a [`LineRole`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(LineRole::Data),
            1 => Some(LineRole::Clock),
            2 => Some(LineRole::Load),
            3 => Some(LineRole::Reset),
            _ => None,
        }
    }

    /// Short label used in logs and status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            LineRole::Data => "data",
            LineRole::Clock => "clock",
            LineRole::Load => "load",
            LineRole::Reset => "reset",
        }
    }

    /// Direction the driver programs for this role.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            LineRole::Data => Direction::Input,
            LineRole::Clock | LineRole::Load | LineRole::Reset => Direction::Output,
        }
    }
}

impl fmt::Display for LineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every role, in index order.
pub const ALL_ROLES: [LineRole; 4] = [
    LineRole::Data,
    LineRole::Clock,
    LineRole::Load,
    LineRole::Reset,
];

/// Assignment of platform lines to protocol roles.
///
/// The reset line is optional; chains without a reset input skip the reset
/// pulse but keep its timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LineRoles {
    pub data: LineId,
    pub clock: LineId,
    pub load: LineId,
    pub reset: Option<LineId>,
}

impl LineRoles {
    pub const fn new(data: LineId, clock: LineId, load: LineId, reset: Option<LineId>) -> Self {
        Self {
            data,
            clock,
            load,
            reset,
        }
    }

    /// Returns the line bound to `role`, if any.
    #[must_use]
    pub const fn line(&self, role: LineRole) -> Option<LineId> {
        match role {
            LineRole::Data => Some(self.data),
            LineRole::Clock => Some(self.clock),
            LineRole::Load => Some(self.load),
            LineRole::Reset => self.reset,
        }
    }

    /// Returns the first pair of roles sharing a line, if any.
    #[must_use]
    pub fn aliased_pair(&self) -> Option<(LineRole, LineRole)> {
        for (index, first) in ALL_ROLES.iter().enumerate() {
            let Some(line) = self.line(*first) else {
                continue;
            };
            for second in &ALL_ROLES[index + 1..] {
                if self.line(*second) == Some(line) {
                    return Some((*first, *second));
                }
            }
        }
        None
    }
}

/// Line I/O primitives the driver consumes.
pub trait LinePort {
    /// Configures `line` as an input or output.
    fn set_direction(&mut self, line: LineId, direction: Direction);

    /// Drives an output line.
    fn write(&mut self, line: LineId, level: Level);

    /// Samples an input line.
    fn read(&mut self, line: LineId) -> Level;
}

/// Monotonic microsecond counter that wraps on overflow.
pub trait MicrosClock {
    /// Returns the current counter value.
    fn now_micros(&mut self) -> Micros;
}

/// Elapsed microseconds between two counter readings, tolerant of wraparound.
#[must_use]
pub const fn elapsed_since(earlier: Micros, now: Micros) -> Micros {
    now.wrapping_sub(earlier)
}
