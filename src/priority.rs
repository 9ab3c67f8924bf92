//! Task priority classes.

use core::fmt;

/// Coarse selection band attached to a task.
///
/// Priority affects which task a worker picks next, never whether a running
/// task yields: a higher-priority task is chosen before a lower-priority one
/// when both are available in the same queue or visited during a steal
/// sweep, and that is the entire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Priority {
    /// Background work, picked last.
    Low = 0,
    /// The ordinary class.
    #[default]
    Normal = 1,
    /// Latency-sensitive work.
    High = 2,
    /// Picked before everything else.
    Critical = 3,
}

impl Priority {
    /// Number of priority classes.
    pub const LEVELS: usize = 4;

    /// All classes, lowest first.
    pub const ALL: [Self; Self::LEVELS] = [Self::Low, Self::Normal, Self::High, Self::Critical];

    /// The class's queue index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Looks a class up by queue index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Low),
            1 => Some(Self::Normal),
            2 => Some(Self::High),
            3 => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}
