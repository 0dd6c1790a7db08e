//! Depth Tiers
//!
//! Every span sits at a fixed distance from its root. Layout, container size
//! and whether a span keeps its own log are all decided by that distance:
//!
//! | Depth | Tier      | Shown as                                  |
//! |-------|-----------|-------------------------------------------|
//! | 0     | root      | header, rolling log, operations           |
//! | 1     | operation | `>` status line, rolling log, details     |
//! | 2+    | detail    | one pipe-delimited status line             |

use std::fmt;

/// Distance of a span from its root span (root = 0)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Depth(u32);

impl Depth {
    /// Depth of a span opened without a parent
    pub const ROOT: Depth = Depth(0);

    /// Create a depth from its raw value
    #[must_use]
    pub const fn new(depth: u32) -> Self {
        Self(depth)
    }

    /// Raw numeric value
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Depth of a span opened under a span at this depth
    #[must_use]
    pub const fn child(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Root task tier
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }

    /// Operation tier, directly under a root
    #[must_use]
    pub const fn is_operation(self) -> bool {
        self.0 == 1
    }

    /// Detail tier (operation children and everything deeper)
    #[must_use]
    pub const fn is_detail(self) -> bool {
        self.0 >= 2
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
