//! Log Containers
//!
//! Each span owns one container holding its most recent log lines. The kind
//! of container is chosen once, from the span's depth, when the span opens:
//!
//! - root and operation spans get a ring buffer (a short rolling log)
//! - detail spans get a single-line container or discard everything
//! - logical spans and finished spans hold a discarding container
//!
//! No container grows past its configured capacity, so memory stays bounded
//! no matter how many spans a program opens.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::depth::Depth;

/// Default ring size for root spans
pub const DEFAULT_ROOT_MAX_LINES: usize = 4;

/// Default ring size for operation spans
pub const DEFAULT_OPERATION_MAX_LINES: usize = 4;

/// Default depth at which spans become logical
pub const DEFAULT_LOGICAL_FROM_DEPTH: u32 = 3;

/// What detail-tier spans keep of their log
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailMode {
    /// Keep the last written line
    #[default]
    SingleLine,
    /// Keep nothing
    Discard,
}

/// Container sizing per depth tier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Ring size for root spans (depth 0)
    pub root_max_lines: usize,
    /// Ring size for operation spans (depth 1)
    pub operation_max_lines: usize,
    /// Container kind for detail spans (depth 2+)
    pub detail_mode: DetailMode,
    /// Spans at this depth or deeper forward their writes to their parent
    ///
    /// `None` keeps every span physical. The root is always physical, so
    /// values below 1 behave like 1.
    pub logical_from_depth: Option<u32>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            root_max_lines: DEFAULT_ROOT_MAX_LINES,
            operation_max_lines: DEFAULT_OPERATION_MAX_LINES,
            detail_mode: DetailMode::SingleLine,
            logical_from_depth: Some(DEFAULT_LOGICAL_FROM_DEPTH),
        }
    }
}

impl ContainerConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root ring size
    #[must_use]
    pub fn with_root_max_lines(mut self, lines: usize) -> Self {
        self.root_max_lines = lines;
        self
    }

    /// Set the operation ring size
    #[must_use]
    pub fn with_operation_max_lines(mut self, lines: usize) -> Self {
        self.operation_max_lines = lines;
        self
    }

    /// Set the detail container kind
    #[must_use]
    pub fn with_detail_mode(mut self, mode: DetailMode) -> Self {
        self.detail_mode = mode;
        self
    }

    /// Set the depth from which spans become logical (`None` disables)
    #[must_use]
    pub fn with_logical_from_depth(mut self, depth: Option<u32>) -> Self {
        self.logical_from_depth = depth;
        self
    }

    /// Whether a span opened at `depth` forwards its writes
    #[must_use]
    pub fn is_logical(&self, depth: Depth) -> bool {
        match self.logical_from_depth {
            Some(from) => !depth.is_root() && depth.get() >= from.max(1),
            None => false,
        }
    }
}

/// Bounded, ordered storage for a span's recent log lines
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LogContainer {
    /// Drops every line
    #[default]
    Discard,
    /// Keeps only the last line
    SingleLine(Option<String>),
    /// Keeps the last `max_lines` lines, evicting the oldest first
    Ring {
        /// Capacity
        max_lines: usize,
        /// Lines in insertion order
        lines: VecDeque<String>,
    },
}

impl LogContainer {
    /// A container that stores nothing
    #[must_use]
    pub const fn discard() -> Self {
        Self::Discard
    }

    /// A container holding the last written line
    #[must_use]
    pub const fn single_line() -> Self {
        Self::SingleLine(None)
    }

    /// A ring buffer holding at most `max_lines` lines
    #[must_use]
    pub fn ring(max_lines: usize) -> Self {
        Self::Ring {
            max_lines,
            lines: VecDeque::with_capacity(max_lines),
        }
    }

    /// Pick the container for a physical span at `depth`
    #[must_use]
    pub fn for_depth(depth: Depth, config: &ContainerConfig) -> Self {
        if depth.is_root() {
            return Self::ring(config.root_max_lines);
        }

        if depth.is_operation() {
            return Self::ring(config.operation_max_lines);
        }

        match config.detail_mode {
            DetailMode::SingleLine => Self::single_line(),
            DetailMode::Discard => Self::discard(),
        }
    }

    /// Append a line, evicting the oldest one when full
    pub fn write(&mut self, line: impl Into<String>) {
        match self {
            Self::Discard => {}
            Self::SingleLine(last) => *last = Some(line.into()),
            Self::Ring { max_lines, lines } => {
                if *max_lines == 0 {
                    return;
                }

                while lines.len() >= *max_lines {
                    lines.pop_front();
                }
                lines.push_back(line.into());
            }
        }
    }

    /// Current lines in insertion order
    #[must_use]
    pub fn content(&self) -> Vec<String> {
        match self {
            Self::Discard => Vec::new(),
            Self::SingleLine(last) => last.iter().cloned().collect(),
            Self::Ring { lines, .. } => lines.iter().cloned().collect(),
        }
    }

    /// Number of stored lines
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Discard => 0,
            Self::SingleLine(last) => usize::from(last.is_some()),
            Self::Ring { lines, .. } => lines.len(),
        }
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all stored lines, keeping the container kind
    pub fn clear(&mut self) {
        match self {
            Self::Discard => {}
            Self::SingleLine(last) => *last = None,
            Self::Ring { lines, .. } => lines.clear(),
        }
    }
}
