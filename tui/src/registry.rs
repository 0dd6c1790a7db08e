//! Terminal Registry
//!
//! Lets unrelated call sites reach the same dashboard without threading a
//! handle through every function. A registry accepts one terminal; later
//! installs are ignored. Every operation is a no-op until a terminal is
//! installed.
//!
//! The process-wide registry is [`global()`]; tests build their own with
//! [`TerminalRegistry::new`].

use std::sync::{Arc, OnceLock};

use spanboard_core::{Span, SpanContext, SpanOptions};

use crate::capture::CaptureError;
use crate::terminal::Terminal;

/// Install-once holder for a [`Terminal`]
#[derive(Debug, Default)]
pub struct TerminalRegistry {
    terminal: OnceLock<Arc<Terminal>>,
}

impl TerminalRegistry {
    /// An empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self {
            terminal: OnceLock::new(),
        }
    }

    /// Install `terminal`; returns `false` if one was already installed
    pub fn install(&self, terminal: Terminal) -> bool {
        let installed = self.terminal.set(Arc::new(terminal)).is_ok();
        if !installed {
            tracing::debug!("terminal already installed; ignoring");
        }
        installed
    }

    /// The installed terminal
    #[must_use]
    pub fn terminal(&self) -> Option<&Arc<Terminal>> {
        self.terminal.get()
    }

    /// Open a span on the installed terminal
    ///
    /// Without a terminal this returns the context unchanged and an inert
    /// span.
    pub fn start_span(
        &self,
        ctx: &SpanContext,
        title: impl Into<String>,
        options: SpanOptions,
    ) -> (SpanContext, Span) {
        match self.terminal.get() {
            Some(terminal) => terminal.start_span(ctx, title, options),
            None => (ctx.clone(), Span::inert()),
        }
    }

    /// Activate the installed terminal
    ///
    /// # Errors
    ///
    /// Returns the terminal's capture error.
    pub fn capture_output(&self) -> Result<(), CaptureError> {
        match self.terminal.get() {
            Some(terminal) => terminal.capture(),
            None => Ok(()),
        }
    }

    /// Deactivate the installed terminal, blocking until teardown is done
    pub fn release_output(&self) {
        if let Some(terminal) = self.terminal.get() {
            terminal.release();
        }
    }
}

static GLOBAL: TerminalRegistry = TerminalRegistry::new();

/// The process-wide registry
#[must_use]
pub fn global() -> &'static TerminalRegistry {
    &GLOBAL
}

/// Install the process-wide terminal (first call wins)
pub fn set_global_terminal(terminal: Terminal) -> bool {
    GLOBAL.install(terminal)
}

/// Open a span on the process-wide terminal
pub fn start_span(
    ctx: &SpanContext,
    title: impl Into<String>,
    options: SpanOptions,
) -> (SpanContext, Span) {
    GLOBAL.start_span(ctx, title, options)
}

/// Activate the process-wide terminal
///
/// # Errors
///
/// Returns the terminal's capture error.
pub fn capture_output() -> Result<(), CaptureError> {
    GLOBAL.capture_output()
}

/// Deactivate the process-wide terminal
pub fn release_output() {
    GLOBAL.release_output();
}
