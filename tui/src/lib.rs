//! Spanboard TUI - Live terminal surface for span trees
//!
//! Draws a [`spanboard_core::SpanTree`] to the terminal while the process's
//! own stdout is captured and shown in a small block above the spans. When
//! the dashboard is released, everything captured is replayed to the real
//! stdout in its original order.
//!
//! # Architecture
//!
//! - **Terminal**: render scheduler; owns the tree, the capture session and
//!   the redraw loop (force tick + debounced change signal + cancellation)
//! - **Capture**: OS pipe redirection of fd 1 behind the `OutputRedirect` seam
//! - **Screen**: clear / move cursor / write / flush over crossterm
//! - **Palette**: ANSI colours for rendered lines
//! - **Registry**: install-once process-wide terminal and free functions
//!
//! # Example
//!
//! ```no_run
//! use spanboard_core::{BoardConfig, SpanContext, SpanOptions};
//! use spanboard_tui::{capture_output, release_output, set_global_terminal, start_span, Terminal};
//!
//! # fn main() -> anyhow::Result<()> {
//! set_global_terminal(Terminal::new(BoardConfig::default())?);
//! capture_output()?;
//!
//! let (ctx, build) = start_span(&SpanContext::background(), "build", SpanOptions::new());
//! let (_, step) = start_span(&ctx, "compile", SpanOptions::new());
//! step.write("rustc main.rs");
//! step.set_progress(0.5);
//! build.end();
//!
//! release_output();
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod palette;
pub mod registry;
pub mod screen;
pub mod terminal;

pub use capture::{CaptureError, CaptureEvent, CaptureSession, OutputRedirect};
#[cfg(unix)]
pub use capture::FdRedirect;
pub use palette::AnsiPalette;
pub use registry::{
    capture_output, global, release_output, set_global_terminal, start_span, TerminalRegistry,
};
#[cfg(unix)]
pub use screen::TermScreen;
pub use screen::{clip_to_height, MemoryScreen, Screen};
pub use terminal::{RedirectFactory, Terminal};
