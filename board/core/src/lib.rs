//! Spanboard Core - Headless Span Tree for Live Progress Dashboards
//!
//! This crate holds everything about a progress dashboard that does not touch
//! a terminal: the span tree callers mutate from any thread, the bounded log
//! containers each span owns, the relevance selector that decides which spans
//! get screen space, and the renderer that turns a (sub)tree into text.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Application code                          │
//! │   worker A        worker B        worker C   (any thread)     │
//! │      │               │               │                        │
//! │      └─── write / set_progress / end ┘                        │
//! └──────────────────────────┬───────────────────────────────────┘
//!                            │ per-span locks, changed_at bumps
//! ┌──────────────────────────▼───────────────────────────────────┐
//! │                        SPANBOARD CORE                         │
//! │  ┌──────────┐  ┌────────────┐  ┌───────────┐  ┌────────────┐ │
//! │  │ SpanTree │  │LogContainer│  │ Relevance │  │  Renderer  │ │
//! │  │  + ids   │  │ (by depth) │  │ selector  │  │ (pure fn)  │ │
//! │  └──────────┘  └────────────┘  └───────────┘  └────────────┘ │
//! └──────────────────────────┬───────────────────────────────────┘
//!                            │ String frames
//!                     terminal surface (spanboard-tui)
//! ```
//!
//! # Key Types
//!
//! - [`Span`]: handle to one node of the tree; every method is a no-op on an
//!   inert handle, so callers never branch on whether a dashboard is running
//! - [`SpanTree`]: allocates ids, builds depth-appropriate containers, keeps roots
//! - [`SpanContext`]: the currently open span, carried explicitly between calls
//! - [`LogContainer`]: discard / single-line / ring-buffer line storage
//! - [`render_span`]: span + [`RenderOptions`] + [`Palette`] → text block
//! - [`BoardConfig`]: containers, render and scheduler settings (TOML + env)
//!
//! # No Terminal Dependencies
//!
//! This crate has **zero** dependencies on crossterm, libc or any terminal
//! crate. Screen output and stdout capture live in `spanboard-tui`.

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod container;
pub mod context;
pub mod depth;
pub mod relevance;
pub mod render;
pub mod span;
pub mod tree;

pub use config::{
    default_config_path, load_config, load_config_from_path, BoardConfig, BoardToml, ConfigError,
    ConfigSource, SchedulerConfig,
};
pub use container::{ContainerConfig, DetailMode, LogContainer};
pub use context::SpanContext;
pub use depth::Depth;
pub use relevance::{most_relevant, Ranked};
pub use render::{
    format_duration, render_log_block, render_roots, render_span, truncate_center, Palette,
    PlainPalette, RenderOptions,
};
pub use span::{IdAllocator, Span, SpanId, SpanOptions, SpanSnapshot};
pub use tree::SpanTree;
