//! Spans
//!
//! A span is one unit of work in the dashboard tree: it has a title, a
//! progress percentage, a lifecycle (open → finished) and a log container.
//!
//! # Ownership
//!
//! Parents own their children (an append-only list of strong handles); a
//! child only keeps a weak back-reference to its parent, used to forward
//! writes from logical spans and to bump `changed_at` on every ancestor.
//! There is no re-parenting and no removal, so a reader iterating children
//! never has to deal with entries disappearing.
//!
//! # Locking
//!
//! Every span has its own locks; there is no tree-wide lock. A mutation takes
//! the span's state lock for the duration of the change only, then walks up
//! the ancestors taking each one's lock in turn. Lock order inside a span is
//! always `children` before `state`.
//!
//! # Inert spans
//!
//! [`Span::inert`] is a handle to nothing. Every method on it is a no-op, so
//! code can open, write to and end spans without checking whether a
//! dashboard is actually running.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::container::LogContainer;
use crate::depth::Depth;

/// Process-unique span identifier, increasing in creation order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Create an id from a raw value (for tests and foreign trees)
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw numeric value
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out span ids
///
/// A single mutex serializes id assignment and nothing else. Trees share
/// [`IdAllocator::shared`] by default so ids are unique across the process;
/// tests can give a tree its own allocator.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: Mutex<u64>,
}

impl IdAllocator {
    /// Create an allocator whose first id is 1
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide allocator
    #[must_use]
    pub fn shared() -> Arc<IdAllocator> {
        static SHARED: OnceLock<Arc<IdAllocator>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(IdAllocator::new())))
    }

    /// Allocate the next id
    pub fn next_id(&self) -> SpanId {
        let mut last = self.last.lock();
        *last += 1;
        SpanId(*last)
    }
}

/// Options applied when a span opens
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanOptions {
    /// Title to display (defaults to `span #<id>`)
    pub title: Option<String>,
    /// Starting progress fraction, clamped to `[0, 1]`
    pub initial_progress: Option<f64>,
}

impl SpanOptions {
    /// Create empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with a title
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self::new().with_title(title)
    }

    /// Set the title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the starting progress
    #[must_use]
    pub fn with_initial_progress(mut self, progress: f64) -> Self {
        self.initial_progress = Some(progress);
        self
    }
}

/// Convert a fraction to a whole percentage, clamping out-of-range input
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub(crate) fn percent(fraction: f64) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0) as u8
}

/// Mutable part of a span, guarded by its state lock
#[derive(Debug)]
struct SpanState {
    title: String,
    progress: u8,
    finished: bool,
    started_at: Instant,
    ended_at: Option<Instant>,
    changed_at: Instant,
    container: LogContainer,
}

#[derive(Debug)]
struct SpanNode {
    id: SpanId,
    depth: Depth,
    logical: bool,
    parent: Option<Weak<SpanNode>>,
    children: RwLock<Vec<Span>>,
    state: RwLock<SpanState>,
}

impl SpanNode {
    fn parent_node(&self) -> Option<Arc<SpanNode>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Bump `changed_at` on every ancestor, one lock at a time
    fn propagate_change(&self, at: Instant) {
        let mut cursor = self.parent_node();
        while let Some(node) = cursor {
            {
                let mut state = node.state.write();
                if at > state.changed_at {
                    state.changed_at = at;
                }
            }
            cursor = node.parent_node();
        }
    }
}

/// Point-in-time copy of a span, taken under its state lock
#[derive(Clone, Debug)]
pub struct SpanSnapshot {
    /// Span id
    pub id: SpanId,
    /// Tree depth
    pub depth: Depth,
    /// Whether writes are forwarded to the parent
    pub logical: bool,
    /// Display title
    pub title: String,
    /// Progress percentage, 0..=100
    pub progress: u8,
    /// Whether the span has ended
    pub finished: bool,
    /// When the span opened
    pub started_at: Instant,
    /// When the span ended
    pub ended_at: Option<Instant>,
    /// Last mutation of this span or any descendant
    pub changed_at: Instant,
    /// Container content in insertion order
    pub lines: Vec<String>,
    /// Children in creation order
    pub children: Vec<Span>,
}

impl SpanSnapshot {
    /// Time from open to end, or to now while still open
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.ended_at
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started_at)
    }
}

/// Handle to a span in the tree
///
/// Cloning is cheap and yields another handle to the same span.
#[derive(Clone, Default)]
pub struct Span {
    node: Option<Arc<SpanNode>>,
}

impl Span {
    /// A handle that refers to nothing; all operations are no-ops
    #[must_use]
    pub fn inert() -> Self {
        Self::default()
    }

    /// Create a span and append it to `parent`'s children
    ///
    /// Used by [`SpanTree`](crate::SpanTree), which decides container and the
    /// logical flag. A child's id is drawn while the parent's children lock
    /// is held, so every child list stays in ascending id order. Callers
    /// opening roots must hold their root list lock for the same reason.
    pub(crate) fn attach(
        ids: &IdAllocator,
        parent: &Span,
        container: LogContainer,
        logical: bool,
        options: SpanOptions,
    ) -> Span {
        let Some(parent_node) = parent.node.as_ref() else {
            let span = Span {
                node: Some(Self::build(ids.next_id(), None, container, logical, options)),
            };
            span.trace_opened();
            return span;
        };

        let mut siblings = parent_node.children.write();
        let node = Self::build(
            ids.next_id(),
            Some(parent_node),
            container,
            logical,
            options,
        );
        let now = node.state.read().started_at;
        let span = Span {
            node: Some(Arc::clone(&node)),
        };

        if parent_node.state.read().finished {
            // A parent never stays finished over an open child
            span.finish_in_place(now);
        }
        siblings.push(span.clone());
        drop(siblings);

        node.propagate_change(now);
        span.trace_opened();
        span
    }

    fn build(
        id: SpanId,
        parent: Option<&Arc<SpanNode>>,
        container: LogContainer,
        logical: bool,
        options: SpanOptions,
    ) -> Arc<SpanNode> {
        let now = Instant::now();
        let depth = parent.map_or(Depth::ROOT, |p| p.depth.child());

        let state = SpanState {
            title: options.title.unwrap_or_else(|| format!("span {id}")),
            progress: options.initial_progress.map_or(0, percent),
            finished: false,
            started_at: now,
            ended_at: None,
            changed_at: now,
            container,
        };

        Arc::new(SpanNode {
            id,
            depth,
            logical: logical && parent.is_some(),
            parent: parent.map(Arc::downgrade),
            children: RwLock::new(Vec::new()),
            state: RwLock::new(state),
        })
    }

    fn trace_opened(&self) {
        if let Some(node) = self.node.as_ref() {
            tracing::trace!(
                span_id = %node.id,
                depth = %node.depth,
                logical = node.logical,
                "span opened"
            );
        }
    }

    /// Whether this handle refers to nothing
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.node.is_none()
    }

    /// Span id (`None` for an inert span)
    #[must_use]
    pub fn id(&self) -> Option<SpanId> {
        self.node.as_ref().map(|n| n.id)
    }

    /// Tree depth (root for an inert span)
    #[must_use]
    pub fn depth(&self) -> Depth {
        self.node.as_ref().map_or(Depth::ROOT, |n| n.depth)
    }

    /// Whether writes are forwarded to the parent
    #[must_use]
    pub fn is_logical(&self) -> bool {
        self.node.as_ref().is_some_and(|n| n.logical)
    }

    /// The parent span (inert for roots and inert spans)
    #[must_use]
    pub fn parent(&self) -> Span {
        Span {
            node: self.node.as_ref().and_then(|n| n.parent_node()),
        }
    }

    /// Children in creation order
    #[must_use]
    pub fn children(&self) -> Vec<Span> {
        self.node
            .as_ref()
            .map(|n| n.children.read().clone())
            .unwrap_or_default()
    }

    /// Display title
    #[must_use]
    pub fn title(&self) -> String {
        self.node
            .as_ref()
            .map(|n| n.state.read().title.clone())
            .unwrap_or_default()
    }

    /// Progress percentage, 0..=100
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.node.as_ref().map_or(0, |n| n.state.read().progress)
    }

    /// Whether the span has ended (inert spans count as finished)
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.node.as_ref().map_or(true, |n| n.state.read().finished)
    }

    /// When the span ended
    #[must_use]
    pub fn ended_at(&self) -> Option<Instant> {
        self.node.as_ref().and_then(|n| n.state.read().ended_at)
    }

    /// Last mutation of this span or any descendant
    #[must_use]
    pub fn changed_at(&self) -> Option<Instant> {
        self.node.as_ref().map(|n| n.state.read().changed_at)
    }

    /// Lines currently held by this span's own container
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.node
            .as_ref()
            .map(|n| n.state.read().container.content())
            .unwrap_or_default()
    }

    /// Copy the span's state for rendering
    #[must_use]
    pub fn snapshot(&self) -> Option<SpanSnapshot> {
        let node = self.node.as_ref()?;
        let children = node.children.read().clone();
        let state = node.state.read();

        Some(SpanSnapshot {
            id: node.id,
            depth: node.depth,
            logical: node.logical,
            title: state.title.clone(),
            progress: state.progress,
            finished: state.finished,
            started_at: state.started_at,
            ended_at: state.ended_at,
            changed_at: state.changed_at,
            lines: state.container.content(),
            children,
        })
    }

    /// Append a log line
    ///
    /// Logical spans forward the line to their parent (and so on up to the
    /// first physical ancestor). No-op on inert or finished spans.
    pub fn write(&self, line: impl Into<String>) {
        self.write_line(line.into());
    }

    fn write_line(&self, line: String) {
        let Some(node) = self.node.as_ref() else {
            return;
        };

        if node.logical {
            if node.state.read().finished {
                return;
            }
            self.parent().write_line(line);
            return;
        }

        let now = Instant::now();
        {
            let mut state = node.state.write();
            if state.finished {
                return;
            }
            state.container.write(line);
            state.changed_at = now;
        }
        node.propagate_change(now);
    }

    /// Set progress from a fraction in `[0, 1]` (clamped)
    ///
    /// No-op on inert or finished spans.
    pub fn set_progress(&self, fraction: f64) {
        let Some(node) = self.node.as_ref() else {
            return;
        };

        let now = Instant::now();
        {
            let mut state = node.state.write();
            if state.finished {
                return;
            }
            state.progress = percent(fraction);
            state.changed_at = now;
        }
        node.propagate_change(now);
    }

    /// End the span and every still-open descendant
    ///
    /// Children are ended first, so no parent is ever finished while a child
    /// is open. Progress becomes 100, the end time is recorded and the log
    /// container is replaced with a discarding one. Calling `end` again has
    /// no effect.
    pub fn end(&self) {
        let Some(node) = self.node.as_ref() else {
            return;
        };

        if node.state.read().finished {
            return;
        }

        // Holding the children lock keeps new children from attaching until
        // this span is marked finished.
        let children = node.children.read();
        for child in children.iter() {
            child.end();
        }

        let now = Instant::now();
        {
            let mut state = node.state.write();
            if state.finished {
                return;
            }
            state.progress = 100;
            state.finished = true;
            state.ended_at = Some(now);
            state.changed_at = now;
            state.container = LogContainer::discard();
        }
        drop(children);

        node.propagate_change(now);
        tracing::trace!(span_id = %node.id, "span ended");
    }

    /// Mark a span that has not been published yet as finished
    fn finish_in_place(&self, at: Instant) {
        if let Some(node) = self.node.as_ref() {
            let mut state = node.state.write();
            state.progress = 100;
            state.finished = true;
            state.ended_at = Some(at);
            state.container = LogContainer::discard();
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node.as_ref() {
            Some(node) => f
                .debug_struct("Span")
                .field("id", &node.id)
                .field("depth", &node.depth)
                .field("logical", &node.logical)
                .finish_non_exhaustive(),
            None => f.write_str("Span(inert)"),
        }
    }
}

impl PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        match (self.node.as_ref(), other.node.as_ref()) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for Span {}
