//! Span Tree
//!
//! Entry point for opening spans. The tree decides, for every new span, its
//! id, whether it is logical and which log container it gets, then hooks it
//! under its parent (or into the root list).

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::container::{ContainerConfig, LogContainer};
use crate::depth::Depth;
use crate::span::{IdAllocator, Span, SpanOptions};

/// Owner of the root span list
#[derive(Debug)]
pub struct SpanTree {
    ids: Arc<IdAllocator>,
    containers: ContainerConfig,
    roots: RwLock<Vec<Span>>,
}

impl SpanTree {
    /// Create a tree drawing ids from the process-wide allocator
    #[must_use]
    pub fn new(containers: ContainerConfig) -> Self {
        Self::with_allocator(containers, IdAllocator::shared())
    }

    /// Create a tree with its own id allocator
    #[must_use]
    pub fn with_allocator(containers: ContainerConfig, ids: Arc<IdAllocator>) -> Self {
        Self {
            ids,
            containers,
            roots: RwLock::new(Vec::new()),
        }
    }

    /// Container settings used for new spans
    #[must_use]
    pub fn containers(&self) -> &ContainerConfig {
        &self.containers
    }

    /// Open a span under `parent`; an inert parent opens a new root
    ///
    /// Sibling lists, the root list included, always end up in id order.
    pub fn open(&self, parent: &Span, options: SpanOptions) -> Span {
        let depth = if parent.is_inert() {
            Depth::ROOT
        } else {
            parent.depth().child()
        };

        let logical = self.containers.is_logical(depth);
        let container = if logical {
            LogContainer::discard()
        } else {
            LogContainer::for_depth(depth, &self.containers)
        };

        let span = if parent.is_inert() {
            let mut roots = self.roots.write();
            let span = Span::attach(&self.ids, parent, container, logical, options);
            roots.push(span.clone());
            span
        } else {
            Span::attach(&self.ids, parent, container, logical, options)
        };

        if let Some(id) = span.id() {
            tracing::debug!(span_id = %id, depth = %depth, "span registered");
        }
        span
    }

    /// Root spans in creation order
    #[must_use]
    pub fn roots(&self) -> Vec<Span> {
        self.roots.read().clone()
    }

    /// Most recent `changed_at` across all roots
    ///
    /// Every mutation bumps its ancestors, so the roots alone are enough.
    #[must_use]
    pub fn latest_change(&self) -> Option<Instant> {
        self.roots
            .read()
            .iter()
            .filter_map(Span::changed_at)
            .max()
    }
}

impl Default for SpanTree {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}
