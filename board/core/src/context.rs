//! Span Context
//!
//! The currently open span, carried explicitly from call to call. Opening a
//! span under a context yields a child context pointing at the new span, so
//! nested calls build the tree without ever naming their parent.

use crate::span::Span;

/// Request-scoped carrier for the currently open span
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpanContext {
    span: Option<Span>,
}

impl SpanContext {
    /// A context with no span attached
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that carries `span`
    #[must_use]
    pub fn with_span(&self, span: Span) -> Self {
        Self { span: Some(span) }
    }

    /// The attached span, if one was ever attached
    #[must_use]
    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    /// The attached span, or an inert one
    #[must_use]
    pub fn span_or_inert(&self) -> Span {
        self.span.clone().unwrap_or_default()
    }
}
