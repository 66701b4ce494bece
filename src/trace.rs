//! Trace correlation for recorded events.
//!
//! Watchers ask a [`TraceCorrelation`] for the active trace and span when an
//! operation opens. Absence is normal and simply leaves the event fields
//! empty.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference to a distributed trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceRef(String);

impl TraceRef {
    /// Wraps a trace identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a span within a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanRef(u64);

impl SpanRef {
    /// Wraps a span identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Source of the active trace and span.
pub trait TraceCorrelation: Send + Sync {
    /// The active trace, if any.
    fn active_trace_ref(&self) -> Option<TraceRef>;

    /// The active span, if any.
    fn active_span_ref(&self) -> Option<SpanRef>;
}

/// Correlation that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTracing;

impl TraceCorrelation for NoTracing {
    fn active_trace_ref(&self) -> Option<TraceRef> {
        None
    }

    fn active_span_ref(&self) -> Option<SpanRef> {
        None
    }
}

/// Correlation backed by the current `tracing` span.
///
/// The span reference is the subscriber-assigned id of
/// [`tracing::Span::current`]. `tracing` has no notion of a trace, so the
/// trace reference is always absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentSpan;

impl TraceCorrelation for CurrentSpan {
    fn active_trace_ref(&self) -> Option<TraceRef> {
        None
    }

    fn active_span_ref(&self) -> Option<SpanRef> {
        tracing::Span::current()
            .id()
            .map(|id| SpanRef::new(id.into_u64()))
    }
}
