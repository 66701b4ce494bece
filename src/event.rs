//! Security event schema.
//!
//! Events reference the request or response they were raised for through a
//! [`Subject`], which holds identifying metadata only. Raw header values and
//! bodies stay with the engine's match result and never leak into log lines.

use std::fmt;

use serde::Serialize;

use crate::engine::MatchResult;
use crate::trace::{SpanRef, TraceRef};
use crate::verdict::Verdict;

/// Whether an event concerns the inbound request or the outbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    /// Inbound request (headers or body)
    Request,
    /// Outbound response
    Response,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKind::Request => write!(f, "request"),
            SubjectKind::Response => write!(f, "response"),
        }
    }
}

/// Identifying reference to the payload an event was raised for.
///
/// # Example
///
/// ```
/// use appsec_gateway::{Subject, SubjectKind};
///
/// let subject = Subject::request("req-1")
///     .with_method("POST")
///     .with_path("/login");
///
/// assert_eq!(subject.kind(), SubjectKind::Request);
/// assert_eq!(subject.path(), Some("/login"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    kind: SubjectKind,
    request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
}

impl Subject {
    /// References an inbound request.
    pub fn request(request_id: impl Into<String>) -> Self {
        Self::new(SubjectKind::Request, request_id)
    }

    /// References the response to a request.
    pub fn response(request_id: impl Into<String>) -> Self {
        Self::new(SubjectKind::Response, request_id)
    }

    fn new(kind: SubjectKind, request_id: impl Into<String>) -> Self {
        Self {
            kind,
            request_id: request_id.into(),
            method: None,
            path: None,
            status: None,
        }
    }

    /// Sets the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the request path (no query string).
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the response status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Request or response.
    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    /// Identifier of the request (for responses, the request answered).
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// HTTP method, if known.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Request path, if known.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Response status, if known.
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

/// One recorded detection, immutable once built.
///
/// The sequence number is assigned by
/// [`SecurityContext::append_event`](crate::SecurityContext::append_event)
/// and reflects append order within one request.
///
/// # Example
///
/// ```
/// use appsec_gateway::{Event, MatchResult, Subject, Verdict};
///
/// let event = Event::new(
///     Verdict::Monitor,
///     MatchResult::new(serde_json::json!({"rule": "admin-path"})),
///     Subject::request("req-42").with_path("/admin"),
///     "http.request",
/// );
///
/// assert_eq!(event.verdict(), Verdict::Monitor);
/// assert_eq!(event.watch_point(), "http.request");
/// assert!(event.trace_ref().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    verdict: Verdict,
    result: MatchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<TraceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    span: Option<SpanRef>,
    subject: Subject,
    watch_point: String,
    sequence: u64,
}

impl Event {
    /// Builds an event with no trace correlation and sequence 0.
    pub fn new(
        verdict: Verdict,
        result: MatchResult,
        subject: Subject,
        watch_point: impl Into<String>,
    ) -> Self {
        Self {
            verdict,
            result,
            trace: None,
            span: None,
            subject,
            watch_point: watch_point.into(),
            sequence: 0,
        }
    }

    /// Attaches the active trace, if any.
    pub fn with_trace(mut self, trace: Option<TraceRef>) -> Self {
        self.trace = trace;
        self
    }

    /// Attaches the active span, if any.
    pub fn with_span(mut self, span: Option<SpanRef>) -> Self {
        self.span = span;
        self
    }

    pub(crate) fn sequenced(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Verdict that caused the event.
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Engine match payload.
    pub fn result(&self) -> &MatchResult {
        &self.result
    }

    /// Trace active when the operation opened.
    pub fn trace_ref(&self) -> Option<&TraceRef> {
        self.trace.as_ref()
    }

    /// Span active when the operation opened.
    pub fn span_ref(&self) -> Option<SpanRef> {
        self.span
    }

    /// Request or response this event concerns.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Watch point that raised the event.
    pub fn watch_point(&self) -> &str {
        &self.watch_point
    }

    /// Position in the request's event log.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SecurityEvent[#{} {} at {}, {}={}",
            self.sequence, self.verdict, self.watch_point, self.subject.kind, self.subject.request_id
        )?;

        if let Some(method) = &self.subject.method {
            write!(f, ", method={}", method)?;
        }
        if let Some(path) = &self.subject.path {
            write!(f, ", path={}", path)?;
        }
        if let Some(status) = self.subject.status {
            write!(f, ", status={}", status)?;
        }
        if let Some(span) = self.span {
            write!(f, ", span={}", span)?;
        }

        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Event {
        Event::new(
            Verdict::Block,
            MatchResult::new(json!({"rule": "sqli", "value": "' OR '1'='1"})),
            Subject::request("req-7").with_method("GET").with_path("/search"),
            "http.request",
        )
    }

    #[test]
    fn new_event_has_no_correlation() {
        let event = sample();
        assert!(event.trace_ref().is_none());
        assert!(event.span_ref().is_none());
        assert_eq!(event.sequence(), 0);
    }

    #[test]
    fn correlation_is_attached() {
        let event = sample()
            .with_trace(Some(TraceRef::new("t-1")))
            .with_span(Some(SpanRef::new(9)));
        assert_eq!(event.trace_ref().map(TraceRef::as_str), Some("t-1"));
        assert_eq!(event.span_ref(), Some(SpanRef::new(9)));
    }

    #[test]
    fn display_omits_match_payload() {
        let display = sample().sequenced(3).to_string();

        assert!(display.contains("#3"));
        assert!(display.contains("block"));
        assert!(display.contains("request=req-7"));
        assert!(display.contains("path=/search"));
        assert!(!display.contains("OR '1'='1"));
    }

    #[test]
    fn response_subject_display() {
        let event = Event::new(
            Verdict::Monitor,
            MatchResult::empty(),
            Subject::response("req-9").with_status(500),
            "http.response",
        );
        let display = event.to_string();
        assert!(display.contains("response=req-9"));
        assert!(display.contains("status=500"));
    }

    #[test]
    fn serializes_for_export() {
        let value = serde_json::to_value(sample().sequenced(1)).unwrap();
        assert_eq!(value["verdict"], "block");
        assert_eq!(value["subject"]["kind"], "request");
        assert_eq!(value["watch_point"], "http.request");
        assert_eq!(value["sequence"], 1);
        assert_eq!(value["result"]["rule"], "sqli");
        assert!(value.get("trace").is_none());
    }
}
