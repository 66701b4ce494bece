//! Watchers: adapters between one lifecycle payload and the detection engine.
//!
//! A watcher is invoked by the [`Gateway`](crate::Gateway) each time its
//! watch point fires. The engine-backed [`EngineWatcher`] opens an
//! [`Operation`], subscribes a detection call, publishes the normalized
//! payload and classifies the result. Whatever happens inside the engine,
//! the gateway always gets a well-formed [`WatcherOutcome`] back.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::attributes::Attributes;
use crate::context::SecurityContext;
use crate::engine::{Detection, MatchResult};
use crate::error::{EngineEvaluationError, ProtocolError};
use crate::event::{Event, Subject};
use crate::reactive::{Operation, Topic};
use crate::trace::{NoTracing, TraceCorrelation};
use crate::verdict::Verdict;
use crate::web::ExtractAttributes;

/// What a watcher reports back to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherOutcome {
    /// Verdict for this watcher
    pub verdict: Verdict,
    /// Engine payload, when the engine produced one
    pub result: Option<MatchResult>,
    /// Whether the wrapped work must be skipped
    pub block: bool,
    /// Event appended to the security context, if any
    pub event: Option<Event>,
}

impl WatcherOutcome {
    /// Allow, with nothing recorded. Also the fail-open outcome.
    pub fn pass() -> Self {
        Self {
            verdict: Verdict::Ok,
            result: None,
            block: false,
            event: None,
        }
    }
}

/// A participant in a watch point's chain.
///
/// Implementations should not panic or propagate engine failures. A watcher
/// that panics anyway is caught at the gateway, logged, and treated as a
/// pass; the rest of the chain still runs.
pub trait Watcher: Send + Sync {
    /// Name, unique within one watch point.
    fn name(&self) -> &str;

    /// Evaluates `payload` fired at `point` for the request owning `ctx`.
    fn evaluate(
        &self,
        point: &str,
        ctx: &SecurityContext,
        payload: &dyn ExtractAttributes,
    ) -> WatcherOutcome;
}

/// The lifecycle stage an [`EngineWatcher`] observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherKind {
    /// Request line, headers, cookies and client address
    Request,
    /// Parsed request body
    RequestBody,
    /// Response status and headers
    Response,
}

impl WatcherKind {
    /// Topics this kind subscribes to.
    pub fn topics(self) -> &'static [Topic] {
        match self {
            WatcherKind::Request => &Topic::REQUEST,
            WatcherKind::RequestBody => &Topic::REQUEST_BODY,
            WatcherKind::Response => &Topic::RESPONSE,
        }
    }

    /// Default watcher name.
    pub fn as_str(self) -> &'static str {
        match self {
            WatcherKind::Request => "waf.request",
            WatcherKind::RequestBody => "waf.request_body",
            WatcherKind::Response => "waf.response",
        }
    }
}

impl fmt::Display for WatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watcher that runs the request's engine session over one lifecycle stage.
///
/// On a `monitor` or `block` verdict it appends an [`Event`] to the security
/// context, carrying the trace and span that were active when the operation
/// opened. Engine errors and engine panics are logged and turned into
/// [`WatcherOutcome::pass`]: instrumentation failures never block traffic.
///
/// # Examples
///
/// ```
/// use appsec_gateway::web::HttpRequest;
/// use appsec_gateway::{
///     Attributes, Detection, EngineEvaluationError, EngineWatcher, SecurityContext, Verdict,
///     Watcher,
/// };
///
/// let ctx = SecurityContext::new(
///     "req-1",
///     |attrs: &Attributes| -> Result<Detection, EngineEvaluationError> {
///         Ok(match attrs.path() {
///             Some("/admin") => Detection::monitor(serde_json::json!({"rule": "admin"})),
///             _ => Detection::pass(),
///         })
///     },
/// );
///
/// let request = HttpRequest::new("req-1", "GET", "/admin");
/// let outcome = EngineWatcher::request().evaluate("http.request", &ctx, &request);
///
/// assert_eq!(outcome.verdict, Verdict::Monitor);
/// assert!(!outcome.block);
/// assert_eq!(ctx.into_events().len(), 1);
/// ```
#[derive(Clone)]
pub struct EngineWatcher {
    kind: WatcherKind,
    name: String,
    correlation: Arc<dyn TraceCorrelation>,
}

impl EngineWatcher {
    /// Watcher for request-started payloads.
    pub fn request() -> Self {
        Self::new(WatcherKind::Request)
    }

    /// Watcher for parsed-body payloads.
    pub fn request_body() -> Self {
        Self::new(WatcherKind::RequestBody)
    }

    /// Watcher for response payloads.
    pub fn response() -> Self {
        Self::new(WatcherKind::Response)
    }

    /// Watcher for `kind`, named after it, without trace correlation.
    pub fn new(kind: WatcherKind) -> Self {
        Self {
            kind,
            name: kind.as_str().to_owned(),
            correlation: Arc::new(NoTracing),
        }
    }

    /// Overrides the watcher name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets where trace and span references come from.
    pub fn with_tracing(mut self, correlation: Arc<dyn TraceCorrelation>) -> Self {
        self.correlation = correlation;
        self
    }

    /// Lifecycle stage observed.
    pub fn kind(&self) -> WatcherKind {
        self.kind
    }

    fn fail_open(&self, point: &str, ctx: &SecurityContext, err: &EngineEvaluationError) {
        tracing::warn!(
            request_id = %ctx.request_id(),
            watch_point = point,
            watcher = %self.name,
            error = %err,
            "detection failed, allowing request"
        );
    }

    fn protocol_violation(
        &self,
        point: &str,
        ctx: &SecurityContext,
        err: ProtocolError,
    ) -> WatcherOutcome {
        tracing::error!(
            request_id = %ctx.request_id(),
            watch_point = point,
            watcher = %self.name,
            error = %err,
            "dispatch protocol violated"
        );
        if cfg!(debug_assertions) {
            panic!("dispatch protocol violated: {err}");
        }
        WatcherOutcome::pass()
    }
}

impl Watcher for EngineWatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(
        &self,
        point: &str,
        ctx: &SecurityContext,
        payload: &dyn ExtractAttributes,
    ) -> WatcherOutcome {
        let trace = self.correlation.active_trace_ref();
        let span = self.correlation.active_span_ref();
        let subject = payload.subject();
        let attributes = payload.attributes();

        let mut result: Option<MatchResult> = None;
        let mut event: Option<Event> = None;
        let mut failure: Option<EngineEvaluationError> = None;

        let published = {
            let mut op = Operation::new(point);
            let subscribed = op.subscribe(self.kind.topics(), |attrs| {
                match run_guarded(ctx, attrs) {
                    Ok(Detection {
                        verdict,
                        result: matched,
                    }) => {
                        if verdict.is_recordable() {
                            let draft = Event::new(verdict, matched.clone(), subject.clone(), point)
                                .with_trace(trace.clone())
                                .with_span(span);
                            event = Some(ctx.append_event(draft));
                        }
                        result = Some(matched);
                        verdict
                    }
                    Err(err) => {
                        failure = Some(err);
                        Verdict::Ok
                    }
                }
            });
            subscribed.and_then(|_| op.publish(&attributes))
        };

        let verdict = match published {
            Ok(verdict) => verdict,
            Err(err) => return self.protocol_violation(point, ctx, err),
        };

        if let Some(err) = failure {
            self.fail_open(point, ctx, &err);
            return WatcherOutcome::pass();
        }

        if let Some(recorded) = &event {
            log_recorded(ctx, &self.name, recorded);
        } else {
            tracing::debug!(
                request_id = %ctx.request_id(),
                watch_point = point,
                watcher = %self.name,
                verdict = %verdict,
                "watcher evaluated"
            );
        }

        WatcherOutcome {
            verdict,
            result,
            block: verdict.is_block(),
            event,
        }
    }
}

impl fmt::Debug for EngineWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineWatcher")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn run_guarded(
    ctx: &SecurityContext,
    attributes: &Attributes,
) -> Result<Detection, EngineEvaluationError> {
    panic::catch_unwind(AssertUnwindSafe(|| ctx.evaluate(attributes)))
        .unwrap_or_else(|payload| Err(EngineEvaluationError::Panicked(panic_message(&*payload))))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

fn log_recorded(ctx: &SecurityContext, watcher: &str, event: &Event) {
    tracing::info!(
        target: "appsec_event",
        request_id = %ctx.request_id(),
        watch_point = %event.watch_point(),
        watcher,
        verdict = %event.verdict(),
        sequence = event.sequence(),
        subject = %event.subject().kind(),
        "security event recorded"
    );
}
