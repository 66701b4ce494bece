use std::cell::{RefCell, RefMut};
use std::fmt;

use crate::attributes::Attributes;
use crate::engine::{Detection, DetectionEngine, EngineSession};
use crate::error::EngineEvaluationError;
use crate::event::Event;

/// Per-request security state: an engine session and an append-only event log.
///
/// One request owns one context. It is created when the request enters the
/// first watch point and passed by shared reference to every later push for
/// the same request, so events from different watch points end up in one
/// chronological log.
///
/// The context is `Send` but not `Sync`: a request may hop threads between
/// watch points, but it is never evaluated from two threads at once. That
/// single-owner discipline is what lets the log grow through `&self` without
/// locks.
///
/// # Export
///
/// An exporter takes the whole log with [`into_events`](Self::into_events)
/// when the request ends. There is no partial flush. Dropping a context that
/// still holds events logs a warning.
///
/// # Examples
///
/// ```
/// use appsec_gateway::{
///     Attributes, Detection, EngineEvaluationError, Event, MatchResult, SecurityContext, Subject,
///     Verdict,
/// };
///
/// let ctx = SecurityContext::new(
///     "req-123",
///     |_: &Attributes| -> Result<Detection, EngineEvaluationError> { Ok(Detection::pass()) },
/// );
///
/// let stored = ctx.append_event(Event::new(
///     Verdict::Monitor,
///     MatchResult::empty(),
///     Subject::request("req-123"),
///     "http.request",
/// ));
/// assert_eq!(stored.sequence(), 0);
///
/// let exported = ctx.into_events();
/// assert_eq!(exported.len(), 1);
/// ```
pub struct SecurityContext {
    request_id: String,
    session: RefCell<Box<dyn EngineSession>>,
    events: RefCell<Vec<Event>>,
}

impl SecurityContext {
    /// Creates a context around an engine session.
    pub fn new(request_id: impl Into<String>, session: impl EngineSession + 'static) -> Self {
        Self::from_boxed(request_id, Box::new(session))
    }

    /// Creates a context around an already boxed session.
    pub fn from_boxed(request_id: impl Into<String>, session: Box<dyn EngineSession>) -> Self {
        let request_id = request_id.into();
        tracing::debug!(request_id = %request_id, "security context opened");
        Self {
            request_id,
            session: RefCell::new(session),
            events: RefCell::new(Vec::new()),
        }
    }

    /// Creates a context with a fresh session from `engine`.
    pub fn from_engine(request_id: impl Into<String>, engine: &dyn DetectionEngine) -> Self {
        Self::from_boxed(request_id, engine.new_session())
    }

    /// Returns the request ID for this context.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Borrows the engine session.
    ///
    /// Returns `None` while a detection call is in progress.
    pub fn session(&self) -> Option<RefMut<'_, Box<dyn EngineSession>>> {
        self.session.try_borrow_mut().ok()
    }

    /// Runs the engine on `attributes`.
    ///
    /// A re-entrant call (detection triggered from inside detection) is
    /// reported as an evaluation error rather than panicking.
    pub(crate) fn evaluate(
        &self,
        attributes: &Attributes,
    ) -> Result<Detection, EngineEvaluationError> {
        let mut session = self
            .session
            .try_borrow_mut()
            .map_err(|_| EngineEvaluationError::failed("engine session is already in use"))?;
        session.evaluate(attributes)
    }

    /// Appends an event and returns the stored copy.
    ///
    /// The event is stamped with its position in the log. Earlier entries
    /// are never touched.
    pub fn append_event(&self, event: Event) -> Event {
        let mut events = self.events.borrow_mut();
        let stored = event.sequenced(events.len() as u64);
        events.push(stored.clone());
        stored
    }

    /// Returns a snapshot of the log in append order.
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Consumes the context and hands the full log to the caller.
    pub fn into_events(mut self) -> Vec<Event> {
        std::mem::take(self.events.get_mut())
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("request_id", &self.request_id)
            .field("events", &self.events.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Drop for SecurityContext {
    fn drop(&mut self) {
        let pending = self.events.get_mut().len();
        if pending > 0 {
            tracing::warn!(
                request_id = %self.request_id,
                pending,
                "security context dropped with unexported events"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MatchResult;
    use crate::event::Subject;
    use crate::verdict::Verdict;

    fn passing_session() -> impl EngineSession {
        |_: &Attributes| -> Result<Detection, EngineEvaluationError> { Ok(Detection::pass()) }
    }

    fn event(point: &str) -> Event {
        Event::new(
            Verdict::Monitor,
            MatchResult::empty(),
            Subject::request("req-1"),
            point,
        )
    }

    #[test]
    fn context_starts_empty() {
        let ctx = SecurityContext::new("req-1", passing_session());
        assert_eq!(ctx.request_id(), "req-1");
        assert!(ctx.is_empty());
        assert_eq!(ctx.len(), 0);
    }

    #[test]
    fn append_assigns_sequence_in_order() {
        let ctx = SecurityContext::new("req-1", passing_session());

        let first = ctx.append_event(event("http.request"));
        let second = ctx.append_event(event("http.request.body"));
        let third = ctx.append_event(event("http.response"));

        assert_eq!(
            (first.sequence(), second.sequence(), third.sequence()),
            (0, 1, 2)
        );

        let points: Vec<_> = ctx
            .events()
            .iter()
            .map(|e| e.watch_point().to_owned())
            .collect();
        assert_eq!(
            points,
            vec!["http.request", "http.request.body", "http.response"]
        );
    }

    #[test]
    fn snapshot_does_not_drain() {
        let ctx = SecurityContext::new("req-1", passing_session());
        ctx.append_event(event("a"));

        assert_eq!(ctx.events().len(), 1);
        assert_eq!(ctx.events().len(), 1);
        assert_eq!(ctx.into_events().len(), 1);
    }

    #[test]
    fn evaluate_uses_session() {
        let ctx = SecurityContext::new(
            "req-1",
            |attrs: &Attributes| -> Result<Detection, EngineEvaluationError> {
                if attrs.path() == Some("/admin") {
                    Ok(Detection::monitor(serde_json::json!({"rule": "admin"})))
                } else {
                    Ok(Detection::pass())
                }
            },
        );

        let hit = ctx
            .evaluate(&Attributes::new().with_uri("/admin"))
            .unwrap();
        assert_eq!(hit.verdict, Verdict::Monitor);

        let miss = ctx.evaluate(&Attributes::new().with_uri("/")).unwrap();
        assert_eq!(miss.verdict, Verdict::Ok);
    }

    #[test]
    fn session_is_unavailable_during_evaluation() {
        let ctx = SecurityContext::new("req-1", passing_session());
        let held = ctx.session();
        assert!(held.is_some());

        let err = ctx.evaluate(&Attributes::new()).unwrap_err();
        assert!(err.to_string().contains("already in use"));
        drop(held);

        assert!(ctx.evaluate(&Attributes::new()).is_ok());
    }

    struct PassEngine;

    impl DetectionEngine for PassEngine {
        fn new_session(&self) -> Box<dyn EngineSession> {
            Box::new(passing_session())
        }
    }

    #[test]
    fn context_from_engine() {
        let ctx = SecurityContext::from_engine("req-9", &PassEngine);
        assert_eq!(ctx.request_id(), "req-9");
        assert!(ctx.session().is_some());
    }

    #[test]
    fn debug_hides_session() {
        let ctx = SecurityContext::new("req-dbg", passing_session());
        let debug = format!("{:?}", ctx);
        assert!(debug.contains("req-dbg"));
        assert!(debug.contains("events: 0"));
    }
}
