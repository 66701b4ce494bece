//! Request lifecycle middleware.
//!
//! [`instrument`] drives one request through the three HTTP watch points
//! registered by [`HttpIntegration`](crate::HttpIntegration):
//!
//! ```text
//! HttpRequest
//!   ↓ push http.request
//! RequestBody (optional)
//!   ↓ push http.request.body
//! handler(request, body) -> HttpResponse
//!   ↓ push http.response
//! InstrumentedResponse
//! ```
//!
//! A block at any stage stops the pipeline: later stages never run, and the
//! handler is skipped if the block came before it. All pushes share one
//! [`SecurityContext`], so its log holds every event of the request in order.

use crate::context::SecurityContext;
use crate::event::Event;
use crate::gateway::{Flow, Gateway};
use crate::integration::points;
use crate::verdict::Verdict;

use super::{HttpRequest, HttpResponse, RequestBody};

/// Status sent in place of a blocked response.
pub const BLOCKED_STATUS: u16 = 403;

/// How an instrumented request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Every stage proceeded; this is the handler's response
    Served(HttpResponse),
    /// A watcher blocked at this watch point
    Blocked {
        /// Watch point that blocked
        watch_point: &'static str,
    },
}

/// Result of [`instrument`].
///
/// # Examples
///
/// ```
/// use appsec_gateway::web::{instrument, HttpRequest, HttpResponse};
/// use appsec_gateway::{
///     Attributes, Detection, EngineEvaluationError, Gateway, GatewayConfig, HttpIntegration,
///     SecurityContext,
/// };
///
/// let mut gateway = Gateway::new(GatewayConfig::default());
/// gateway.install(&HttpIntegration::new()).unwrap();
/// let gateway = gateway.finalize();
///
/// let ctx = SecurityContext::new(
///     "req-1",
///     |attrs: &Attributes| -> Result<Detection, EngineEvaluationError> {
///         Ok(match attrs.path() {
///             Some("/.env") => Detection::block(serde_json::json!({"rule": "dotfile"})),
///             _ => Detection::pass(),
///         })
///     },
/// );
///
/// let request = HttpRequest::new("req-1", "GET", "/.env");
/// let result = instrument(&gateway, &ctx, request, None, |_, _| {
///     HttpResponse::new("req-1", 200)
/// });
///
/// assert_eq!(result.blocked_at(), Some("http.request"));
/// assert_eq!(result.into_response().status(), 403);
/// # let _ = ctx.into_events();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentedResponse {
    request_id: String,
    /// How the request ended
    pub disposition: Disposition,
    /// Events raised by every stage that ran, in order
    pub events: Vec<(Verdict, Event)>,
}

impl InstrumentedResponse {
    /// True if a watcher blocked the request.
    pub fn is_blocked(&self) -> bool {
        matches!(self.disposition, Disposition::Blocked { .. })
    }

    /// Watch point that blocked, if any.
    pub fn blocked_at(&self) -> Option<&'static str> {
        match self.disposition {
            Disposition::Blocked { watch_point } => Some(watch_point),
            Disposition::Served(_) => None,
        }
    }

    /// Handler response, if the request was served.
    pub fn response(&self) -> Option<&HttpResponse> {
        match &self.disposition {
            Disposition::Served(response) => Some(response),
            Disposition::Blocked { .. } => None,
        }
    }

    /// Response to send: the handler's, or an empty [`BLOCKED_STATUS`] response.
    pub fn into_response(self) -> HttpResponse {
        match self.disposition {
            Disposition::Served(response) => response,
            Disposition::Blocked { .. } => HttpResponse::new(self.request_id, BLOCKED_STATUS),
        }
    }
}

/// Runs `handler` for `request`, pushing each lifecycle stage through `gateway`.
///
/// `ctx` must belong to the same request. The handler receives the request
/// and body back once they have passed their watch points.
pub fn instrument<H>(
    gateway: &Gateway,
    ctx: &SecurityContext,
    request: HttpRequest,
    body: Option<RequestBody>,
    handler: H,
) -> InstrumentedResponse
where
    H: FnOnce(HttpRequest, Option<RequestBody>) -> HttpResponse,
{
    let mut events = Vec::new();
    let finish = |disposition: Disposition, events: Vec<(Verdict, Event)>| InstrumentedResponse {
        request_id: ctx.request_id().to_owned(),
        disposition,
        events,
    };

    let pushed = gateway.push(points::REQUEST, ctx, request, |req| req);
    events.extend(pushed.events);
    let request = match pushed.flow {
        Flow::Proceed(request) => request,
        Flow::Blocked => return finish(blocked(points::REQUEST), events),
    };

    let body = match body {
        Some(body) => {
            let pushed = gateway.push(points::REQUEST_BODY, ctx, body, |b| b);
            events.extend(pushed.events);
            match pushed.flow {
                Flow::Proceed(body) => Some(body),
                Flow::Blocked => return finish(blocked(points::REQUEST_BODY), events),
            }
        }
        None => None,
    };

    let response = handler(request, body);

    let pushed = gateway.push(points::RESPONSE, ctx, response, |r| r);
    events.extend(pushed.events);
    match pushed.flow {
        Flow::Proceed(response) => finish(Disposition::Served(response), events),
        Flow::Blocked => finish(blocked(points::RESPONSE), events),
    }
}

fn blocked(watch_point: &'static str) -> Disposition {
    Disposition::Blocked { watch_point }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attributes;
    use crate::config::GatewayConfig;
    use crate::engine::Detection;
    use crate::error::EngineEvaluationError;
    use crate::integration::HttpIntegration;
    use serde_json::json;

    fn http_gateway() -> Gateway {
        let mut gateway = Gateway::new(GatewayConfig::default());
        gateway.install(&HttpIntegration::new()).unwrap();
        gateway.finalize()
    }

    fn engine(attrs: &Attributes) -> Result<Detection, EngineEvaluationError> {
        if attrs.path() == Some("/admin") {
            return Ok(Detection::monitor(json!({"rule": "admin-path"})));
        }
        if let Some(body) = attrs.body() {
            if body["q"] == "' OR '1'='1" {
                return Ok(Detection::block(json!({"rule": "sqli"})));
            }
        }
        if attrs.status() == Some(500) {
            return Ok(Detection::block(json!({"rule": "error-leak"})));
        }
        Ok(Detection::pass())
    }

    #[test]
    fn clean_request_is_served() {
        let gateway = http_gateway();
        let ctx = SecurityContext::new("req-1", engine);

        let result = instrument(
            &gateway,
            &ctx,
            HttpRequest::new("req-1", "GET", "/"),
            Some(RequestBody::new("req-1", json!({"q": "rust"}))),
            |_, _| HttpResponse::new("req-1", 200),
        );

        assert!(!result.is_blocked());
        assert!(result.events.is_empty());
        assert_eq!(result.response().map(HttpResponse::status), Some(200));
        assert!(ctx.is_empty());
    }

    #[test]
    fn monitor_events_accumulate_across_stages() {
        let gateway = http_gateway();
        let ctx = SecurityContext::new("req-2", engine);

        let result = instrument(
            &gateway,
            &ctx,
            HttpRequest::new("req-2", "GET", "/admin"),
            None,
            |req, _| {
                assert_eq!(req.path(), "/admin");
                HttpResponse::new("req-2", 200)
            },
        );

        assert_eq!(result.blocked_at(), None);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].1.watch_point(), points::REQUEST);
        assert_eq!(ctx.into_events().len(), 1);
    }

    #[test]
    fn body_block_skips_handler() {
        let gateway = http_gateway();
        let ctx = SecurityContext::new("req-3", engine);
        let mut handled = false;

        let result = instrument(
            &gateway,
            &ctx,
            HttpRequest::new("req-3", "POST", "/search"),
            Some(RequestBody::new("req-3", json!({"q": "' OR '1'='1"}))),
            |_, _| {
                handled = true;
                HttpResponse::new("req-3", 200)
            },
        );

        assert!(!handled);
        assert_eq!(result.blocked_at(), Some(points::REQUEST_BODY));
        assert_eq!(result.events[0].0, Verdict::Block);
        let response = result.into_response();
        assert_eq!(response.status(), BLOCKED_STATUS);
        assert_eq!(response.request_id(), "req-3");
        let _ = ctx.into_events();
    }

    #[test]
    fn response_block_replaces_response() {
        let gateway = http_gateway();
        let ctx = SecurityContext::new("req-4", engine);

        let result = instrument(
            &gateway,
            &ctx,
            HttpRequest::new("req-4", "GET", "/admin"),
            None,
            |_, _| HttpResponse::new("req-4", 500),
        );

        assert_eq!(result.blocked_at(), Some(points::RESPONSE));
        let actions: Vec<_> = result.events.iter().map(|(v, _)| *v).collect();
        assert_eq!(actions, vec![Verdict::Monitor, Verdict::Block]);

        let log = ctx.into_events();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].watch_point(), points::REQUEST);
        assert_eq!(log[1].watch_point(), points::RESPONSE);
    }
}
