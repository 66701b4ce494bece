//! In-process application security instrumentation.
//!
//! This crate intercepts HTTP request/response lifecycle events inside a
//! host application, evaluates them with a pluggable detection engine, and
//! decides whether the real work proceeds:
//! - **Gateway**: named watch points with ordered watcher chains
//! - **Reactive operation**: single-shot, synchronous publish/subscribe used
//!   for one evaluation
//! - **Security context**: per-request engine session and event log
//!
//! Verdicts are ordered `block > monitor > ok`. Engine failures and engine
//! panics fail open: they are logged and treated as `ok`, so instrumentation
//! can never block or crash real traffic.
//!
//! # Core Types
//!
//! - [`Gateway`]: registry and dispatcher; configure, then [`finalize`](Gateway::finalize)
//! - [`Watcher`] / [`EngineWatcher`]: adapters between a payload and the engine
//! - [`SecurityContext`]: per-request session and append-only [`Event`] log
//! - [`Operation`]: the dispatch primitive behind [`EngineWatcher`]
//! - [`Verdict`]: `ok`, `monitor` or `block`
//!
//! # Examples
//!
//! ```
//! use appsec_gateway::web::HttpRequest;
//! use appsec_gateway::{
//!     Attributes, Detection, EngineEvaluationError, Flow, Gateway, GatewayConfig,
//!     HttpIntegration, SecurityContext, points,
//! };
//!
//! // Startup: build and freeze the registry.
//! let mut gateway = Gateway::new(GatewayConfig::default());
//! gateway.install(&HttpIntegration::new()).expect("valid registration");
//! let gateway = gateway.finalize();
//!
//! // Per request: a context around an engine session.
//! let ctx = SecurityContext::new(
//!     "req-123",
//!     |attrs: &Attributes| -> Result<Detection, EngineEvaluationError> {
//!         let sqli = attrs
//!             .query()
//!             .into_iter()
//!             .flatten()
//!             .any(|(_, v)| v.contains("' OR '1'='1"));
//!         Ok(if sqli {
//!             Detection::block(serde_json::json!({"rule": "sqli"}))
//!         } else {
//!             Detection::pass()
//!         })
//!     },
//! );
//!
//! let request = HttpRequest::new("req-123", "GET", "/search?q=' OR '1'='1");
//! let result = gateway.push(points::REQUEST, &ctx, request, |_| "handled");
//!
//! assert_eq!(result.flow, Flow::Blocked);
//! assert_eq!(ctx.into_events().len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod attributes;
mod config;
mod context;
mod engine;
mod error;
mod event;
mod gateway;
mod integration;
pub mod reactive;
mod state;
mod trace;
mod verdict;
mod watcher;
pub mod web;

pub use attributes::{Attributes, Pairs};
pub use config::{ChainPolicy, EnforcementMode, GatewayConfig};
pub use context::SecurityContext;
pub use engine::{Detection, DetectionEngine, EngineSession, MatchResult};
pub use error::{ConfigurationError, EngineEvaluationError, Error, ProtocolError};
pub use event::{Event, Subject, SubjectKind};
pub use gateway::{Flow, Gateway, PushResult, WatchPoint};
pub use integration::{points, HttpIntegration, Integration};
pub use reactive::{Operation, OperationState, Subscribed, Topic};
pub use state::{Configuring, Finalized};
pub use trace::{CurrentSpan, NoTracing, SpanRef, TraceCorrelation, TraceRef};
pub use verdict::Verdict;
pub use watcher::{EngineWatcher, Watcher, WatcherKind, WatcherOutcome};
