//! Integrations: explicit extension points that attach watchers at startup.
//!
//! An integration knows which watch points a host framework fires and which
//! watchers belong on them. It registers them on a configuring gateway
//! through [`Gateway::install`], never by reaching into types it does not
//! own.

use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::gateway::Gateway;
use crate::state::Configuring;
use crate::trace::{NoTracing, TraceCorrelation};
use crate::watcher::EngineWatcher;

/// Watch point names fired by HTTP host integrations.
pub mod points {
    /// Request started; payload is [`HttpRequest`](crate::web::HttpRequest).
    pub const REQUEST: &str = "http.request";
    /// Request body parsed; payload is [`RequestBody`](crate::web::RequestBody).
    pub const REQUEST_BODY: &str = "http.request.body";
    /// Response produced; payload is [`HttpResponse`](crate::web::HttpResponse).
    pub const RESPONSE: &str = "http.response";

    /// All HTTP watch points in lifecycle order.
    pub const ALL: [&str; 3] = [REQUEST, REQUEST_BODY, RESPONSE];
}

/// A bundle of watchers registered together.
///
/// # Examples
///
/// ```
/// use appsec_gateway::{
///     ConfigurationError, Configuring, EngineWatcher, Gateway, GatewayConfig, Integration,
/// };
///
/// struct AdminPaths;
///
/// impl Integration for AdminPaths {
///     fn name(&self) -> &str {
///         "admin-paths"
///     }
///
///     fn register(&self, gateway: &mut Gateway<Configuring>) -> Result<(), ConfigurationError> {
///         gateway.watch("admin.request", EngineWatcher::request())?;
///         Ok(())
///     }
/// }
///
/// let mut gateway = Gateway::new(GatewayConfig::default());
/// gateway.install(&AdminPaths).unwrap();
/// gateway.install(&AdminPaths).unwrap(); // skipped
/// assert_eq!(gateway.watchers_for("admin.request"), vec!["waf.request"]);
/// ```
pub trait Integration {
    /// Name used to install the integration at most once.
    fn name(&self) -> &str;

    /// Registers this integration's watchers.
    fn register(&self, gateway: &mut Gateway<Configuring>) -> Result<(), ConfigurationError>;
}

/// Registers the three engine watchers on the HTTP watch points.
#[derive(Clone)]
pub struct HttpIntegration {
    correlation: Arc<dyn TraceCorrelation>,
}

impl HttpIntegration {
    /// HTTP integration without trace correlation.
    pub fn new() -> Self {
        Self {
            correlation: Arc::new(NoTracing),
        }
    }

    /// Attaches trace and span references from `correlation` to recorded events.
    pub fn with_tracing(mut self, correlation: Arc<dyn TraceCorrelation>) -> Self {
        self.correlation = correlation;
        self
    }
}

impl Default for HttpIntegration {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIntegration").finish_non_exhaustive()
    }
}

impl Integration for HttpIntegration {
    fn name(&self) -> &str {
        "http"
    }

    fn register(&self, gateway: &mut Gateway<Configuring>) -> Result<(), ConfigurationError> {
        let correlation = || Arc::clone(&self.correlation);
        gateway
            .watch(
                points::REQUEST,
                EngineWatcher::request().with_tracing(correlation()),
            )?
            .watch(
                points::REQUEST_BODY,
                EngineWatcher::request_body().with_tracing(correlation()),
            )?
            .watch(
                points::RESPONSE,
                EngineWatcher::response().with_tracing(correlation()),
            )?;
        Ok(())
    }
}
