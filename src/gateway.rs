use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use crate::config::{ChainPolicy, GatewayConfig};
use crate::context::SecurityContext;
use crate::error::ConfigurationError;
use crate::event::Event;
use crate::integration::Integration;
use crate::state::{Configuring, Finalized};
use crate::verdict::Verdict;
use crate::watcher::{panic_message, Watcher, WatcherOutcome};
use crate::web::ExtractAttributes;

/// A named interception point and its ordered watcher chain.
pub struct WatchPoint {
    name: String,
    watchers: Vec<Box<dyn Watcher>>,
}

impl WatchPoint {
    fn new(name: String) -> Self {
        Self {
            name,
            watchers: Vec::new(),
        }
    }

    /// Watch point name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Watcher names in registration order.
    pub fn watcher_names(&self) -> impl Iterator<Item = &str> {
        self.watchers.iter().map(|w| w.name())
    }

    /// Number of registered watchers.
    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    /// True if no watcher is registered.
    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

impl fmt::Debug for WatchPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchPoint")
            .field("name", &self.name)
            .field("watchers", &self.watcher_names().collect::<Vec<_>>())
            .finish()
    }
}

/// What the host should do after a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow<R> {
    /// The wrapped work ran and returned this value
    Proceed(R),
    /// A watcher blocked; the wrapped work never ran
    Blocked,
}

/// Result of [`Gateway::push`].
///
/// `events` pairs each event with the action taken for it: `Block` for the
/// event that stopped the push, `Monitor` for events recorded on a push that
/// proceeded.
#[derive(Debug, Clone, PartialEq)]
pub struct PushResult<R> {
    /// Host control flow
    pub flow: Flow<R>,
    /// Events raised by this push, in chain order
    pub events: Vec<(Verdict, Event)>,
}

impl<R> PushResult<R> {
    fn proceed(value: R, events: Vec<(Verdict, Event)>) -> Self {
        Self {
            flow: Flow::Proceed(value),
            events,
        }
    }

    fn blocked(events: Vec<(Verdict, Event)>) -> Self {
        Self {
            flow: Flow::Blocked,
            events,
        }
    }

    /// True if the wrapped work was skipped.
    pub fn is_blocked(&self) -> bool {
        matches!(self.flow, Flow::Blocked)
    }

    /// The wrapped work's return value, if it ran.
    pub fn value(&self) -> Option<&R> {
        match &self.flow {
            Flow::Proceed(value) => Some(value),
            Flow::Blocked => None,
        }
    }

    /// Consumes the result, keeping only the return value.
    pub fn into_value(self) -> Option<R> {
        match self.flow {
            Flow::Proceed(value) => Some(value),
            Flow::Blocked => None,
        }
    }
}

/// Registry of watch points and dispatcher of lifecycle events.
///
/// `Gateway<S>` is generic over its registry state:
/// - `Gateway<Configuring>`: accepts [`watch`](Gateway::watch) and
///   [`install`](Gateway::install), cannot dispatch
/// - `Gateway<Finalized>`: frozen, dispatches with [`push`](Gateway::push)
///
/// One finalized gateway is built at process start and shared (by reference
/// or `Arc`) with every request thread. It holds no interior mutability, so
/// concurrent pushes need no locking.
///
/// # Examples
///
/// ```
/// use appsec_gateway::web::HttpRequest;
/// use appsec_gateway::{
///     Attributes, Detection, EngineEvaluationError, EngineWatcher, Gateway, GatewayConfig,
///     SecurityContext, Verdict,
/// };
///
/// let mut gateway = Gateway::new(GatewayConfig::default());
/// gateway.watch("http.request", EngineWatcher::request()).unwrap();
/// let gateway = gateway.finalize();
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
/// let result = gateway.push("http.request", &ctx, request, |req| req.path().to_owned());
///
/// assert_eq!(result.value().map(String::as_str), Some("/admin"));
/// assert_eq!(result.events.len(), 1);
/// assert_eq!(result.events[0].0, Verdict::Monitor);
/// # let _ = ctx.into_events();
/// ```
///
/// A finalized gateway cannot be modified:
///
/// ```compile_fail
/// use appsec_gateway::{EngineWatcher, Gateway, GatewayConfig};
///
/// let mut gateway = Gateway::new(GatewayConfig::default()).finalize();
/// gateway.watch("http.request", EngineWatcher::request());
/// ```
pub struct Gateway<S = Finalized> {
    config: GatewayConfig,
    points: BTreeMap<String, WatchPoint>,
    installed: Vec<String>,
    _state: PhantomData<S>,
}

// ============================================================================
// Shared methods (available on all states)
// ============================================================================

impl<S> Gateway<S> {
    /// Gateway settings.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Registered watch point names, sorted.
    pub fn points(&self) -> impl Iterator<Item = &str> {
        self.points.keys().map(String::as_str)
    }

    /// Looks up a watch point.
    pub fn watch_point(&self, name: &str) -> Option<&WatchPoint> {
        self.points.get(name)
    }

    /// Watcher names registered on `point`, in chain order. Empty if unknown.
    pub fn watchers_for(&self, point: &str) -> Vec<&str> {
        self.points
            .get(point)
            .map(|wp| wp.watcher_names().collect())
            .unwrap_or_default()
    }

    /// Names of installed integrations, in install order.
    pub fn integrations(&self) -> &[String] {
        &self.installed
    }
}

// ============================================================================
// Gateway<Configuring> - startup registration
// ============================================================================

impl Gateway<Configuring> {
    /// Creates an empty gateway in the configuring state.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            points: BTreeMap::new(),
            installed: Vec::new(),
            _state: PhantomData,
        }
    }

    /// Appends `watcher` to the chain of `point`, creating the point if needed.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::InvalidWatchPointName`] for an empty name,
    ///   surrounding whitespace or control characters
    /// - [`ConfigurationError::DuplicateWatcher`] if a watcher with the same
    ///   name is already on this point
    pub fn watch(
        &mut self,
        point: &str,
        watcher: impl Watcher + 'static,
    ) -> Result<&mut Self, ConfigurationError> {
        validate_point_name(point)?;

        let entry = self
            .points
            .entry(point.to_owned())
            .or_insert_with(|| WatchPoint::new(point.to_owned()));

        if entry.watcher_names().any(|n| n == watcher.name()) {
            return Err(ConfigurationError::DuplicateWatcher {
                point: point.to_owned(),
                watcher: watcher.name().to_owned(),
            });
        }

        tracing::debug!(
            watch_point = point,
            watcher = watcher.name(),
            position = entry.len(),
            "watcher registered"
        );
        entry.watchers.push(Box::new(watcher));
        Ok(self)
    }

    /// Lets `integration` register its watchers.
    ///
    /// Each integration name is installed at most once; repeated installs
    /// are skipped. A failing integration is logged and its error returned.
    /// Watchers it registered before failing stay registered, which is
    /// acceptable because configuration errors abort startup.
    ///
    /// # Errors
    ///
    /// Whatever [`Integration::register`] returns.
    pub fn install(
        &mut self,
        integration: &dyn Integration,
    ) -> Result<&mut Self, ConfigurationError> {
        let name = integration.name();
        if self.installed.iter().any(|n| n == name) {
            tracing::debug!(integration = name, "integration already installed");
            return Ok(self);
        }

        if let Err(err) = integration.register(self) {
            tracing::error!(
                integration = name,
                error = %err,
                "failed to install integration"
            );
            return Err(err);
        }

        self.installed.push(name.to_owned());
        tracing::info!(integration = name, "integration installed");
        Ok(self)
    }

    /// Freezes the registry.
    pub fn finalize(self) -> Gateway<Finalized> {
        tracing::info!(
            points = self.points.len(),
            enabled = self.config.enabled,
            mode = %self.config.mode,
            chain_policy = %self.config.chain_policy,
            "gateway finalized"
        );
        Gateway {
            config: self.config,
            points: self.points,
            installed: self.installed,
            _state: PhantomData,
        }
    }
}

impl Default for Gateway<Configuring> {
    fn default() -> Self {
        Self::new(GatewayConfig::default())
    }
}

// ============================================================================
// Gateway<Finalized> - dispatch
// ============================================================================

impl Gateway<Finalized> {
    /// Dispatches `payload` to the watchers of `point`, then runs `call` unless blocked.
    ///
    /// Watchers run synchronously, in registration order, on the calling
    /// thread. Under [`ChainPolicy::FirstBlockWins`] the first enforced block
    /// ends the chain: later watchers and `call` never run and the result
    /// carries only the blocking event. Under [`ChainPolicy::EvaluateAll`]
    /// every watcher runs and the push blocks afterwards if any of them
    /// blocked. Otherwise `call` runs exactly once and every event recorded
    /// by the chain is returned tagged `Monitor`.
    ///
    /// An unregistered point, or a disabled gateway, runs `call` directly
    /// and returns no events.
    pub fn push<T, R, F>(
        &self,
        point: &str,
        ctx: &SecurityContext,
        payload: T,
        call: F,
    ) -> PushResult<R>
    where
        T: ExtractAttributes,
        F: FnOnce(T) -> R,
    {
        if !self.config.enabled {
            return PushResult::proceed(call(payload), Vec::new());
        }

        let Some(chain) = self.points.get(point) else {
            tracing::trace!(
                request_id = %ctx.request_id(),
                watch_point = point,
                "no watchers for point"
            );
            return PushResult::proceed(call(payload), Vec::new());
        };

        let enforce = self.config.enforces_blocks();
        let mut recorded: Vec<(bool, Event)> = Vec::new();
        let mut blocked_by: Option<&str> = None;

        for watcher in &chain.watchers {
            let outcome = evaluate_guarded(watcher.as_ref(), point, ctx, &payload);

            if outcome.block && !enforce {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    watch_point = point,
                    watcher = watcher.name(),
                    "block not enforced in monitor-only mode"
                );
            }
            let block = outcome.block && enforce;

            if block && self.config.chain_policy == ChainPolicy::FirstBlockWins {
                log_blocked(ctx, point, watcher.name());
                let events = outcome
                    .event
                    .map(|event| (Verdict::Block, event))
                    .into_iter()
                    .collect();
                return PushResult::blocked(events);
            }

            if block && blocked_by.is_none() {
                blocked_by = Some(watcher.name());
            }
            if let Some(event) = outcome.event {
                recorded.push((block, event));
            }
        }

        if let Some(watcher) = blocked_by {
            log_blocked(ctx, point, watcher);
            let events = recorded
                .into_iter()
                .map(|(block, event)| {
                    let action = if block { Verdict::Block } else { Verdict::Monitor };
                    (action, event)
                })
                .collect();
            return PushResult::blocked(events);
        }

        let value = call(payload);
        let events = recorded
            .into_iter()
            .map(|(_, event)| (Verdict::Monitor, event))
            .collect();
        PushResult::proceed(value, events)
    }
}

/// Runs one watcher, turning a panic into a pass.
fn evaluate_guarded(
    watcher: &dyn Watcher,
    point: &str,
    ctx: &SecurityContext,
    payload: &dyn ExtractAttributes,
) -> WatcherOutcome {
    panic::catch_unwind(AssertUnwindSafe(|| watcher.evaluate(point, ctx, payload))).unwrap_or_else(
        |cause| {
            tracing::warn!(
                request_id = %ctx.request_id(),
                watch_point = point,
                watcher = watcher.name(),
                panic = %panic_message(&*cause),
                "watcher panicked, failing open"
            );
            WatcherOutcome::pass()
        },
    )
}

impl<S> fmt::Debug for Gateway<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("points", &self.points.values().collect::<Vec<_>>())
            .field("integrations", &self.installed)
            .finish()
    }
}

fn log_blocked(ctx: &SecurityContext, point: &str, watcher: &str) {
    tracing::info!(
        request_id = %ctx.request_id(),
        watch_point = point,
        watcher,
        "request blocked"
    );
}

fn validate_point_name(name: &str) -> Result<(), ConfigurationError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.trim() != name {
        Some("must not have surrounding whitespace")
    } else if name.chars().any(char::is_control) {
        Some("must not contain control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigurationError::InvalidWatchPointName {
            name: name.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attributes;
    use crate::config::EnforcementMode;
    use crate::engine::{Detection, MatchResult};
    use crate::error::EngineEvaluationError;
    use crate::event::Subject;
    use crate::watcher::{EngineWatcher, WatcherOutcome};
    use crate::web::HttpRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Watcher with a fixed verdict that counts its invocations.
    struct Scripted {
        name: &'static str,
        verdict: Verdict,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(name: &'static str, verdict: Verdict) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    verdict,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl Watcher for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn evaluate(
            &self,
            point: &str,
            ctx: &SecurityContext,
            payload: &dyn ExtractAttributes,
        ) -> WatcherOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let event = self.verdict.is_recordable().then(|| {
                ctx.append_event(Event::new(
                    self.verdict,
                    MatchResult::new(serde_json::json!({ "watcher": self.name })),
                    payload.subject(),
                    point,
                ))
            });
            WatcherOutcome {
                verdict: self.verdict,
                result: None,
                block: self.verdict.is_block(),
                event,
            }
        }
    }

    fn ctx() -> SecurityContext {
        SecurityContext::new(
            "req-gw",
            |_: &Attributes| -> Result<Detection, EngineEvaluationError> { Ok(Detection::pass()) },
        )
    }

    fn request() -> HttpRequest {
        HttpRequest::new("req-gw", "GET", "/")
    }

    #[test]
    fn unregistered_point_passes_through() {
        let gateway = Gateway::new(GatewayConfig::default()).finalize();
        let ctx = ctx();
        let mut calls = 0;

        let result = gateway.push("unknown", &ctx, request(), |_| {
            calls += 1;
            "done"
        });

        assert_eq!(calls, 1);
        assert_eq!(result.flow, Flow::Proceed("done"));
        assert!(result.events.is_empty());
    }

    #[test]
    fn watchers_run_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        struct Recording(&'static str, Arc<std::sync::Mutex<Vec<&'static str>>>);
        impl Watcher for Recording {
            fn name(&self) -> &str {
                self.0
            }
            fn evaluate(
                &self,
                _: &str,
                _: &SecurityContext,
                _: &dyn ExtractAttributes,
            ) -> WatcherOutcome {
                self.1.lock().unwrap().push(self.0);
                WatcherOutcome::pass()
            }
        }

        let mut gateway = Gateway::new(GatewayConfig::default());
        for name in ["first", "second", "third"] {
            gateway
                .watch("p", Recording(name, Arc::clone(&order)))
                .unwrap();
        }
        let gateway = gateway.finalize();

        gateway.push("p", &ctx(), request(), |_| ());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_watcher_fails_open() {
        struct Exploding;
        impl Watcher for Exploding {
            fn name(&self) -> &str {
                "exploding"
            }
            fn evaluate(
                &self,
                _: &str,
                _: &SecurityContext,
                _: &dyn ExtractAttributes,
            ) -> WatcherOutcome {
                panic!("third-party watcher bug");
            }
        }

        let (after, after_calls) = Scripted::new("after", Verdict::Monitor);
        let mut gateway = Gateway::new(GatewayConfig::default());
        gateway
            .watch("p", Exploding)
            .unwrap()
            .watch("p", after)
            .unwrap();
        let gateway = gateway.finalize();
        let ctx = ctx();
        let mut called = false;

        let result = gateway.push("p", &ctx, request(), |_| called = true);

        assert!(!result.is_blocked());
        assert!(called);
        assert_eq!(after_calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.events.len(), 1);
        // The context is still usable after the unwind.
        assert_eq!(ctx.into_events().len(), 1);
    }

    #[test]
    fn first_block_short_circuits_chain_and_call() {
        let (w1, c1) = Scripted::new("w1", Verdict::Monitor);
        let (w2, c2) = Scripted::new("w2", Verdict::Block);
        let (w3, c3) = Scripted::new("w3", Verdict::Monitor);

        let mut gateway = Gateway::new(GatewayConfig::default());
        gateway.watch("p", w1).unwrap().watch("p", w2).unwrap().watch("p", w3).unwrap();
        let gateway = gateway.finalize();
        let ctx = ctx();
        let mut called = false;

        let result = gateway.push("p", &ctx, request(), |_| called = true);

        assert!(result.is_blocked());
        assert!(!called);
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert_eq!(c3.load(Ordering::SeqCst), 0);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].0, Verdict::Block);
        // The earlier monitor event is still in the request's log.
        assert_eq!(ctx.into_events().len(), 2);
    }

    #[test]
    fn monitor_events_are_attached_to_proceeding_push() {
        let (w1, _) = Scripted::new("w1", Verdict::Monitor);
        let (w2, _) = Scripted::new("w2", Verdict::Ok);
        let (w3, _) = Scripted::new("w3", Verdict::Monitor);

        let mut gateway = Gateway::new(GatewayConfig::default());
        gateway.watch("p", w1).unwrap().watch("p", w2).unwrap().watch("p", w3).unwrap();
        let gateway = gateway.finalize();
        let ctx = ctx();

        let result = gateway.push("p", &ctx, request(), |_| 7);

        assert_eq!(result.value(), Some(&7));
        let actions: Vec<_> = result.events.iter().map(|(v, _)| *v).collect();
        assert_eq!(actions, vec![Verdict::Monitor, Verdict::Monitor]);
        let _ = ctx.into_events();
    }

    #[test]
    fn evaluate_all_runs_every_watcher_before_blocking() {
        let (w1, c1) = Scripted::new("w1", Verdict::Block);
        let (w2, c2) = Scripted::new("w2", Verdict::Monitor);

        let config = GatewayConfig {
            chain_policy: ChainPolicy::EvaluateAll,
            ..GatewayConfig::default()
        };
        let mut gateway = Gateway::new(config);
        gateway.watch("p", w1).unwrap().watch("p", w2).unwrap();
        let gateway = gateway.finalize();
        let ctx = ctx();
        let mut called = false;

        let result = gateway.push("p", &ctx, request(), |_| called = true);

        assert!(result.is_blocked());
        assert!(!called);
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        let actions: Vec<_> = result.events.iter().map(|(v, _)| *v).collect();
        assert_eq!(actions, vec![Verdict::Block, Verdict::Monitor]);
        let _ = ctx.into_events();
    }

    #[test]
    fn monitor_only_mode_never_skips_call() {
        let (w1, _) = Scripted::new("w1", Verdict::Block);
        let config = GatewayConfig {
            mode: EnforcementMode::MonitorOnly,
            ..GatewayConfig::default()
        };
        let mut gateway = Gateway::new(config);
        gateway.watch("p", w1).unwrap();
        let gateway = gateway.finalize();
        let ctx = ctx();

        let result = gateway.push("p", &ctx, request(), |_| "served");

        assert_eq!(result.into_value(), Some("served"));
        let events = ctx.into_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].verdict(), Verdict::Block);
    }

    #[test]
    fn disabled_gateway_skips_watchers() {
        let (w1, calls) = Scripted::new("w1", Verdict::Block);
        let config = GatewayConfig {
            enabled: false,
            ..GatewayConfig::default()
        };
        let mut gateway = Gateway::new(config);
        gateway.watch("p", w1).unwrap();
        let gateway = gateway.finalize();

        let result = gateway.push("p", &ctx(), request(), |_| 1);

        assert_eq!(result.value(), Some(&1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_point_names_are_rejected() {
        let mut gateway = Gateway::new(GatewayConfig::default());
        for bad in ["", " padded", "tab\there", "new\nline"] {
            let err = gateway
                .watch(bad, EngineWatcher::request())
                .unwrap_err();
            assert!(
                matches!(err, ConfigurationError::InvalidWatchPointName { .. }),
                "{bad:?} accepted"
            );
        }
        assert_eq!(gateway.points().count(), 0);
    }

    #[test]
    fn duplicate_watcher_on_point_is_rejected() {
        let mut gateway = Gateway::new(GatewayConfig::default());
        gateway.watch("p", EngineWatcher::request()).unwrap();

        let err = gateway.watch("p", EngineWatcher::request()).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateWatcher {
                point: "p".into(),
                watcher: "waf.request".into(),
            }
        );

        // Same watcher name on another point is fine.
        gateway.watch("q", EngineWatcher::request()).unwrap();
        assert_eq!(gateway.points().collect::<Vec<_>>(), vec!["p", "q"]);
    }

    #[test]
    fn watch_point_lookup() {
        let mut gateway = Gateway::new(GatewayConfig::default());
        gateway
            .watch("p", EngineWatcher::request())
            .unwrap()
            .watch("p", EngineWatcher::request().with_name("second"))
            .unwrap();
        let gateway = gateway.finalize();

        let point = gateway.watch_point("p").unwrap();
        assert_eq!(point.name(), "p");
        assert_eq!(point.len(), 2);
        assert_eq!(
            point.watcher_names().collect::<Vec<_>>(),
            vec!["waf.request", "second"]
        );
        assert!(gateway.watch_point("missing").is_none());
    }

    #[test]
    fn finalized_gateway_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Gateway<Finalized>>();
    }

    #[test]
    fn block_without_event_still_blocks() {
        struct Silent;
        impl Watcher for Silent {
            fn name(&self) -> &str {
                "silent"
            }
            fn evaluate(
                &self,
                _: &str,
                _: &SecurityContext,
                _: &dyn ExtractAttributes,
            ) -> WatcherOutcome {
                WatcherOutcome {
                    verdict: Verdict::Block,
                    result: None,
                    block: true,
                    event: None,
                }
            }
        }

        let mut gateway = Gateway::new(GatewayConfig::default());
        gateway.watch("p", Silent).unwrap();
        let gateway = gateway.finalize();

        let result = gateway.push("p", &ctx(), request(), |_| ());
        assert!(result.is_blocked());
        assert!(result.events.is_empty());
    }

    #[test]
    fn subject_comes_from_payload() {
        let (w1, _) = Scripted::new("w1", Verdict::Monitor);
        let mut gateway = Gateway::new(GatewayConfig::default());
        gateway.watch("p", w1).unwrap();
        let gateway = gateway.finalize();
        let ctx = ctx();

        let result = gateway.push(
            "p",
            &ctx,
            HttpRequest::new("req-gw", "POST", "/login"),
            |_| (),
        );

        let (_, event) = &result.events[0];
        assert_eq!(
            event.subject(),
            &Subject::request("req-gw").with_method("POST").with_path("/login")
        );
        let _ = ctx.into_events();
    }
}
