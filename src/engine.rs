//! Detection engine seam.
//!
//! The engine's rule language and matching live outside this crate. All the
//! gateway needs is a per-request [`EngineSession`] that turns normalized
//! [`Attributes`] into a [`Detection`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::Attributes;
use crate::error::EngineEvaluationError;
use crate::verdict::Verdict;

/// Engine-specific match payload (triggered rules, highlighted values, ...).
///
/// The gateway never inspects it; it is carried on events for export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchResult(Value);

impl MatchResult {
    /// Wraps an engine payload.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// An empty payload.
    pub fn empty() -> Self {
        Self(Value::Null)
    }

    /// Borrow the raw payload.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwrap the raw payload.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// True if the engine attached nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }
}

impl From<Value> for MatchResult {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// What an engine decided for one set of attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Engine verdict
    pub verdict: Verdict,
    /// Opaque match payload
    pub result: MatchResult,
}

impl Detection {
    /// Nothing matched.
    pub fn pass() -> Self {
        Self {
            verdict: Verdict::Ok,
            result: MatchResult::empty(),
        }
    }

    /// A match that should be recorded but not blocked.
    pub fn monitor(result: impl Into<MatchResult>) -> Self {
        Self {
            verdict: Verdict::Monitor,
            result: result.into(),
        }
    }

    /// A match that should block.
    pub fn block(result: impl Into<MatchResult>) -> Self {
        Self {
            verdict: Verdict::Block,
            result: result.into(),
        }
    }
}

/// Per-request engine state.
///
/// Engines are expected to be fast, local and synchronous. An evaluation
/// error never blocks traffic: the calling watcher logs it and fails open.
///
/// Any `FnMut(&Attributes) -> Result<Detection, EngineEvaluationError>`
/// closure is a session, which keeps test doubles short:
///
/// ```
/// use appsec_gateway::{Attributes, Detection, EngineEvaluationError, EngineSession, Verdict};
///
/// let mut session = |attrs: &Attributes| -> Result<Detection, EngineEvaluationError> {
///     Ok(if attrs.path() == Some("/admin") {
///         Detection::monitor(serde_json::json!({"rule": "admin-path"}))
///     } else {
///         Detection::pass()
///     })
/// };
///
/// let detection = session
///     .evaluate(&Attributes::new().with_uri("/admin"))
///     .unwrap();
/// assert_eq!(detection.verdict, Verdict::Monitor);
/// ```
pub trait EngineSession: Send {
    /// Evaluates one attribute set.
    ///
    /// # Errors
    ///
    /// Returns `EngineEvaluationError` if the engine could not evaluate.
    fn evaluate(&mut self, attributes: &Attributes) -> Result<Detection, EngineEvaluationError>;
}

impl<F> EngineSession for F
where
    F: FnMut(&Attributes) -> Result<Detection, EngineEvaluationError> + Send,
{
    fn evaluate(&mut self, attributes: &Attributes) -> Result<Detection, EngineEvaluationError> {
        self(attributes)
    }
}

impl fmt::Debug for dyn EngineSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EngineSession")
    }
}

/// Process-wide engine handle that opens one session per request.
pub trait DetectionEngine: Send + Sync {
    /// Opens a session for a new request.
    fn new_session(&self) -> Box<dyn EngineSession>;
}
