//! Error taxonomy for the gateway.
//!
//! Only [`ConfigurationError`] is meant to reach host code, and only during
//! startup. [`EngineEvaluationError`] is absorbed at the watcher boundary and
//! [`ProtocolError`] signals a programming error in dispatch code.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Registry or configuration misuse
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Reactive dispatch contract violated
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Detection engine failure
    #[error("engine evaluation error: {0}")]
    Engine(#[from] EngineEvaluationError),
}

/// Invalid registration or configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Watch point names must be non-empty and free of control characters
    #[error("invalid watch point name '{name}': {reason}")]
    InvalidWatchPointName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// A watcher with the same name is already registered on this point
    #[error("watcher '{watcher}' is already registered on '{point}'")]
    DuplicateWatcher {
        /// Watch point name
        point: String,
        /// Watcher name
        watcher: String,
    },

    /// Configuration source could not be parsed
    #[error("failed to parse config: {reason}")]
    Parse {
        /// Parser message
        reason: String,
    },

    /// A configuration value is out of range or inconsistent
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Violation of the single-shot operation contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// `publish` was called on an operation that has already been published
    #[error("operation '{operation}' was already published")]
    AlreadyPublished {
        /// Operation name
        operation: String,
    },

    /// A subscription was registered with no topics
    #[error("operation '{operation}': subscription has an empty topic filter")]
    EmptyTopicFilter {
        /// Operation name
        operation: String,
    },
}

/// Detection engine call failed.
///
/// Never alters host control flow: watchers log it and fail open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineEvaluationError {
    /// The engine reported an error
    #[error("detection failed: {0}")]
    Failed(String),

    /// The engine panicked during evaluation
    #[error("detection panicked: {0}")]
    Panicked(String),
}

impl EngineEvaluationError {
    /// Creates a `Failed` error from any message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
