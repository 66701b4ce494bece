//! Gateway configuration.
//!
//! [`GatewayConfig`] controls whether dispatch runs at all, whether block
//! verdicts are enforced, and how a watcher chain resolves blocks.
//!
//! # Loading order
//! 1. [`GatewayConfig::parse`] reads TOML; missing keys take their defaults.
//! 2. [`GatewayConfig::apply_env_overrides`] then applies `APPSEC_ENABLED`,
//!    `APPSEC_MODE` and `APPSEC_CHAIN_POLICY` on top.
//!
//! ```
//! use appsec_gateway::{ChainPolicy, EnforcementMode, GatewayConfig};
//!
//! let config = GatewayConfig::parse("mode = \"monitor_only\"").unwrap();
//! assert!(config.enabled);
//! assert_eq!(config.mode, EnforcementMode::MonitorOnly);
//! assert_eq!(config.chain_policy, ChainPolicy::FirstBlockWins);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigurationError;

/// Whether block verdicts are acted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// A block verdict skips the wrapped work
    #[default]
    Enforce,
    /// Block verdicts are recorded but never skip the wrapped work
    MonitorOnly,
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enforce => write!(f, "enforce"),
            Self::MonitorOnly => write!(f, "monitor_only"),
        }
    }
}

impl FromStr for EnforcementMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" => Ok(Self::Enforce),
            "monitor_only" | "monitor-only" | "monitor" => Ok(Self::MonitorOnly),
            other => Err(ConfigurationError::InvalidValue {
                field: "mode".to_owned(),
                reason: format!("unknown enforcement mode '{other}'"),
            }),
        }
    }
}

/// How a watcher chain resolves a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPolicy {
    /// The first blocking watcher ends the chain; later watchers never run
    #[default]
    FirstBlockWins,
    /// Every watcher runs; the push blocks if any of them blocked
    EvaluateAll,
}

impl fmt::Display for ChainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstBlockWins => write!(f, "first_block_wins"),
            Self::EvaluateAll => write!(f, "evaluate_all"),
        }
    }
}

impl FromStr for ChainPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_block_wins" | "first-block-wins" => Ok(Self::FirstBlockWins),
            "evaluate_all" | "evaluate-all" => Ok(Self::EvaluateAll),
            other => Err(ConfigurationError::InvalidValue {
                field: "chain_policy".to_owned(),
                reason: format!("unknown chain policy '{other}'"),
            }),
        }
    }
}

/// Gateway settings, fixed for the lifetime of a finalized gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// When false every push passes straight through to the wrapped work
    pub enabled: bool,
    /// Enforcement of block verdicts
    pub mode: EnforcementMode,
    /// Block resolution within one watcher chain
    pub chain_policy: ChainPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: EnforcementMode::default(),
            chain_policy: ChainPolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Parses configuration from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Parse`] on malformed TOML or unknown values.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(toml_str).map_err(|e| ConfigurationError::Parse {
            reason: e.to_string(),
        })
    }

    /// Applies `APPSEC_*` environment overrides.
    ///
    /// Values that do not parse are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        override_parsed(&mut self.enabled, "APPSEC_ENABLED");
        override_parsed(&mut self.mode, "APPSEC_MODE");
        override_parsed(&mut self.chain_policy, "APPSEC_CHAIN_POLICY");
    }

    /// True if block verdicts skip the wrapped work.
    pub fn enforces_blocks(&self) -> bool {
        self.mode == EnforcementMode::Enforce
    }
}

fn override_parsed<T>(target: &mut T, env_key: &str)
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(e) => warn!(
                env_key,
                value = val.as_str(),
                error = %e,
                "failed to parse env override, ignoring"
            ),
        }
    }
}
