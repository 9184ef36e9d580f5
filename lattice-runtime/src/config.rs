//! Runtime configuration.
//!
//! The defaults match what a UI runtime wants in practice; hosts that need
//! different limits load a [`RuntimeConfig`] (for example from JSON) and
//! install it on the thread that drives the scheduler with
//! [`crate::scheduler::configure`].

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Limits applied by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many times a single job may run within one flush before the
    /// flush is aborted with [`crate::RuntimeError::RecursionLimit`].
    pub recursion_limit: usize,

    /// How many flush cycles [`crate::scheduler::flush_all`] performs before
    /// giving up with [`crate::RuntimeError::FlushLimit`].
    pub max_flush_cycles: usize,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 100,
            max_flush_cycles: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "recursion_limit": 5 }"#).unwrap();
        assert_eq!(config.recursion_limit, 5);
        assert_eq!(config.max_flush_cycles, 1000);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = RuntimeConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, crate::RuntimeError::Config(_)));
    }
}
