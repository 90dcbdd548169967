//! Verifier configuration.
//!
//! A `VerifierConfig` is plain serde data so it can live next to the test
//! fixtures that use it:
//!
//! ```text
//! {
//!   "label": "class browser",
//!   "comparison": "sequence",
//!   "verify_on_change": true,
//!   "on_mismatch": "record"
//! }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How replayed contents are compared with live contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Same elements with the same multiplicities, in any order.
    #[default]
    Multiset,
    /// Same elements in the same positions.
    Sequence,
}

/// What happens when a notification leaves the shadow list out of sync.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Panic from inside the notification, failing the enclosing test.
    #[default]
    Panic,
    /// Keep the mismatch for later inspection.
    Record,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Shown in log lines and mismatch reports
    pub label: Option<String>,

    pub comparison: ComparisonMode,

    /// Re-check after every notification
    pub verify_on_change: bool,

    pub on_mismatch: MismatchPolicy,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            label: None,
            comparison: ComparisonMode::Multiset,
            verify_on_change: true,
            on_mismatch: MismatchPolicy::Panic,
        }
    }
}

impl VerifierConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        log::debug!("Loaded verifier config from {}", path.display());
        Ok(config)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_comparison(mut self, comparison: ComparisonMode) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn with_policy(mut self, policy: MismatchPolicy) -> Self {
        self.on_mismatch = policy;
        self
    }

    pub fn with_verify_on_change(mut self, enabled: bool) -> Self {
        self.verify_on_change = enabled;
        self
    }

    /// Label used in log lines.
    pub(crate) fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or("collection")
    }
}
