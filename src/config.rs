//! Retry settings
//!
//! Serializable knobs that can live in an application config file and be
//! applied to a builder with [`RetryableModelBuilder::settings`](crate::RetryableModelBuilder::settings).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::retry::{MAX_RETRY_AFTER, ResetPolicy};

/// Deserializable retry configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Bypass the retry loop entirely.
    pub disabled: bool,
    /// Sticky reset policy, e.g. `"after-2-requests"` or `"after-30-seconds"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<String>,
    /// Upper bound for `retry-after` header hints, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry_after_ms: Option<u64>,
}

impl RetrySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, LlmError> {
        serde_json::from_str(json)
            .map_err(|e| LlmError::ConfigurationError(format!("invalid retry settings: {e}")))
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_reset(mut self, reset: impl Into<String>) -> Self {
        self.reset = Some(reset.into());
        self
    }

    pub fn with_max_retry_after_ms(mut self, ms: u64) -> Self {
        self.max_retry_after_ms = Some(ms);
        self
    }

    /// The parsed reset policy, if one is configured.
    pub fn reset_policy(&self) -> Result<Option<ResetPolicy>, LlmError> {
        self.reset.as_deref().map(str::parse::<ResetPolicy>).transpose()
    }

    /// Clamp for header hints; [`MAX_RETRY_AFTER`] unless overridden.
    pub fn max_retry_after(&self) -> Duration {
        self.max_retry_after_ms
            .map(Duration::from_millis)
            .unwrap_or(MAX_RETRY_AFTER)
    }
}
