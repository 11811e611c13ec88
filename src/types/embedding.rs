//! Embedding request and response types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::common::{ProviderOptions, ResponseMetadata};
use crate::traits::ModelCallOptions;
use crate::utils::cancel::AbortSignal;

/// Options for a single `do_embed` call.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCallOptions {
    pub values: Vec<String>,
    pub headers: Option<HashMap<String, String>>,
    pub provider_options: Option<ProviderOptions>,
    pub abort_signal: Option<AbortSignal>,
}

impl EmbeddingCallOptions {
    pub fn new(values: Vec<String>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = Some(signal);
        self
    }
}

/// Retry overrides for embedding calls.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCallOverrides {
    pub values: Option<Vec<String>>,
    pub headers: Option<HashMap<String, String>>,
    pub provider_options: Option<ProviderOptions>,
}

impl ModelCallOptions for EmbeddingCallOptions {
    type Overrides = EmbeddingCallOverrides;

    fn apply_overrides(&mut self, overrides: &Self::Overrides) {
        if let Some(values) = &overrides.values {
            self.values = values.clone();
        }
        override_fields!(self, overrides; headers, provider_options);
    }

    fn set_provider_options(&mut self, provider_options: ProviderOptions) {
        self.provider_options = Some(provider_options);
    }

    fn abort_signal(&self) -> Option<&AbortSignal> {
        self.abort_signal.as_ref()
    }

    fn set_abort_signal(&mut self, signal: Option<AbortSignal>) {
        self.abort_signal = signal;
    }
}

/// Embedding token usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    pub tokens: u32,
}

/// Result of `do_embed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<EmbeddingUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseMetadata>,
}

impl EmbeddingResult {
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        Self {
            embeddings,
            usage: None,
            provider_metadata: None,
            response: None,
        }
    }
}
