//! Image generation request and response types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::common::{ProviderOptions, ResponseMetadata, Warning};
use crate::traits::ModelCallOptions;
use crate::utils::cancel::AbortSignal;

/// Options for a single image `do_generate` call.
#[derive(Debug, Clone)]
pub struct ImageCallOptions {
    pub prompt: String,
    pub n: u32,
    pub size: Option<String>,
    pub aspect_ratio: Option<String>,
    pub seed: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
    pub provider_options: Option<ProviderOptions>,
    pub abort_signal: Option<AbortSignal>,
}

impl Default for ImageCallOptions {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            n: 1,
            size: None,
            aspect_ratio: None,
            seed: None,
            headers: None,
            provider_options: None,
            abort_signal: None,
        }
    }
}

impl ImageCallOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = Some(signal);
        self
    }
}

/// Retry overrides for image calls.
#[derive(Debug, Clone, Default)]
pub struct ImageCallOverrides {
    pub prompt: Option<String>,
    pub n: Option<u32>,
    pub size: Option<String>,
    pub aspect_ratio: Option<String>,
    pub seed: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
    pub provider_options: Option<ProviderOptions>,
}

impl ModelCallOptions for ImageCallOptions {
    type Overrides = ImageCallOverrides;

    fn apply_overrides(&mut self, overrides: &Self::Overrides) {
        if let Some(prompt) = &overrides.prompt {
            self.prompt = prompt.clone();
        }
        if let Some(n) = overrides.n {
            self.n = n;
        }
        override_fields!(self, overrides; size, aspect_ratio, seed, headers, provider_options);
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

/// Result of an image `do_generate`. Images are base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub images: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseMetadata>,
}

impl ImageResult {
    pub fn new(images: Vec<String>) -> Self {
        Self {
            images,
            warnings: Vec::new(),
            provider_metadata: None,
            response: None,
        }
    }
}
