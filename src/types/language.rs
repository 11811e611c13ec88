//! Text generation request and response types

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::common::{ProviderOptions, ResponseMetadata, Usage, Warning};
use crate::traits::ModelCallOptions;
use crate::utils::cancel::AbortSignal;

/// Message role in a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single prompt message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Requested output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseFormat {
    Text,
    Json {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// Tool exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Options for a single `do_generate` / `do_stream` call.
#[derive(Debug, Clone, Default)]
pub struct LanguageModelCallOptions {
    pub prompt: Vec<PromptMessage>,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub stop_sequences: Option<Vec<String>>,
    pub seed: Option<u64>,
    pub response_format: Option<ResponseFormat>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub headers: Option<HashMap<String, String>>,
    pub provider_options: Option<ProviderOptions>,
    pub abort_signal: Option<AbortSignal>,
}

impl LanguageModelCallOptions {
    pub fn new(prompt: Vec<PromptMessage>) -> Self {
        Self {
            prompt,
            ..Default::default()
        }
    }

    /// Single user message prompt.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![PromptMessage::user(text)])
    }

    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = Some(signal);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn with_provider_options(mut self, options: ProviderOptions) -> Self {
        self.provider_options = Some(options);
        self
    }
}

/// Field-by-field overrides applied on top of the caller's options for a retry.
#[derive(Debug, Clone, Default)]
pub struct LanguageModelCallOverrides {
    pub prompt: Option<Vec<PromptMessage>>,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub stop_sequences: Option<Vec<String>>,
    pub seed: Option<u64>,
    pub response_format: Option<ResponseFormat>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub headers: Option<HashMap<String, String>>,
    pub provider_options: Option<ProviderOptions>,
}

impl ModelCallOptions for LanguageModelCallOptions {
    type Overrides = LanguageModelCallOverrides;

    fn apply_overrides(&mut self, overrides: &Self::Overrides) {
        if let Some(prompt) = &overrides.prompt {
            self.prompt = prompt.clone();
        }
        override_fields!(self, overrides;
            max_output_tokens,
            temperature,
            top_p,
            top_k,
            presence_penalty,
            frequency_penalty,
            stop_sequences,
            seed,
            response_format,
            tools,
            headers,
            provider_options,
        );
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

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other,
    Unknown,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content-filter",
            Self::ToolCalls => "tool-calls",
            Self::Error => "error",
            Self::Other => "other",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A piece of generated content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: String,
    },
    File {
        media_type: String,
        data: String,
    },
}

/// Result of a non-streaming generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResult {
    pub content: Vec<ContentPart>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseMetadata>,
}

impl GenerateResult {
    /// A plain text result finishing with `stop`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::Text { text: text.into() }],
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            warnings: Vec::new(),
            provider_metadata: None,
            response: None,
        }
    }

    pub fn with_finish_reason(mut self, finish_reason: FinishReason) -> Self {
        self.finish_reason = finish_reason;
        self
    }

    /// Concatenated text parts, if any.
    pub fn content_text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_touch_set_fields() {
        let mut options = LanguageModelCallOptions::from_text("hi").with_temperature(0.2);
        options.seed = Some(7);

        let overrides = LanguageModelCallOverrides {
            temperature: Some(0.9),
            max_output_tokens: Some(64),
            ..Default::default()
        };
        options.apply_overrides(&overrides);

        assert_eq!(options.temperature, Some(0.9));
        assert_eq!(options.max_output_tokens, Some(64));
        assert_eq!(options.seed, Some(7));
        assert_eq!(options.prompt, vec![PromptMessage::user("hi")]);
    }

    #[test]
    fn content_text_joins_text_parts() {
        let mut result = GenerateResult::text("hello ");
        result.content.push(ContentPart::Reasoning {
            text: "hidden".into(),
        });
        result.content.push(ContentPart::Text {
            text: "world".into(),
        });
        assert_eq!(result.content_text().as_deref(), Some("hello world"));
    }

    #[test]
    fn finish_reason_serializes_kebab_case() {
        let json = serde_json::to_string(&FinishReason::ContentFilter).unwrap();
        assert_eq!(json, "\"content-filter\"");
        assert_eq!(FinishReason::ToolCalls.to_string(), "tool-calls");
    }
}
