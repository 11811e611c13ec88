//! Streaming generation types

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use super::common::{ResponseMetadata, Usage, Warning};
use super::language::FinishReason;
use crate::error::LlmError;

/// A part emitted by a streaming generation.
#[derive(Debug, Clone)]
pub enum StreamPart {
    /// First part of a stream, carries call warnings.
    StreamStart { warnings: Vec<Warning> },
    /// Provider response metadata (id, model, timestamp).
    ResponseMetadata(ResponseMetadata),
    TextStart { id: String },
    TextDelta { id: String, delta: String },
    TextEnd { id: String },
    ReasoningDelta { id: String, delta: String },
    ToolInputDelta { id: String, delta: String },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: String,
    },
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
    },
    /// Terminal error reported in-band by the provider.
    Error { error: LlmError },
    /// Raw provider chunk, forwarded untouched.
    Raw(serde_json::Value),
}

impl StreamPart {
    /// Shorthand for a text delta.
    pub fn text_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::TextDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    pub fn finish(finish_reason: FinishReason) -> Self {
        Self::Finish {
            finish_reason,
            usage: Usage::default(),
        }
    }

    /// Whether forwarding this part means the consumer has observed output.
    ///
    /// Once a content part has been forwarded the stream can no longer be
    /// replayed on another model.
    pub fn is_content(&self) -> bool {
        !matches!(
            self,
            Self::StreamStart { .. } | Self::ResponseMetadata(_) | Self::Raw(_) | Self::Error { .. }
        )
    }
}

/// Stream of generation parts.
pub type PartStream = Pin<Box<dyn Stream<Item = Result<StreamPart, LlmError>> + Send>>;

/// Request metadata echoed by a streaming call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// Result of `do_stream`.
pub struct StreamResult {
    pub stream: PartStream,
    pub request: Option<RequestMetadata>,
    pub response: Option<ResponseMetadata>,
}

impl StreamResult {
    pub fn new(stream: PartStream) -> Self {
        Self {
            stream,
            request: None,
            response: None,
        }
    }
}

impl std::fmt::Debug for StreamResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResult")
            .field("request", &self.request)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_parts_are_not_content() {
        assert!(!StreamPart::StreamStart { warnings: vec![] }.is_content());
        assert!(!StreamPart::ResponseMetadata(ResponseMetadata::default()).is_content());
        assert!(!StreamPart::Raw(serde_json::json!({})).is_content());
        assert!(
            !StreamPart::Error {
                error: LlmError::StreamError("x".into())
            }
            .is_content()
        );
        assert!(StreamPart::text_delta("0", "hi").is_content());
        assert!(StreamPart::TextStart { id: "0".into() }.is_content());
        assert!(StreamPart::finish(FinishReason::Stop).is_content());
    }
}
