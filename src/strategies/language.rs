//! Result-inspecting strategies for text generation

use crate::error::LlmError;
use crate::retry::{Attempt, Retry, RetryContext, Retryable};
use crate::traits::LanguageCapability;
use crate::types::{FinishReason, ResponseFormat};

/// Retry when the provider filtered the output, either by finishing with
/// [`FinishReason::ContentFilter`] or by failing with a `content_filter` error code.
pub fn content_filter_triggered(
    template: impl Into<Retry<LanguageCapability>>,
) -> Retryable<LanguageCapability> {
    let template = template.into();
    Retryable::from_fn(move |context: RetryContext<'_, LanguageCapability>| {
        let filtered = match context.current {
            Attempt::Result { result, .. } => result.finish_reason == FinishReason::ContentFilter,
            Attempt::Error { error, .. } => is_content_filter_error(error),
        };
        filtered.then(|| template.clone())
    })
}

fn is_content_filter_error(error: &LlmError) -> bool {
    error
        .details()
        .and_then(|details| details.pointer("/error/code"))
        .and_then(serde_json::Value::as_str)
        == Some("content_filter")
}

/// Retry when JSON output was requested but the text does not parse as JSON.
pub fn schema_mismatch(
    template: impl Into<Retry<LanguageCapability>>,
) -> Retryable<LanguageCapability> {
    let template = template.into();
    Retryable::from_fn(move |context: RetryContext<'_, LanguageCapability>| {
        let Attempt::Result {
            result, options, ..
        } = context.current
        else {
            return None;
        };
        if !matches!(options.response_format, Some(ResponseFormat::Json { .. })) {
            return None;
        }
        let valid = result
            .content_text()
            .is_some_and(|text: String| serde_json::from_str::<serde_json::Value>(&text).is_ok());
        (!valid).then(|| template.clone())
    })
}
