//! Error-classifying strategies

use super::when_error;
use crate::error::LlmError;
use crate::retry::{Retry, Retryable};
use crate::traits::Capability;

/// Retry when the attempt timed out.
pub fn request_timeout<C: Capability>(template: impl Into<Retry<C>>) -> Retryable<C> {
    when_error(template.into(), |error| {
        matches!(error, LlmError::TimeoutError(_))
    })
}

/// Retry when the provider reports a non-transient failure, typically to
/// switch to a model that accepts the request.
pub fn request_not_retryable<C: Capability>(template: impl Into<Retry<C>>) -> Retryable<C> {
    when_error(template.into(), |error| {
        !error.is_retryable() && !error.is_user_cancellation()
    })
}

/// Retry on HTTP 529 or an "overloaded" error message.
pub fn service_overloaded<C: Capability>(template: impl Into<Retry<C>>) -> Retryable<C> {
    when_error(template.into(), |error| {
        error.status_code() == Some(529) || error.to_string().to_lowercase().contains("overloaded")
    })
}

/// Retry on HTTP 503.
pub fn service_unavailable<C: Capability>(template: impl Into<Retry<C>>) -> Retryable<C> {
    when_error(template.into(), |error| error.status_code() == Some(503))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mock::MockLanguageModel;
    use crate::retry::{Attempt, RetryContext};
    use crate::traits::{LanguageCapability, LanguageModel};
    use crate::types::{GenerateResult, LanguageModelCallOptions};

    type L = LanguageCapability;

    fn backup() -> Arc<MockLanguageModel> {
        Arc::new(MockLanguageModel::new("mock", "backup"))
    }

    async fn answers(strategy: &Retryable<L>, error: LlmError) -> bool {
        let model: Arc<dyn LanguageModel> = Arc::new(MockLanguageModel::new("mock", "a"));
        let attempt = Attempt::Error {
            error,
            model,
            options: LanguageModelCallOptions::from_text("hi"),
        };
        let attempts = [attempt.clone()];
        strategy
            .candidate(RetryContext {
                current: &attempt,
                attempts: &attempts,
            })
            .await
            .is_some()
    }

    #[tokio::test]
    async fn request_timeout_matches_timeouts_only() {
        let strategy = request_timeout::<L>(backup());
        assert!(answers(&strategy, LlmError::TimeoutError("slow".into())).await);
        assert!(!answers(&strategy, LlmError::api_error(500, "boom")).await);
        assert!(!answers(&strategy, LlmError::Aborted("user".into())).await);
    }

    #[tokio::test]
    async fn request_not_retryable_skips_transient_and_cancelled() {
        let strategy = request_not_retryable::<L>(backup());
        assert!(answers(&strategy, LlmError::api_error(400, "bad")).await);
        assert!(answers(&strategy, LlmError::InvalidInput("bad".into())).await);
        assert!(!answers(&strategy, LlmError::api_error(500, "boom")).await);
        assert!(!answers(&strategy, LlmError::Aborted("user".into())).await);
    }

    #[tokio::test]
    async fn service_errors_match_status_and_message() {
        let overloaded = service_overloaded::<L>(backup());
        assert!(answers(&overloaded, LlmError::api_error(529, "busy")).await);
        assert!(answers(&overloaded, LlmError::api_error(500, "Overloaded")).await);
        assert!(!answers(&overloaded, LlmError::api_error(503, "down")).await);

        let unavailable = service_unavailable::<L>(backup());
        assert!(answers(&unavailable, LlmError::api_error(503, "down")).await);
        assert!(!answers(&unavailable, LlmError::api_error(529, "busy")).await);
    }

    #[tokio::test]
    async fn error_strategies_ignore_results() {
        let strategy = request_not_retryable::<L>(backup());
        let model: Arc<dyn LanguageModel> = Arc::new(MockLanguageModel::new("mock", "a"));
        let attempt = Attempt::Result {
            result: GenerateResult::text("fine"),
            model,
            options: LanguageModelCallOptions::from_text("hi"),
        };
        let attempts = [attempt.clone()];
        let context = RetryContext {
            current: &attempt,
            attempts: &attempts,
        };
        assert!(strategy.candidate(context).await.is_none());
    }
}
