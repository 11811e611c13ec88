//! Header-aware delayed retries

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RetrySettings;
use crate::retry::{
    MAX_RETRY_AFTER, ModelSource, Retry, RetryContext, RetryStrategy, Retryable, parse_retry_after,
};
use crate::traits::Capability;

/// Configuration for [`retry_after_delay`].
#[derive(Debug, Clone)]
pub struct RetryAfterDelay<C: Capability> {
    /// Model to retry; the failing model when `None`.
    pub model: Option<ModelSource<C>>,
    /// Delay used when the error carries no header hint.
    pub delay: Duration,
    /// Growth of `delay` per prior attempt on the model. Ignored for header hints.
    pub backoff_factor: Option<f64>,
    /// Attempt ceiling on the model. Defaults to 3.
    pub max_attempts: u32,
    /// Clamp for header hints.
    pub max_retry_after: Duration,
}

impl<C: Capability> RetryAfterDelay<C> {
    pub fn new(delay: Duration) -> Self {
        Self {
            model: None,
            delay,
            backoff_factor: None,
            max_attempts: 3,
            max_retry_after: MAX_RETRY_AFTER,
        }
    }

    pub fn model(mut self, model: impl Into<ModelSource<C>>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = Some(factor);
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn max_retry_after(mut self, max: Duration) -> Self {
        self.max_retry_after = max;
        self
    }

    /// Take the header-hint clamp from `settings`.
    pub fn settings(self, settings: &RetrySettings) -> Self {
        self.max_retry_after(settings.max_retry_after())
    }
}

struct RetryAfterStrategy<C: Capability> {
    config: RetryAfterDelay<C>,
}

#[async_trait]
impl<C: Capability> RetryStrategy<C> for RetryAfterStrategy<C> {
    async fn retry(&self, context: RetryContext<'_, C>) -> Option<Retry<C>> {
        let error = context.current.error()?;
        if !error.is_retryable() {
            return None;
        }

        let model = match &self.config.model {
            Some(model) => model.clone(),
            None => ModelSource::Instance(Arc::clone(context.current.model())),
        };
        let retry = Retry::new(model).max_attempts(self.config.max_attempts);

        Some(match parse_retry_after(error.response_headers()) {
            Some(hint) => retry
                .delay(hint.min(self.config.max_retry_after))
                .backoff_factor(1.0),
            None => {
                let retry = retry.delay(self.config.delay);
                match self.config.backoff_factor {
                    Some(factor) => retry.backoff_factor(factor),
                    None => retry,
                }
            }
        })
    }
}

/// Retry retryable errors after the server-suggested delay, or after the
/// configured backoff when the error carries no hint.
pub fn retry_after_delay<C: Capability>(config: RetryAfterDelay<C>) -> Retryable<C> {
    Retryable::strategy(RetryAfterStrategy { config })
}
