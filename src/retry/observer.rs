//! Retry observers
//!
//! Observers are notified after a failed attempt has been recorded
//! (`on_error`) and right before the next attempt starts (`on_retry`). The
//! hooks are synchronous and best-effort; they cannot change the loop.

use std::sync::Arc;

use super::directive::RetryContext;
use crate::traits::{Capability, ModelRef};

/// Observer of retry loop events.
pub trait RetryObserver<C: Capability>: Send + Sync {
    /// A failed attempt was appended to the ledger. `context.current` is that attempt.
    fn on_error(&self, _context: &RetryContext<'_, C>) {}

    /// Another attempt is about to start. `context.current` is the previous
    /// attempt relabeled with the model about to be called.
    fn on_retry(&self, _context: &RetryContext<'_, C>) {}
}

type Callback<C> = Arc<dyn for<'a> Fn(&RetryContext<'a, C>) + Send + Sync>;

/// Observer built from the builder's `on_error` / `on_retry` closures.
pub struct CallbackObserver<C: Capability> {
    on_error: Option<Callback<C>>,
    on_retry: Option<Callback<C>>,
}

impl<C: Capability> Default for CallbackObserver<C> {
    fn default() -> Self {
        Self {
            on_error: None,
            on_retry: None,
        }
    }
}

impl<C: Capability> CallbackObserver<C> {
    pub fn on_error<F>(f: F) -> Self
    where
        F: for<'a> Fn(&RetryContext<'a, C>) + Send + Sync + 'static,
    {
        Self {
            on_error: Some(Arc::new(f)),
            on_retry: None,
        }
    }

    pub fn on_retry<F>(f: F) -> Self
    where
        F: for<'a> Fn(&RetryContext<'a, C>) + Send + Sync + 'static,
    {
        Self {
            on_error: None,
            on_retry: Some(Arc::new(f)),
        }
    }
}

impl<C: Capability> RetryObserver<C> for CallbackObserver<C> {
    fn on_error(&self, context: &RetryContext<'_, C>) {
        if let Some(callback) = &self.on_error {
            callback(context);
        }
    }

    fn on_retry(&self, context: &RetryContext<'_, C>) {
        if let Some(callback) = &self.on_retry {
            callback(context);
        }
    }
}

/// Logs observer events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl<C: Capability> RetryObserver<C> for TracingObserver {
    fn on_error(&self, context: &RetryContext<'_, C>) {
        let model = context.current.model().key();
        match context.current.error() {
            Some(error) => tracing::debug!(
                target: "siumai_fallback::retry",
                capability = C::NAME,
                model = %model,
                attempt = context.attempts.len(),
                err = %error,
                "attempt failed"
            ),
            None => tracing::debug!(
                target: "siumai_fallback::retry",
                capability = C::NAME,
                model = %model,
                attempt = context.attempts.len(),
                "attempt result rejected"
            ),
        }
    }

    fn on_retry(&self, context: &RetryContext<'_, C>) {
        tracing::debug!(
            target: "siumai_fallback::retry",
            capability = C::NAME,
            model = %context.current.model().key(),
            attempt = context.attempts.len() + 1,
            "retrying"
        );
    }
}

/// Fan out one event to every observer, in registration order.
pub(crate) fn notify_error<C: Capability>(
    observers: &[Arc<dyn RetryObserver<C>>],
    context: &RetryContext<'_, C>,
) {
    for observer in observers {
        observer.on_error(context);
    }
}

pub(crate) fn notify_retry<C: Capability>(
    observers: &[Arc<dyn RetryObserver<C>>],
    context: &RetryContext<'_, C>,
) {
    for observer in observers {
        observer.on_retry(context);
    }
}
