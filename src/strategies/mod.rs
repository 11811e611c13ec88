//! Built-in retry strategies
//!
//! Each constructor takes a directive template (a model, a model name, or a
//! full [`Retry`]) and returns a function strategy that answers with a clone
//! of the template when its condition holds.
//!
//! ```rust,ignore
//! let model = RetryableLanguageModel::builder(primary)
//!     .retry(strategies::service_overloaded(backup.clone()))
//!     .retry(strategies::request_timeout(Retry::new(backup).timeout(Duration::from_secs(10))))
//!     .build()?;
//! ```

mod errors;
mod language;
mod retry_after;

pub use errors::{request_not_retryable, request_timeout, service_overloaded, service_unavailable};
pub use language::{content_filter_triggered, schema_mismatch};
pub use retry_after::{RetryAfterDelay, retry_after_delay};

use crate::error::LlmError;
use crate::retry::{Retry, RetryContext, Retryable};
use crate::traits::Capability;

/// Strategy that answers `template` for error attempts matching `predicate`.
pub(crate) fn when_error<C: Capability>(
    template: Retry<C>,
    predicate: fn(&LlmError) -> bool,
) -> Retryable<C> {
    Retryable::from_fn(move |context: RetryContext<'_, C>| {
        context
            .current
            .error()
            .filter(|error| predicate(error))
            .map(|_| template.clone())
    })
}
