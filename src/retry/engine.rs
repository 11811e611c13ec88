//! Strategy selection
//!
//! Given the attempt that just finished, walk the strategy list in priority
//! order and return the first directive whose model still has attempts left.

use std::sync::Arc;

use super::attempt::{Attempt, AttemptLedger};
use super::directive::{ModelSource, Retry, RetryContext, Retryable};
use crate::error::LlmError;
use crate::registry::ModelResolver;
use crate::traits::{Capability, ModelRef};

/// A directive whose model has been resolved and passed its attempt ceiling.
pub struct SelectedRetry<C: Capability> {
    pub model: Arc<C::Model>,
    /// The directive, with `model` replaced by the resolved instance.
    pub retry: Retry<C>,
}

impl<C: Capability> std::fmt::Debug for SelectedRetry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedRetry")
            .field("model", &self.model.key())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Pick the next directive for `current`, or `None` when every strategy is
/// exhausted or declines.
///
/// Result attempts are only offered to function strategies. A candidate model
/// that cannot be resolved is an error, not a skip.
pub async fn find_retry<C: Capability>(
    retryables: &[Retryable<C>],
    ledger: &AttemptLedger<C>,
    current: &Attempt<C>,
    resolver: Option<&dyn ModelResolver<C>>,
) -> Result<Option<SelectedRetry<C>>, LlmError> {
    let context = RetryContext {
        current,
        attempts: ledger.as_slice(),
    };

    for retryable in retryables {
        if current.is_result() && !retryable.inspects_results() {
            continue;
        }

        let Some(mut retry) = retryable.candidate(context).await else {
            continue;
        };

        let model = retry.model.resolve(resolver)?;
        let key = model.key();
        let used = ledger.count_for(&key);
        if used >= retry.attempt_ceiling() {
            tracing::trace!(
                model = %key,
                used,
                max_attempts = retry.attempt_ceiling(),
                "retry candidate exhausted"
            );
            continue;
        }

        retry.model = ModelSource::Instance(Arc::clone(&model));
        return Ok(Some(SelectedRetry { model, retry }));
    }

    Ok(None)
}
