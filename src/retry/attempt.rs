//! Attempt history for one logical request

use std::sync::Arc;

use crate::error::{AttemptFailure, LlmError, RetryError};
use crate::traits::{Capability, ModelRef};
use crate::types::{FinishReason, ModelKey};

/// One executed call against a model.
pub enum Attempt<C: Capability> {
    /// The call failed.
    Error {
        error: LlmError,
        model: Arc<C::Model>,
        options: C::Options,
    },
    /// The call succeeded and its result was offered to the strategies.
    Result {
        result: C::Result,
        model: Arc<C::Model>,
        options: C::Options,
    },
}

impl<C: Capability> Clone for Attempt<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Error {
                error,
                model,
                options,
            } => Self::Error {
                error: error.clone(),
                model: Arc::clone(model),
                options: options.clone(),
            },
            Self::Result {
                result,
                model,
                options,
            } => Self::Result {
                result: result.clone(),
                model: Arc::clone(model),
                options: options.clone(),
            },
        }
    }
}

impl<C: Capability> std::fmt::Debug for Attempt<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error { error, model, .. } => f
                .debug_struct("Attempt::Error")
                .field("model", &model.key())
                .field("error", error)
                .finish_non_exhaustive(),
            Self::Result { result, model, .. } => f
                .debug_struct("Attempt::Result")
                .field("model", &model.key())
                .field("result", result)
                .finish_non_exhaustive(),
        }
    }
}

impl<C: Capability> Attempt<C> {
    pub fn model(&self) -> &Arc<C::Model> {
        match self {
            Self::Error { model, .. } | Self::Result { model, .. } => model,
        }
    }

    pub fn options(&self) -> &C::Options {
        match self {
            Self::Error { options, .. } | Self::Result { options, .. } => options,
        }
    }

    pub fn error(&self) -> Option<&LlmError> {
        match self {
            Self::Error { error, .. } => Some(error),
            Self::Result { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&C::Result> {
        match self {
            Self::Result { result, .. } => Some(result),
            Self::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result { .. })
    }

    /// Copy of this attempt attributed to `model`.
    ///
    /// Used to tell observers which model the next call goes to; the ledger
    /// entry itself is never changed.
    pub fn relabeled(&self, model: Arc<C::Model>) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            Self::Error { model: m, .. } | Self::Result { model: m, .. } => *m = model,
        }
        copy
    }
}

impl<C: Capability> From<&Attempt<C>> for AttemptFailure {
    fn from(attempt: &Attempt<C>) -> Self {
        let model = attempt.model().key();
        match attempt {
            Attempt::Error { error, .. } => AttemptFailure::Error {
                model,
                error: error.clone(),
            },
            Attempt::Result { result, .. } => AttemptFailure::Result {
                model,
                finish_reason: C::finish_reason(result).unwrap_or(FinishReason::Unknown),
            },
        }
    }
}

/// Append-only, ordered attempt history for one logical request.
pub struct AttemptLedger<C: Capability> {
    attempts: Vec<Attempt<C>>,
}

impl<C: Capability> Default for AttemptLedger<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Capability> std::fmt::Debug for AttemptLedger<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.attempts).finish()
    }
}

impl<C: Capability> AttemptLedger<C> {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn push(&mut self, attempt: Attempt<C>) {
        self.attempts.push(attempt);
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn last(&self) -> Option<&Attempt<C>> {
        self.attempts.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attempt<C>> {
        self.attempts.iter()
    }

    pub fn as_slice(&self) -> &[Attempt<C>] {
        &self.attempts
    }

    /// Number of recorded attempts against the model identified by `key`.
    pub fn count_for(&self, key: &ModelKey) -> u32 {
        let count = self
            .attempts
            .iter()
            .filter(|attempt| {
                let model = attempt.model();
                model.provider_id() == key.provider && model.model_id() == key.model
            })
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Build the composite exhaustion error, ending with `last`.
    pub fn exhausted(&self, last: &LlmError) -> RetryError {
        RetryError {
            attempts: self.attempts.len(),
            message: last.to_string(),
            errors: self.attempts.iter().map(AttemptFailure::from).collect(),
        }
    }
}
