//! The attempt loop
//!
//! One [`RetryRun`] drives one logical call: it owns the attempt ledger and
//! moves through [`LoopState`] until the call is done or has failed. The same
//! loop serves every capability; the capability-specific call is passed in
//! as a closure returning a boxed future.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use uuid::Uuid;

use super::attempt::{Attempt, AttemptLedger};
use super::backoff::backoff_delay;
use super::directive::RetryContext;
use super::engine::{SelectedRetry, find_retry};
use super::observer::{notify_error, notify_retry};
use crate::error::LlmError;
use crate::retryable::RetryCore;
use crate::traits::{Capability, ModelCallOptions, ModelRef};
use crate::utils::cancel::{AbortSignal, SignalOrigin};

/// Performs one underlying call.
pub type CallFn<C, T> = Arc<
    dyn Fn(
            Arc<<C as Capability>::Model>,
            <C as Capability>::Options,
        ) -> BoxFuture<'static, Result<T, LlmError>>
        + Send
        + Sync,
>;

/// Extracts the inspectable result from a call's output.
pub type InspectFn<C, T> = fn(&T) -> <C as Capability>::Result;

/// The successful end of a run.
pub struct Completion<C: Capability, T> {
    pub output: T,
    /// The model that produced `output`.
    pub model: Arc<C::Model>,
    /// The options `output` was produced with.
    pub options: C::Options,
}

/// States of the attempt loop.
pub enum LoopState<C: Capability, T> {
    Attempting {
        model: Arc<C::Model>,
        options: C::Options,
        /// Per-attempt timeout from the directive that scheduled this attempt.
        timeout: Option<Duration>,
    },
    Backoff {
        model: Arc<C::Model>,
        options: C::Options,
        timeout: Option<Duration>,
        wait: Duration,
    },
    Done(Completion<C, T>),
    Failed(LlmError),
}

impl<C: Capability, T> LoopState<C, T> {
    /// First attempt of a run.
    pub fn initial(model: Arc<C::Model>, options: C::Options) -> Self {
        Self::Attempting {
            model,
            options,
            timeout: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }
}

impl<C: Capability, T> std::fmt::Debug for LoopState<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attempting { model, timeout, .. } => f
                .debug_struct("Attempting")
                .field("model", &model.key())
                .field("timeout", timeout)
                .finish_non_exhaustive(),
            Self::Backoff {
                model,
                timeout,
                wait,
                ..
            } => f
                .debug_struct("Backoff")
                .field("model", &model.key())
                .field("timeout", timeout)
                .field("wait", wait)
                .finish_non_exhaustive(),
            Self::Done(completion) => f
                .debug_tuple("Done")
                .field(&completion.model.key())
                .finish(),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

/// One logical call through the retry loop.
pub struct RetryRun<C: Capability> {
    core: Arc<RetryCore<C>>,
    ledger: AttemptLedger<C>,
    original: C::Options,
    caller_signal: Option<AbortSignal>,
    run_id: Uuid,
}

impl<C: Capability> RetryRun<C> {
    pub(crate) fn new(core: Arc<RetryCore<C>>, original: C::Options) -> Self {
        let caller_signal = original.abort_signal().cloned();
        Self {
            core,
            ledger: AttemptLedger::new(),
            original,
            caller_signal,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn ledger(&self) -> &AttemptLedger<C> {
        &self.ledger
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The caller's options, untouched by any directive.
    pub fn original_options(&self) -> &C::Options {
        &self.original
    }

    /// Step until a terminal state.
    pub async fn drive<T: Send + 'static>(
        &mut self,
        mut state: LoopState<C, T>,
        call: &CallFn<C, T>,
        inspect: Option<InspectFn<C, T>>,
    ) -> Result<Completion<C, T>, LlmError> {
        loop {
            state = match state {
                LoopState::Done(completion) => return Ok(completion),
                LoopState::Failed(error) => return Err(error),
                state => self.step(state, call, inspect).await,
            };
        }
    }

    /// Perform one transition. Terminal states are returned unchanged.
    pub async fn step<T: Send + 'static>(
        &mut self,
        state: LoopState<C, T>,
        call: &CallFn<C, T>,
        inspect: Option<InspectFn<C, T>>,
    ) -> LoopState<C, T> {
        match state {
            LoopState::Attempting {
                model,
                options,
                timeout,
            } => self.attempt(model, options, timeout, call, inspect).await,
            LoopState::Backoff {
                model,
                options,
                timeout,
                wait,
            } => self.backoff(model, options, timeout, wait).await,
            terminal => terminal,
        }
    }

    async fn attempt<T: Send + 'static>(
        &mut self,
        model: Arc<C::Model>,
        mut options: C::Options,
        timeout: Option<Duration>,
        call: &CallFn<C, T>,
        inspect: Option<InspectFn<C, T>>,
    ) -> LoopState<C, T> {
        if let Some(last) = self.ledger.last() {
            let next = last.relabeled(Arc::clone(&model));
            let context = RetryContext {
                current: &next,
                attempts: self.ledger.as_slice(),
            };
            notify_retry(&self.core.observers, &context);
        }

        let scope = timeout.map(AbortSignal::timeout);
        if let Some(scope) = &scope {
            options.set_abort_signal(Some(scope.clone()));
        }

        tracing::debug!(
            run_id = %self.run_id,
            capability = C::NAME,
            model = %model.key(),
            attempt = self.ledger.len() + 1,
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "starting attempt"
        );

        // A fresh timeout replaces the caller's own deadline for this attempt.
        let caller = self.caller_signal.as_ref().filter(|caller| {
            scope.is_none() || (caller.origin() == SignalOrigin::Caller && !caller.is_aborted())
        });

        let future = call(Arc::clone(&model), options.clone());
        let outcome = match (&scope, caller) {
            (Some(scope), Some(caller)) => caller.guard(scope.guard(future)).await,
            (Some(scope), None) => scope.guard(future).await,
            (None, Some(caller)) => caller.guard(future).await,
            (None, None) => future.await,
        };

        match outcome {
            Ok(output) => match inspect {
                Some(inspect) => self.inspect_output(output, inspect, model, options).await,
                None => LoopState::Done(Completion {
                    output,
                    model,
                    options,
                }),
            },
            Err(error) => self.handle_error(error, model, options).await,
        }
    }

    async fn inspect_output<T: Send + 'static>(
        &mut self,
        output: T,
        inspect: InspectFn<C, T>,
        model: Arc<C::Model>,
        options: C::Options,
    ) -> LoopState<C, T> {
        self.ledger.push(Attempt::Result {
            result: inspect(&output),
            model: Arc::clone(&model),
            options: options.clone(),
        });

        match self.select().await {
            Ok(Some(selected)) => {
                tracing::debug!(
                    run_id = %self.run_id,
                    capability = C::NAME,
                    model = %model.key(),
                    next = %selected.model.key(),
                    "result rejected by strategy"
                );
                self.schedule(selected)
            }
            Ok(None) => LoopState::Done(Completion {
                output,
                model,
                options,
            }),
            Err(error) => LoopState::Failed(error),
        }
    }

    /// Record a failed attempt and decide what comes next.
    ///
    /// User cancellations end the run immediately without being recorded.
    pub async fn handle_error<T>(
        &mut self,
        error: LlmError,
        model: Arc<C::Model>,
        options: C::Options,
    ) -> LoopState<C, T> {
        if error.is_user_cancellation() {
            tracing::debug!(
                run_id = %self.run_id,
                capability = C::NAME,
                model = %model.key(),
                "attempt cancelled by caller"
            );
            return LoopState::Failed(error);
        }

        self.ledger.push(Attempt::Error {
            error: error.clone(),
            model,
            options,
        });
        if let Some(current) = self.ledger.last() {
            let context = RetryContext {
                current,
                attempts: self.ledger.as_slice(),
            };
            notify_error(&self.core.observers, &context);
        }

        match self.select().await {
            Ok(Some(selected)) => self.schedule(selected),
            Ok(None) => LoopState::Failed(self.exhausted(error)),
            Err(resolve_error) => LoopState::Failed(resolve_error),
        }
    }

    async fn select(&self) -> Result<Option<SelectedRetry<C>>, LlmError> {
        let Some(current) = self.ledger.last() else {
            return Ok(None);
        };
        find_retry(
            &self.core.retryables,
            &self.ledger,
            current,
            self.core.resolver.as_deref(),
        )
        .await
    }

    fn schedule<T>(&self, selected: SelectedRetry<C>) -> LoopState<C, T> {
        let SelectedRetry { model, retry } = selected;
        let options = retry.merge_options(&self.original);
        let wait = backoff_delay(
            retry.delay.unwrap_or(Duration::ZERO),
            retry.backoff_factor,
            self.ledger.count_for(&model.key()),
        );

        if wait.is_zero() {
            LoopState::Attempting {
                model,
                options,
                timeout: retry.timeout,
            }
        } else {
            LoopState::Backoff {
                model,
                options,
                timeout: retry.timeout,
                wait,
            }
        }
    }

    async fn backoff<T>(
        &self,
        model: Arc<C::Model>,
        options: C::Options,
        timeout: Option<Duration>,
        wait: Duration,
    ) -> LoopState<C, T> {
        tracing::debug!(
            run_id = %self.run_id,
            capability = C::NAME,
            model = %model.key(),
            wait_ms = wait.as_millis() as u64,
            "backing off"
        );

        let caller = self
            .caller_signal
            .as_ref()
            .filter(|caller| timeout.is_none() || caller.origin() == SignalOrigin::Caller);

        let sleep = tokio::time::sleep(wait);
        if let Some(caller) = caller {
            tokio::select! {
                biased;
                _ = caller.aborted() => return LoopState::Failed(caller.abort_error()),
                _ = sleep => {}
            }
        } else {
            sleep.await;
        }

        LoopState::Attempting {
            model,
            options,
            timeout,
        }
    }

    /// The error a run ends with once no strategy applies.
    fn exhausted(&self, error: LlmError) -> LlmError {
        if self.ledger.len() <= 1 {
            return error;
        }
        tracing::warn!(
            run_id = %self.run_id,
            capability = C::NAME,
            attempts = self.ledger.len(),
            err = %error,
            "retries exhausted"
        );
        LlmError::RetryError(self.ledger.exhausted(&error))
    }
}
