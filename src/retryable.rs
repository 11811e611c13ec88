//! Retryable models
//!
//! [`RetryableModel`] wraps a primary model and a prioritized strategy list
//! and implements the same capability trait as the primary. Callers use it
//! exactly like the model it wraps.
//!
//! ```rust,ignore
//! use siumai_fallback::prelude::*;
//!
//! let model = RetryableLanguageModel::builder(primary)
//!     .retry(fallback)
//!     .retry(strategies::request_timeout(Retry::new(primary_again).max_attempts(3)))
//!     .reset("after-2-requests")?
//!     .build()?;
//! let result = model.do_generate(LanguageModelCallOptions::from_text("Hello")).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::config::RetrySettings;
use crate::error::LlmError;
use crate::registry::ModelResolver;
use crate::retry::observer::{CallbackObserver, RetryObserver};
use crate::retry::run::{CallFn, Completion, InspectFn, LoopState, RetryRun};
use crate::retry::sticky::{ResetPolicy, StickyModel};
use crate::retry::stream_guard::guard_stream;
use crate::retry::{ModelSource, RetryContext, Retryable};
use crate::traits::{
    Capability, EmbeddingCapability, EmbeddingModel, ImageCapability, ImageModel,
    LanguageCapability, LanguageModel, ModelRef,
};
use crate::types::{
    EmbeddingCallOptions, EmbeddingResult, GenerateResult, ImageCallOptions, ImageResult,
    LanguageModelCallOptions, StreamResult,
};

/// Kill switch for the retry loop, evaluated once per call.
#[derive(Clone)]
pub enum Disabled {
    Flag(bool),
    Check(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl Disabled {
    pub fn is_disabled(&self) -> bool {
        match self {
            Self::Flag(disabled) => *disabled,
            Self::Check(check) => check(),
        }
    }
}

impl Default for Disabled {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl std::fmt::Debug for Disabled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag(disabled) => f.debug_tuple("Flag").field(disabled).finish(),
            Self::Check(_) => f.write_str("Check(..)"),
        }
    }
}

/// Configuration shared by every call through one [`RetryableModel`].
pub(crate) struct RetryCore<C: Capability> {
    pub(crate) primary: Arc<C::Model>,
    pub(crate) retryables: Vec<Retryable<C>>,
    pub(crate) resolver: Option<Arc<dyn ModelResolver<C>>>,
    pub(crate) observers: Vec<Arc<dyn RetryObserver<C>>>,
    pub(crate) disabled: Disabled,
    pub(crate) sticky: StickyModel<C>,
}

/// A model that retries and falls back according to its strategy list.
pub struct RetryableModel<C: Capability> {
    core: Arc<RetryCore<C>>,
}

pub type RetryableLanguageModel = RetryableModel<LanguageCapability>;
pub type RetryableEmbeddingModel = RetryableModel<EmbeddingCapability>;
pub type RetryableImageModel = RetryableModel<ImageCapability>;

impl<C: Capability> Clone for RetryableModel<C> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<C: Capability> std::fmt::Debug for RetryableModel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryableModel")
            .field("capability", &C::NAME)
            .field("primary", &self.core.primary.key())
            .field("retries", &self.core.retryables)
            .field("disabled", &self.core.disabled)
            .field("sticky", &self.core.sticky)
            .finish_non_exhaustive()
    }
}

impl<C: Capability> RetryableModel<C> {
    pub fn builder(model: impl Into<ModelSource<C>>) -> RetryableModelBuilder<C> {
        RetryableModelBuilder::new(model)
    }

    pub fn primary(&self) -> &Arc<C::Model> {
        &self.core.primary
    }

    pub fn retries(&self) -> &[Retryable<C>] {
        &self.core.retryables
    }

    pub fn reset_policy(&self) -> ResetPolicy {
        self.core.sticky.policy()
    }

    /// The fallback new requests currently start on, if any.
    pub fn sticky_model(&self) -> Option<Arc<C::Model>> {
        self.core.sticky.current()
    }

    pub fn is_disabled(&self) -> bool {
        self.core.disabled.is_disabled()
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> Arc<RetryCore<C>> {
        Arc::clone(&self.core)
    }

    /// Run one sticky-aware call through the loop.
    async fn execute<T: Send + 'static>(
        &self,
        options: C::Options,
        call: CallFn<C, T>,
        inspect: Option<InspectFn<C, T>>,
    ) -> Result<T, LlmError> {
        if self.core.disabled.is_disabled() {
            tracing::debug!(capability = C::NAME, "retries disabled, calling primary");
            return call(Arc::clone(&self.core.primary), options).await;
        }

        let start = self.core.sticky.start_model();
        let mut run = RetryRun::new(Arc::clone(&self.core), options.clone());
        let Completion { output, model, .. } = run
            .drive(LoopState::initial(Arc::clone(&start), options), &call, inspect)
            .await?;
        self.core.sticky.record(start.as_ref(), &model);
        Ok(output)
    }
}

impl<C: Capability> ModelRef for RetryableModel<C> {
    fn provider_id(&self) -> &str {
        self.core.primary.provider_id()
    }

    fn model_id(&self) -> &str {
        self.core.primary.model_id()
    }
}

#[async_trait]
impl LanguageModel for RetryableModel<LanguageCapability> {
    fn supported_urls(&self) -> HashMap<String, Vec<String>> {
        self.core.primary.supported_urls()
    }

    async fn do_generate(
        &self,
        options: LanguageModelCallOptions,
    ) -> Result<GenerateResult, LlmError> {
        let call: CallFn<LanguageCapability, GenerateResult> =
            Arc::new(|model: Arc<dyn LanguageModel>, options| {
                async move { model.do_generate(options).await }.boxed()
            });
        let inspect: InspectFn<LanguageCapability, GenerateResult> = GenerateResult::clone;
        self.execute(options, call, Some(inspect)).await
    }

    /// Streams always start on the primary; see [`guard_stream`] for replay rules.
    async fn do_stream(
        &self,
        options: LanguageModelCallOptions,
    ) -> Result<StreamResult, LlmError> {
        if self.core.disabled.is_disabled() {
            return self.core.primary.do_stream(options).await;
        }

        let call: CallFn<LanguageCapability, StreamResult> =
            Arc::new(|model: Arc<dyn LanguageModel>, options| {
                async move { model.do_stream(options).await }.boxed()
            });
        let mut run = RetryRun::new(Arc::clone(&self.core), options.clone());
        let initial = LoopState::initial(Arc::clone(&self.core.primary), options);
        let Completion {
            output,
            model,
            options,
        } = run.drive(initial, &call, None).await?;

        let StreamResult {
            stream,
            request,
            response,
        } = output;
        Ok(StreamResult {
            stream: guard_stream(run, stream, model, options, call),
            request,
            response,
        })
    }
}

#[async_trait]
impl EmbeddingModel for RetryableModel<EmbeddingCapability> {
    fn max_embeddings_per_call(&self) -> Option<usize> {
        self.core.primary.max_embeddings_per_call()
    }

    fn supports_parallel_calls(&self) -> bool {
        self.core.primary.supports_parallel_calls()
    }

    async fn do_embed(&self, options: EmbeddingCallOptions) -> Result<EmbeddingResult, LlmError> {
        let call: CallFn<EmbeddingCapability, EmbeddingResult> =
            Arc::new(|model: Arc<dyn EmbeddingModel>, options| {
                async move { model.do_embed(options).await }.boxed()
            });
        self.execute(options, call, None).await
    }
}

#[async_trait]
impl ImageModel for RetryableModel<ImageCapability> {
    fn max_images_per_call(&self) -> Option<usize> {
        self.core.primary.max_images_per_call()
    }

    async fn do_generate(&self, options: ImageCallOptions) -> Result<ImageResult, LlmError> {
        let call: CallFn<ImageCapability, ImageResult> =
            Arc::new(|model: Arc<dyn ImageModel>, options| {
                async move { model.do_generate(options).await }.boxed()
            });
        self.execute(options, call, None).await
    }
}

/// Builder for [`RetryableModel`].
pub struct RetryableModelBuilder<C: Capability> {
    model: ModelSource<C>,
    retryables: Vec<Retryable<C>>,
    resolver: Option<Arc<dyn ModelResolver<C>>>,
    observers: Vec<Arc<dyn RetryObserver<C>>>,
    disabled: Disabled,
    reset: ResetPolicy,
}

impl<C: Capability> RetryableModelBuilder<C> {
    pub fn new(model: impl Into<ModelSource<C>>) -> Self {
        Self {
            model: model.into(),
            retryables: Vec::new(),
            resolver: None,
            observers: Vec::new(),
            disabled: Disabled::default(),
            reset: ResetPolicy::default(),
        }
    }

    /// Replace the strategy list.
    pub fn retries(mut self, retries: impl IntoIterator<Item = Retryable<C>>) -> Self {
        self.retryables = retries.into_iter().collect();
        self
    }

    /// Append one strategy.
    pub fn retry(mut self, retry: impl Into<Retryable<C>>) -> Self {
        self.retryables.push(retry.into());
        self
    }

    /// Resolver for models given by name.
    pub fn resolver(mut self, resolver: impl ModelResolver<C> + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn shared_resolver(mut self, resolver: Arc<dyn ModelResolver<C>>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Parse and set the sticky reset policy, e.g. `"after-2-requests"`.
    pub fn reset(mut self, reset: &str) -> Result<Self, LlmError> {
        self.reset = reset.parse()?;
        Ok(self)
    }

    pub fn reset_policy(mut self, reset: ResetPolicy) -> Self {
        self.reset = reset;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Disabled::Flag(disabled);
        self
    }

    /// Decide per call whether retries are disabled.
    pub fn disabled_when<F>(mut self, check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.disabled = Disabled::Check(Arc::new(check));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&RetryContext<'a, C>) + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(CallbackObserver::on_error(f)));
        self
    }

    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&RetryContext<'a, C>) + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(CallbackObserver::on_retry(f)));
        self
    }

    pub fn observer(mut self, observer: impl RetryObserver<C> + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Apply deserialized settings. Fails on a malformed reset policy.
    pub fn settings(mut self, settings: &RetrySettings) -> Result<Self, LlmError> {
        if settings.disabled {
            self.disabled = Disabled::Flag(true);
        }
        if let Some(reset) = settings.reset_policy()? {
            self.reset = reset;
        }
        Ok(self)
    }

    /// Resolve the primary and build the model.
    pub fn build(self) -> Result<RetryableModel<C>, LlmError> {
        let primary = self.model.resolve(self.resolver.as_deref())?;
        Ok(RetryableModel {
            core: Arc::new(RetryCore {
                sticky: StickyModel::new(Arc::clone(&primary), self.reset),
                primary,
                retryables: self.retryables,
                resolver: self.resolver,
                observers: self.observers,
                disabled: self.disabled,
            }),
        })
    }
}

/// Wrap `model` with `retries` using default settings.
pub fn create_retryable<C: Capability>(
    model: impl Into<ModelSource<C>>,
    retries: impl IntoIterator<Item = Retryable<C>>,
) -> Result<RetryableModel<C>, LlmError> {
    RetryableModel::builder(model).retries(retries).build()
}
