//! Retry directives and strategies
//!
//! A strategy ("retryable") is consulted after every attempt and may answer
//! with a [`Retry`] directive naming the model to try next. Strategies come in
//! three shapes, modelled as the closed enum [`Retryable`]:
//!
//! - `Function`: inspects the attempt history; runs for errors *and* results.
//! - `Static`: a fixed directive; runs for errors only.
//! - `Model`: a bare model, same as `Static(Retry::new(model))`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::attempt::Attempt;
use crate::error::LlmError;
use crate::registry::ModelResolver;
use crate::traits::{
    Capability, EmbeddingCapability, EmbeddingModel, ImageCapability, ImageModel,
    LanguageCapability, LanguageModel, ModelCallOptions, ModelRef,
};
use crate::types::ProviderOptions;

/// Overrides type for a capability's call options.
pub type OverridesOf<C> = <<C as Capability>::Options as ModelCallOptions>::Overrides;

/// A model given either as an instance or as a name to resolve.
pub enum ModelSource<C: Capability> {
    Instance(Arc<C::Model>),
    /// A `"provider:model"` id resolved through a [`ModelResolver`].
    Name(String),
}

impl<C: Capability> Clone for ModelSource<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Instance(model) => Self::Instance(Arc::clone(model)),
            Self::Name(name) => Self::Name(name.clone()),
        }
    }
}

impl<C: Capability> fmt::Debug for ModelSource<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(model) => write!(f, "Instance({})", model.key()),
            Self::Name(name) => write!(f, "Name({name})"),
        }
    }
}

impl<C: Capability> ModelSource<C> {
    /// Resolve to a concrete instance.
    pub fn resolve(
        &self,
        resolver: Option<&dyn ModelResolver<C>>,
    ) -> Result<Arc<C::Model>, LlmError> {
        match self {
            Self::Instance(model) => Ok(Arc::clone(model)),
            Self::Name(name) => match resolver {
                Some(resolver) => resolver.resolve(name),
                None => Err(LlmError::ConfigurationError(format!(
                    "model '{name}' was given by name but no resolver is configured"
                ))),
            },
        }
    }
}

impl<C: Capability> From<&str> for ModelSource<C> {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl<C: Capability> From<String> for ModelSource<C> {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Per-capability conversions from concrete model handles.
macro_rules! impl_model_conversions {
    ($capability:ty, $model_trait:ident) => {
        impl<M: $model_trait + 'static> From<Arc<M>> for ModelSource<$capability> {
            fn from(model: Arc<M>) -> Self {
                Self::Instance(model as Arc<dyn $model_trait>)
            }
        }

        impl<M: $model_trait + 'static> From<Arc<M>> for Retry<$capability> {
            fn from(model: Arc<M>) -> Self {
                Retry::new(ModelSource::Instance(model as Arc<dyn $model_trait>))
            }
        }

        impl<M: $model_trait + 'static> From<Arc<M>> for Retryable<$capability> {
            fn from(model: Arc<M>) -> Self {
                Retryable::Model(ModelSource::Instance(model as Arc<dyn $model_trait>))
            }
        }
    };
}

impl_model_conversions!(LanguageCapability, LanguageModel);
impl_model_conversions!(EmbeddingCapability, EmbeddingModel);
impl_model_conversions!(ImageCapability, ImageModel);

/// Which model to try next and under which conditions.
#[derive(Debug, Clone)]
pub struct Retry<C: Capability> {
    pub model: ModelSource<C>,
    /// Ceiling on attempts recorded against `model` in this request. Defaults to 1.
    pub max_attempts: Option<u32>,
    /// Base wait before the attempt.
    pub delay: Option<Duration>,
    /// Growth applied per prior attempt on the same model. Floored at 1.
    pub backoff_factor: Option<f64>,
    /// Fresh timeout scope for the attempt, replacing the caller's signal.
    pub timeout: Option<Duration>,
    /// Field-by-field call option overrides.
    pub options: Option<OverridesOf<C>>,
    /// Replaces the provider options wholesale; `options` still applies on top.
    pub provider_options: Option<ProviderOptions>,
}

impl<C: Capability> Retry<C> {
    pub fn new(model: impl Into<ModelSource<C>>) -> Self {
        Self {
            model: model.into(),
            max_attempts: None,
            delay: None,
            backoff_factor: None,
            timeout: None,
            options: None,
            provider_options: None,
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = Some(factor);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn options(mut self, options: OverridesOf<C>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn provider_options(mut self, provider_options: ProviderOptions) -> Self {
        self.provider_options = Some(provider_options);
        self
    }

    /// The attempt ceiling, never below 1.
    pub fn attempt_ceiling(&self) -> u32 {
        self.max_attempts.unwrap_or(1).max(1)
    }

    /// Merge this directive's overrides onto the caller's original options.
    pub fn merge_options(&self, original: &C::Options) -> C::Options {
        let mut options = original.clone();
        if let Some(provider_options) = &self.provider_options {
            options.set_provider_options(provider_options.clone());
        }
        if let Some(overrides) = &self.options {
            options.apply_overrides(overrides);
        }
        options
    }
}

impl<C: Capability> From<ModelSource<C>> for Retry<C> {
    fn from(model: ModelSource<C>) -> Self {
        Self::new(model)
    }
}

impl<C: Capability> From<&str> for Retry<C> {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// What a function strategy sees.
pub struct RetryContext<'a, C: Capability> {
    /// The attempt that just finished.
    pub current: &'a Attempt<C>,
    /// Every attempt of the request so far, in order, including `current`.
    pub attempts: &'a [Attempt<C>],
}

impl<C: Capability> Clone for RetryContext<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Capability> Copy for RetryContext<'_, C> {}

impl<C: Capability> fmt::Debug for RetryContext<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryContext")
            .field("current", self.current)
            .field("attempts", &self.attempts.len())
            .finish()
    }
}

/// A strategy that inspects the attempt history.
///
/// Returning `None` declines; the next strategy in the list is consulted.
#[async_trait]
pub trait RetryStrategy<C: Capability>: Send + Sync {
    async fn retry(&self, context: RetryContext<'_, C>) -> Option<Retry<C>>;
}

/// Adapter turning a synchronous closure into a [`RetryStrategy`].
pub struct FnStrategy<F>(F);

#[async_trait]
impl<C, F> RetryStrategy<C> for FnStrategy<F>
where
    C: Capability,
    F: Fn(RetryContext<'_, C>) -> Option<Retry<C>> + Send + Sync,
{
    async fn retry(&self, context: RetryContext<'_, C>) -> Option<Retry<C>> {
        (self.0)(context)
    }
}

/// One entry of a strategy list.
pub enum Retryable<C: Capability> {
    Function(Arc<dyn RetryStrategy<C>>),
    Static(Retry<C>),
    Model(ModelSource<C>),
}

impl<C: Capability> Clone for Retryable<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Function(strategy) => Self::Function(Arc::clone(strategy)),
            Self::Static(retry) => Self::Static(retry.clone()),
            Self::Model(model) => Self::Model(model.clone()),
        }
    }
}

impl<C: Capability> fmt::Debug for Retryable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Function(..)"),
            Self::Static(retry) => f.debug_tuple("Static").field(retry).finish(),
            Self::Model(model) => f.debug_tuple("Model").field(model).finish(),
        }
    }
}

impl<C: Capability> Retryable<C> {
    /// Wrap a strategy implementation.
    pub fn strategy(strategy: impl RetryStrategy<C> + 'static) -> Self {
        Self::Function(Arc::new(strategy))
    }

    /// Wrap a synchronous closure as a function strategy.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(RetryContext<'_, C>) -> Option<Retry<C>> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(FnStrategy(f)))
    }

    /// Whether this entry may react to a successful result.
    pub fn inspects_results(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    /// Produce this entry's candidate directive for `context`.
    pub async fn candidate(&self, context: RetryContext<'_, C>) -> Option<Retry<C>> {
        match self {
            Self::Function(strategy) => strategy.retry(context).await,
            Self::Static(retry) => Some(retry.clone()),
            Self::Model(model) => Some(Retry::new(model.clone())),
        }
    }
}

impl<C: Capability> From<Retry<C>> for Retryable<C> {
    fn from(retry: Retry<C>) -> Self {
        Self::Static(retry)
    }
}

impl<C: Capability> From<ModelSource<C>> for Retryable<C> {
    fn from(model: ModelSource<C>) -> Self {
        Self::Model(model)
    }
}

impl<C: Capability> From<&str> for Retryable<C> {
    fn from(name: &str) -> Self {
        Self::Model(ModelSource::from(name))
    }
}
