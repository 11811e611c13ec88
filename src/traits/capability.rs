//! Capability descriptors
//!
//! The retry machinery is written once and instantiated per capability. A
//! capability ties together the model trait object, its call options and the
//! result type that strategies may inspect.

use std::fmt::Debug;

use super::{EmbeddingModel, ImageModel, LanguageModel, ModelRef};
use crate::types::{
    EmbeddingCallOptions, EmbeddingResult, FinishReason, GenerateResult, ImageCallOptions,
    ImageResult, LanguageModelCallOptions, ProviderOptions,
};
use crate::utils::cancel::AbortSignal;

/// Call options the retry loop knows how to merge.
pub trait ModelCallOptions: Clone + Debug + Send + Sync + 'static {
    /// Partial options a retry directive may apply on top of the caller's.
    type Overrides: Clone + Debug + Default + Send + Sync + 'static;

    /// Replace every field that is set in `overrides`.
    fn apply_overrides(&mut self, overrides: &Self::Overrides);

    fn set_provider_options(&mut self, provider_options: ProviderOptions);

    fn abort_signal(&self) -> Option<&AbortSignal>;

    fn set_abort_signal(&mut self, signal: Option<AbortSignal>);
}

/// Binds a model kind to its options and inspectable result.
pub trait Capability: Clone + Copy + Debug + Send + Sync + 'static {
    type Model: ?Sized + ModelRef + 'static;
    type Options: ModelCallOptions;
    type Result: Clone + Debug + Send + Sync + 'static;

    /// Label used in logs.
    const NAME: &'static str;

    /// Finish reason of an inspected result, reported in exhaustion errors.
    fn finish_reason(_result: &Self::Result) -> Option<FinishReason> {
        None
    }
}

/// Text generation and streaming.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageCapability;

impl Capability for LanguageCapability {
    type Model = dyn LanguageModel;
    type Options = LanguageModelCallOptions;
    type Result = GenerateResult;

    const NAME: &'static str = "language";

    fn finish_reason(result: &GenerateResult) -> Option<FinishReason> {
        Some(result.finish_reason.clone())
    }
}

/// Embeddings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingCapability;

impl Capability for EmbeddingCapability {
    type Model = dyn EmbeddingModel;
    type Options = EmbeddingCallOptions;
    type Result = EmbeddingResult;

    const NAME: &'static str = "embedding";
}

/// Image generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCapability;

impl Capability for ImageCapability {
    type Model = dyn ImageModel;
    type Options = ImageCallOptions;
    type Result = ImageResult;

    const NAME: &'static str = "image";
}
