//! # siumai-fallback
//!
//! Retry, fallback and sticky-model routing for siumai-style model traits.
//!
//! A [`RetryableModel`] wraps a primary model and a prioritized list of
//! retry strategies. It implements the same capability trait as the model it
//! wraps ([`LanguageModel`], [`EmbeddingModel`] or [`ImageModel`]), so call
//! sites do not change.
//!
//! ## Features
//!
//! - **Fallback chains**: switch to another model when an attempt fails or
//!   returns an unwanted result.
//! - **Attempt ceilings**: every directive caps the attempts made against its model.
//! - **Backoff and `retry-after`**: exponential waits, or the server's hint.
//! - **Sticky fallbacks**: keep using a fallback that worked for a while.
//! - **Stream safety**: streams are only replayed before any content was delivered.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use siumai_fallback::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LlmError> {
//!     let primary = Arc::new(MockLanguageModel::new("openai", "gpt-4o"));
//!     let backup = Arc::new(MockLanguageModel::new("anthropic", "claude"));
//!
//!     let model = RetryableLanguageModel::builder(primary)
//!         .retry(strategies::service_unavailable(backup.clone()))
//!         .retry(backup)
//!         .reset("after-5-requests")?
//!         .build()?;
//!
//!     let result = model
//!         .do_generate(LanguageModelCallOptions::from_text("Hello"))
//!         .await?;
//!     println!("{}", result.content_text().unwrap_or_default());
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod mock;
pub mod registry;
pub mod retry;
pub mod retryable;
pub mod strategies;
pub mod traits;
pub mod types;
pub mod utils;

pub use config::RetrySettings;
pub use error::{AttemptFailure, LlmError, RetryError};
pub use registry::{ModelRegistry, ModelResolver};
pub use retry::{
    Attempt, AttemptLedger, ModelSource, ResetPolicy, Retry, RetryContext, RetryObserver,
    RetryStrategy, Retryable, TracingObserver,
};
pub use retryable::{
    Disabled, RetryableEmbeddingModel, RetryableImageModel, RetryableLanguageModel,
    RetryableModel, RetryableModelBuilder, create_retryable,
};
pub use traits::{
    Capability, EmbeddingCapability, EmbeddingModel, ImageCapability, ImageModel,
    LanguageCapability, LanguageModel, ModelCallOptions, ModelRef,
};
pub use utils::cancel::AbortSignal;

/// Commonly used items.
pub mod prelude {
    pub use crate::config::RetrySettings;
    pub use crate::error::{LlmError, RetryError};
    pub use crate::mock::{MockEmbeddingModel, MockImageModel, MockLanguageModel, Scripted};
    pub use crate::registry::{ModelRegistry, ModelResolver};
    pub use crate::retry::{ModelSource, ResetPolicy, Retry, RetryContext, Retryable};
    pub use crate::retryable::{
        RetryableEmbeddingModel, RetryableImageModel, RetryableLanguageModel, RetryableModel,
        create_retryable,
    };
    pub use crate::strategies;
    pub use crate::traits::{
        EmbeddingCapability, EmbeddingModel, ImageCapability, ImageModel, LanguageCapability,
        LanguageModel, ModelRef,
    };
    pub use crate::types::*;
    pub use crate::utils::cancel::AbortSignal;
}
