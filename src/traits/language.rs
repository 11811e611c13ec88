//! Language model capability trait

use std::collections::HashMap;

use async_trait::async_trait;

use super::ModelRef;
use crate::error::LlmError;
use crate::types::{GenerateResult, LanguageModelCallOptions, StreamResult};

#[async_trait]
pub trait LanguageModel: ModelRef {
    /// URL patterns per media type that the provider fetches natively.
    fn supported_urls(&self) -> HashMap<String, Vec<String>> {
        HashMap::new()
    }

    async fn do_generate(
        &self,
        options: LanguageModelCallOptions,
    ) -> Result<GenerateResult, LlmError>;

    async fn do_stream(&self, options: LanguageModelCallOptions)
    -> Result<StreamResult, LlmError>;
}
