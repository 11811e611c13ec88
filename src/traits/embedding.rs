//! Embedding model capability trait

use async_trait::async_trait;

use super::ModelRef;
use crate::error::LlmError;
use crate::types::{EmbeddingCallOptions, EmbeddingResult};

#[async_trait]
pub trait EmbeddingModel: ModelRef {
    /// Maximum number of values accepted by one `do_embed` call.
    fn max_embeddings_per_call(&self) -> Option<usize> {
        None
    }

    fn supports_parallel_calls(&self) -> bool {
        true
    }

    async fn do_embed(&self, options: EmbeddingCallOptions) -> Result<EmbeddingResult, LlmError>;
}
