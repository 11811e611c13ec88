//! Image generation capability trait

use async_trait::async_trait;

use super::ModelRef;
use crate::error::LlmError;
use crate::types::{ImageCallOptions, ImageResult};

#[async_trait]
pub trait ImageModel: ModelRef {
    /// Maximum number of images one call can produce.
    fn max_images_per_call(&self) -> Option<usize> {
        None
    }

    async fn do_generate(&self, options: ImageCallOptions) -> Result<ImageResult, LlmError>;
}
