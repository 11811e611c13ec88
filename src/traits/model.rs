//! Model identity

use crate::types::ModelKey;

/// Identity shared by every model capability.
///
/// Two models are considered the same iff their `(provider_id, model_id)`
/// pair matches, regardless of which instance is being held.
pub trait ModelRef: Send + Sync {
    fn provider_id(&self) -> &str;

    fn model_id(&self) -> &str;

    fn key(&self) -> ModelKey {
        ModelKey::new(self.provider_id(), self.model_id())
    }
}
