//! Model registry
//!
//! Strategies and builders may name models with the Vercel-style
//! `"provider:model"` id instead of holding an instance. Those names are
//! resolved through a [`ModelResolver`]; [`ModelRegistry`] is the in-memory
//! implementation shipped with the crate.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::LlmError;
use crate::traits::{Capability, ModelRef};
use crate::types::ModelKey;

/// Resolves model names to instances.
pub trait ModelResolver<C: Capability>: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Arc<C::Model>, LlmError>;
}

impl<C, F> ModelResolver<C> for F
where
    C: Capability,
    F: Fn(&str) -> Result<Arc<C::Model>, LlmError> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Result<Arc<C::Model>, LlmError> {
        self(name)
    }
}

/// In-memory `"provider:model"` registry.
pub struct ModelRegistry<C: Capability> {
    by_key: HashMap<ModelKey, Arc<C::Model>>,
    /// alias -> canonical key
    aliases: HashMap<String, ModelKey>,
}

impl<C: Capability> Default for ModelRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Capability> std::fmt::Debug for ModelRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self.by_key.keys().map(ToString::to_string).collect();
        keys.sort();
        f.debug_struct("ModelRegistry")
            .field("models", &keys)
            .field("aliases", &self.aliases.len())
            .finish()
    }
}

impl<C: Capability> ModelRegistry<C> {
    pub fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Register a model under its own `provider:model` key. Replaces any previous entry.
    pub fn register(&mut self, model: Arc<C::Model>) -> &mut Self {
        self.by_key.insert(model.key(), model);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_model(mut self, model: Arc<C::Model>) -> Self {
        self.register(model);
        self
    }

    /// Make `alias` resolve to the model registered under `target`.
    pub fn with_alias(mut self, alias: impl Into<String>, target: ModelKey) -> Self {
        self.aliases.insert(alias.into(), target);
        self
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn get(&self, key: &ModelKey) -> Option<Arc<C::Model>> {
        self.by_key.get(key).cloned()
    }
}

impl<C: Capability> ModelResolver<C> for ModelRegistry<C> {
    fn resolve(&self, name: &str) -> Result<Arc<C::Model>, LlmError> {
        let name = name.trim();
        let key = match self.aliases.get(name) {
            Some(key) => key.clone(),
            None => ModelKey::parse(name).ok_or_else(|| {
                LlmError::ConfigurationError(format!(
                    "invalid model id '{name}', expected 'provider:model'"
                ))
            })?,
        };
        self.get(&key).ok_or_else(|| {
            LlmError::ConfigurationError(format!("no {} model registered as '{key}'", C::NAME))
        })
    }
}
