//! Scripted mock models
//!
//! Mocks replay a queue of [`Scripted`] outcomes, then keep returning a
//! fallback outcome. They record every call's options so tests can assert
//! on what a retry sent.
//!
//! ```rust,ignore
//! let primary = Arc::new(
//!     MockLanguageModel::new("mock", "primary")
//!         .script([Scripted::Err(LlmError::api_error(503, "down"))])
//!         .reply("recovered"),
//! );
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::LlmError;
use crate::traits::{EmbeddingModel, ImageModel, LanguageModel, ModelRef};
use crate::types::{
    EmbeddingCallOptions, EmbeddingResult, GenerateResult, ImageCallOptions, ImageResult,
    LanguageModelCallOptions, PartStream, StreamPart, StreamResult,
};
use crate::utils::cancel::{AbortSignal, abortable_stream};

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    Ok(T),
    Err(LlmError),
    /// Never completes unless the call's abort signal fires.
    Hang,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Script<T> {
    queue: Mutex<VecDeque<Scripted<T>>>,
    fallback: Scripted<T>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: Scripted<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    fn extend(&mut self, outcomes: impl IntoIterator<Item = Scripted<T>>) {
        lock(&self.queue).extend(outcomes);
    }

    fn next(&self) -> Scripted<T> {
        lock(&self.queue)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    async fn play(&self, signal: Option<&AbortSignal>) -> Result<T, LlmError> {
        match self.next() {
            Scripted::Ok(value) => Ok(value),
            Scripted::Err(error) => Err(error),
            Scripted::Hang => match signal {
                Some(signal) => {
                    signal.aborted().await;
                    Err(signal.abort_error())
                }
                None => futures::future::pending().await,
            },
        }
    }
}

/// Scripted [`LanguageModel`].
pub struct MockLanguageModel {
    provider: String,
    model: String,
    generate: Script<GenerateResult>,
    stream: Script<Vec<Result<StreamPart, LlmError>>>,
    calls: Mutex<Vec<LanguageModelCallOptions>>,
}

impl MockLanguageModel {
    /// A mock that answers `"ok"` and streams `"ok"` until scripted otherwise.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            generate: Script::new(Scripted::Ok(GenerateResult::text("ok"))),
            stream: Script::new(Scripted::Ok(text_parts("ok"))),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue `do_generate` outcomes.
    pub fn script(mut self, outcomes: impl IntoIterator<Item = Scripted<GenerateResult>>) -> Self {
        self.generate.extend(outcomes);
        self
    }

    /// Outcome of every `do_generate` call once the script is exhausted.
    pub fn fallback(mut self, outcome: Scripted<GenerateResult>) -> Self {
        self.generate.fallback = outcome;
        self
    }

    /// Shorthand for a text fallback for both generation and streaming.
    pub fn reply(mut self, text: &str) -> Self {
        self.generate.fallback = Scripted::Ok(GenerateResult::text(text));
        self.stream.fallback = Scripted::Ok(text_parts(text));
        self
    }

    /// Queue `do_stream` outcomes. `Ok` carries the parts the stream yields.
    pub fn stream_script(
        mut self,
        outcomes: impl IntoIterator<Item = Scripted<Vec<Result<StreamPart, LlmError>>>>,
    ) -> Self {
        self.stream.extend(outcomes);
        self
    }

    pub fn stream_fallback(mut self, outcome: Scripted<Vec<Result<StreamPart, LlmError>>>) -> Self {
        self.stream.fallback = outcome;
        self
    }

    /// Number of `do_generate` and `do_stream` calls so far.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Options of every call, in order.
    pub fn calls(&self) -> Vec<LanguageModelCallOptions> {
        lock(&self.calls).clone()
    }

    fn record(&self, options: &LanguageModelCallOptions) {
        lock(&self.calls).push(options.clone());
    }
}

/// Parts of a complete single-text stream.
pub fn text_parts(text: &str) -> Vec<Result<StreamPart, LlmError>> {
    vec![
        Ok(StreamPart::StreamStart {
            warnings: Vec::new(),
        }),
        Ok(StreamPart::TextStart { id: "0".into() }),
        Ok(StreamPart::text_delta("0", text)),
        Ok(StreamPart::TextEnd { id: "0".into() }),
        Ok(StreamPart::finish(crate::types::FinishReason::Stop)),
    ]
}

impl ModelRef for MockLanguageModel {
    fn provider_id(&self) -> &str {
        &self.provider
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn do_generate(
        &self,
        options: LanguageModelCallOptions,
    ) -> Result<GenerateResult, LlmError> {
        self.record(&options);
        self.generate.play(options.abort_signal.as_ref()).await
    }

    async fn do_stream(
        &self,
        options: LanguageModelCallOptions,
    ) -> Result<StreamResult, LlmError> {
        self.record(&options);
        let parts = self.stream.play(options.abort_signal.as_ref()).await?;
        let stream: PartStream = Box::pin(futures::stream::iter(parts));
        let stream = match options.abort_signal {
            Some(signal) => abortable_stream(stream, signal),
            None => stream,
        };
        Ok(StreamResult::new(stream))
    }
}

/// Scripted [`EmbeddingModel`].
pub struct MockEmbeddingModel {
    provider: String,
    model: String,
    max_per_call: Option<usize>,
    embed: Script<EmbeddingResult>,
    calls: Mutex<Vec<EmbeddingCallOptions>>,
}

impl MockEmbeddingModel {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            max_per_call: None,
            embed: Script::new(Scripted::Ok(EmbeddingResult::new(vec![vec![0.0; 3]]))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn max_per_call(mut self, max: usize) -> Self {
        self.max_per_call = Some(max);
        self
    }

    pub fn script(mut self, outcomes: impl IntoIterator<Item = Scripted<EmbeddingResult>>) -> Self {
        self.embed.extend(outcomes);
        self
    }

    pub fn fallback(mut self, outcome: Scripted<EmbeddingResult>) -> Self {
        self.embed.fallback = outcome;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<EmbeddingCallOptions> {
        lock(&self.calls).clone()
    }
}

impl ModelRef for MockEmbeddingModel {
    fn provider_id(&self) -> &str {
        &self.provider
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddingModel {
    fn max_embeddings_per_call(&self) -> Option<usize> {
        self.max_per_call
    }

    async fn do_embed(&self, options: EmbeddingCallOptions) -> Result<EmbeddingResult, LlmError> {
        lock(&self.calls).push(options.clone());
        self.embed.play(options.abort_signal.as_ref()).await
    }
}

/// Scripted [`ImageModel`].
pub struct MockImageModel {
    provider: String,
    model: String,
    images: Script<ImageResult>,
    calls: Mutex<Vec<ImageCallOptions>>,
}

impl MockImageModel {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            images: Script::new(Scripted::Ok(ImageResult::new(vec!["aW1hZ2U=".to_string()]))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(mut self, outcomes: impl IntoIterator<Item = Scripted<ImageResult>>) -> Self {
        self.images.extend(outcomes);
        self
    }

    pub fn fallback(mut self, outcome: Scripted<ImageResult>) -> Self {
        self.images.fallback = outcome;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<ImageCallOptions> {
        lock(&self.calls).clone()
    }
}

impl ModelRef for MockImageModel {
    fn provider_id(&self) -> &str {
        &self.provider
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ImageModel for MockImageModel {
    async fn do_generate(&self, options: ImageCallOptions) -> Result<ImageResult, LlmError> {
        lock(&self.calls).push(options.clone());
        self.images.play(options.abort_signal.as_ref()).await
    }
}
