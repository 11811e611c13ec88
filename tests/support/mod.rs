//! Shared helpers for the integration suites

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use siumai_fallback::prelude::*;

pub fn language(id: &str) -> MockLanguageModel {
    MockLanguageModel::new("mock", id)
}

/// A language model whose every call fails with `code`.
pub fn failing(id: &str, code: u16) -> Arc<MockLanguageModel> {
    let error = LlmError::api_error(code, format!("{id} failed"));
    Arc::new(language(id).fallback(Scripted::Err(error)))
}

pub fn api_err<T>(code: u16) -> Scripted<T> {
    Scripted::Err(LlmError::api_error(code, format!("status {code}")))
}

pub fn options() -> LanguageModelCallOptions {
    LanguageModelCallOptions::from_text("hello")
}

/// Drain a part stream.
pub async fn collect(stream: PartStream) -> Vec<Result<StreamPart, LlmError>> {
    stream.collect().await
}

/// Concatenated text deltas of a drained stream.
pub fn text_of(parts: &[Result<StreamPart, LlmError>]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            Ok(StreamPart::TextDelta { delta, .. }) => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

/// Records observer events as `"error:<model>"` / `"retry:<model>"`.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
