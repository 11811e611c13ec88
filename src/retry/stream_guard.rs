//! Replay-before-content guard for streaming generation
//!
//! A stream that fails before the consumer has seen any content can be
//! replaced transparently: the failure is fed through the same retry loop as
//! a non-streaming error and the replacement stream is spliced in. Once a
//! content part has been forwarded the output cannot be taken back, so later
//! failures are passed through untouched.

use std::sync::Arc;

use futures::StreamExt;

use super::run::{CallFn, RetryRun};
use crate::traits::{LanguageCapability, LanguageModel};
use crate::types::{LanguageModelCallOptions, PartStream, StreamPart, StreamResult};

/// Wrap `stream`, produced by `model` with `options`, so that failures before
/// the first content part are retried through `run`.
pub fn guard_stream(
    mut run: RetryRun<LanguageCapability>,
    stream: PartStream,
    model: Arc<dyn LanguageModel>,
    options: LanguageModelCallOptions,
    call: CallFn<LanguageCapability, StreamResult>,
) -> PartStream {
    let s = async_stream::stream! {
        let mut inner = stream;
        let mut model = model;
        let mut options = options;
        let mut forwarded = false;

        while let Some(item) = inner.next().await {
            let error = match item {
                Ok(StreamPart::Error { error }) if !forwarded => error,
                Err(error) if !forwarded => error,
                Ok(part) => {
                    forwarded |= part.is_content();
                    yield Ok(part);
                    continue;
                }
                Err(error) => {
                    yield Err(error);
                    continue;
                }
            };

            tracing::debug!(
                run_id = %run.run_id(),
                model = %model.key(),
                err = %error,
                "stream failed before content"
            );

            // Release the failed reader before opening a replacement.
            drop(std::mem::replace(&mut inner, Box::pin(futures::stream::empty())));

            let state = run
                .handle_error(error, Arc::clone(&model), options.clone())
                .await;
            match run.drive(state, &call, None).await {
                Ok(completion) => {
                    inner = completion.output.stream;
                    model = completion.model;
                    options = completion.options;
                }
                Err(error) => {
                    yield Err(error);
                    break;
                }
            }
        }
    };
    Box::pin(s)
}
