mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use siumai_fallback::mock::text_parts;
use siumai_fallback::prelude::*;
use support::{collect, language, options, text_of};

fn error_part(message: &str) -> Result<StreamPart, LlmError> {
    Ok(StreamPart::Error {
        error: LlmError::StreamError(message.to_string()),
    })
}

fn start_part() -> Result<StreamPart, LlmError> {
    Ok(StreamPart::StreamStart {
        warnings: Vec::new(),
    })
}

#[tokio::test]
async fn error_part_before_content_triggers_one_replacement() {
    let a = Arc::new(language("a").stream_script([Scripted::Ok(vec![
        start_part(),
        error_part("upstream reset"),
    ])]));
    let b = Arc::new(language("b").reply("hello from b"));
    let retries = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&retries);

    let model = RetryableLanguageModel::builder(a.clone())
        .retry(b.clone())
        .on_retry(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let result = model.do_stream(options()).await.unwrap();
    let parts = collect(result.stream).await;

    assert_eq!(text_of(&parts), "hello from b");
    assert!(parts.iter().all(Result::is_ok));
    assert!(
        !parts
            .iter()
            .any(|p| matches!(p, Ok(StreamPart::Error { .. })))
    );
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
    assert_eq!(retries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn err_item_before_content_is_replayed() {
    let a = Arc::new(language("a").stream_script([Scripted::Ok(vec![Err(
        LlmError::HttpError("connection reset".into()),
    )])]));
    let b = Arc::new(language("b").reply("recovered"));

    let model = RetryableLanguageModel::builder(a)
        .retry(b.clone())
        .build()
        .unwrap();
    let parts = collect(model.do_stream(options()).await.unwrap().stream).await;

    assert_eq!(text_of(&parts), "recovered");
    assert_eq!(b.call_count(), 1);
}

#[tokio::test]
async fn error_after_content_is_delivered_not_retried() {
    let a = Arc::new(language("a").stream_script([Scripted::Ok(vec![
        start_part(),
        Ok(StreamPart::TextStart { id: "0".into() }),
        Ok(StreamPart::text_delta("0", "partial")),
        error_part("cut off"),
    ])]));
    let b = Arc::new(language("b"));

    let model = RetryableLanguageModel::builder(a)
        .retry(b.clone())
        .build()
        .unwrap();
    let parts = collect(model.do_stream(options()).await.unwrap().stream).await;

    assert_eq!(text_of(&parts), "partial");
    assert!(matches!(
        parts.last(),
        Some(Ok(StreamPart::Error {
            error: LlmError::StreamError(_)
        }))
    ));
    assert_eq!(b.call_count(), 0);
}

#[tokio::test]
async fn handshake_errors_use_the_regular_loop() {
    let a = Arc::new(
        language("a").stream_script([Scripted::Err(LlmError::api_error(503, "down"))]),
    );
    let b = Arc::new(language("b").reply("from b"));

    let model = RetryableLanguageModel::builder(a)
        .retry(strategies::service_unavailable::<LanguageCapability>(b.clone()))
        .build()
        .unwrap();
    let parts = collect(model.do_stream(options()).await.unwrap().stream).await;
    assert_eq!(text_of(&parts), "from b");
}

#[tokio::test]
async fn failed_replacement_ends_the_stream_with_the_error() {
    let a = Arc::new(language("a").stream_script([Scripted::Ok(vec![error_part("reset")])]));
    let b = Arc::new(
        language("b").stream_fallback(Scripted::Err(LlmError::api_error(500, "b down"))),
    );

    let model = RetryableLanguageModel::builder(a)
        .retry(b.clone())
        .build()
        .unwrap();
    let parts = collect(model.do_stream(options()).await.unwrap().stream).await;

    assert_eq!(parts.len(), 1);
    match &parts[0] {
        Err(LlmError::RetryError(retry)) => {
            assert_eq!(retry.attempts, 2);
            assert_eq!(retry.message, "API error 500: b down");
        }
        other => panic!("unexpected item {other:?}"),
    }
}

#[tokio::test]
async fn replacement_streams_are_guarded_too() {
    let a = Arc::new(language("a").stream_script([Scripted::Ok(vec![error_part("first")])]));
    let b = Arc::new(language("b").stream_script([Scripted::Ok(vec![error_part("second")])]));
    let c = Arc::new(language("c").stream_fallback(Scripted::Ok(text_parts("third time"))));

    let model = RetryableLanguageModel::builder(a)
        .retry(b.clone())
        .retry(c.clone())
        .build()
        .unwrap();
    let parts = collect(model.do_stream(options()).await.unwrap().stream).await;

    assert_eq!(text_of(&parts), "third time");
    assert_eq!(b.call_count(), 1);
    assert_eq!(c.call_count(), 1);
}

#[tokio::test]
async fn disabled_streams_go_straight_to_the_primary() {
    let a = Arc::new(language("a").stream_script([Scripted::Ok(vec![error_part("reset")])]));
    let b = Arc::new(language("b"));

    let model = RetryableLanguageModel::builder(a)
        .retry(b.clone())
        .disabled(true)
        .build()
        .unwrap();
    let parts = collect(model.do_stream(options()).await.unwrap().stream).await;

    assert!(matches!(parts.as_slice(), [Ok(StreamPart::Error { .. })]));
    assert_eq!(b.call_count(), 0);
}
