mod support;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use siumai_fallback::prelude::*;
use siumai_fallback::strategies::RetryAfterDelay;
use support::{EventLog, api_err, failing, language, options};

#[tokio::test]
async fn falls_back_to_next_model_on_error() {
    let a = Arc::new(language("a").script([api_err(500)]));
    let b = Arc::new(language("b").reply("from b"));

    let model = RetryableLanguageModel::builder(a.clone())
        .retry(b.clone())
        .build()
        .unwrap();
    let result = model.do_generate(options()).await.unwrap();

    assert_eq!(result.content_text().as_deref(), Some("from b"));
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
}

#[tokio::test]
async fn success_on_first_attempt_never_consults_strategies() {
    let a = Arc::new(language("a").reply("from a"));
    let b = Arc::new(language("b"));

    let model =
        create_retryable::<LanguageCapability>(a.clone(), [Retryable::from(b.clone())]).unwrap();
    let result = model.do_generate(options()).await.unwrap();

    assert_eq!(result.content_text().as_deref(), Some("from a"));
    assert_eq!(b.call_count(), 0);
}

#[tokio::test]
async fn single_attempt_failure_is_not_wrapped() {
    let a = failing("a", 500);
    let model = RetryableLanguageModel::builder(a).build().unwrap();

    let err = model.do_generate(options()).await.unwrap_err();
    assert!(matches!(err, LlmError::ApiError { code: 500, .. }));
}

#[tokio::test]
async fn exhaustion_after_three_attempts_is_wrapped() {
    let a = failing("a", 500);
    let b = failing("b", 502);
    let c = failing("c", 503);

    let model = RetryableLanguageModel::builder(a)
        .retry(b)
        .retry(c)
        .build()
        .unwrap();
    let err = model.do_generate(options()).await.unwrap_err();

    let LlmError::RetryError(retry) = err else {
        panic!("expected a composite error, got {err:?}");
    };
    assert_eq!(retry.attempts, 3);
    assert_eq!(retry.errors.len(), 3);
    assert_eq!(retry.message, "API error 503: c failed");
    let models: Vec<String> = retry.errors.iter().map(|f| f.model().to_string()).collect();
    assert_eq!(models, ["mock:a", "mock:b", "mock:c"]);
    assert!(
        retry
            .to_string()
            .starts_with("Failed after 3 attempts. Last error:")
    );
}

#[tokio::test]
async fn ceiling_counts_attempts_on_the_same_model() {
    let a = failing("a", 500);
    let model = RetryableLanguageModel::builder(a.clone())
        .retry(Retry::<LanguageCapability>::new(a.clone()).max_attempts(3))
        .build()
        .unwrap();

    let err = model.do_generate(options()).await.unwrap_err();
    assert_eq!(a.call_count(), 3);
    assert!(matches!(err, LlmError::RetryError(ref r) if r.attempts == 3));
}

#[tokio::test]
async fn results_are_only_rejected_by_function_strategies() {
    let filtered = GenerateResult::text("").with_finish_reason(FinishReason::ContentFilter);

    let a = Arc::new(language("a").fallback(Scripted::Ok(filtered.clone())));
    let b = Arc::new(language("b").reply("clean"));
    let model = RetryableLanguageModel::builder(a.clone())
        .retry(b.clone())
        .build()
        .unwrap();
    let result = model.do_generate(options()).await.unwrap();
    assert_eq!(result.finish_reason, FinishReason::ContentFilter);
    assert_eq!(b.call_count(), 0);

    let model = RetryableLanguageModel::builder(a)
        .retry(strategies::content_filter_triggered(b.clone()))
        .build()
        .unwrap();
    let result = model.do_generate(options()).await.unwrap();
    assert_eq!(result.content_text().as_deref(), Some("clean"));
    assert_eq!(b.call_count(), 1);
}

#[tokio::test]
async fn rejected_result_is_returned_when_strategies_run_out() {
    let filtered = GenerateResult::text("partial").with_finish_reason(FinishReason::ContentFilter);
    let a = Arc::new(language("a").fallback(Scripted::Ok(filtered)));

    let model = RetryableLanguageModel::builder(a.clone())
        .retry(strategies::content_filter_triggered(
            Retry::<LanguageCapability>::new(a.clone()).max_attempts(2),
        ))
        .build()
        .unwrap();
    let result = model.do_generate(options()).await.unwrap();

    assert_eq!(a.call_count(), 2);
    assert_eq!(result.content_text().as_deref(), Some("partial"));
}

#[tokio::test]
async fn directive_options_merge_onto_original_options() {
    let a = failing("a", 500);
    let b = Arc::new(language("b"));
    let provider_options: ProviderOptions =
        HashMap::from([("b".to_string(), json!({"reasoning": "low"}))]);

    let model = RetryableLanguageModel::builder(a.clone())
        .retry(
            Retry::<LanguageCapability>::new(b.clone())
                .options(LanguageModelCallOverrides {
                    temperature: Some(0.0),
                    ..Default::default()
                })
                .provider_options(provider_options.clone()),
        )
        .build()
        .unwrap();

    let original = options()
        .with_temperature(0.7)
        .with_provider_options(HashMap::from([("a".to_string(), json!({"x": 1}))]));
    model.do_generate(original).await.unwrap();

    let sent_to_a = &a.calls()[0];
    assert_eq!(sent_to_a.temperature, Some(0.7));

    let sent_to_b = &b.calls()[0];
    assert_eq!(sent_to_b.temperature, Some(0.0));
    assert_eq!(sent_to_b.provider_options.as_ref(), Some(&provider_options));
    assert_eq!(sent_to_b.prompt, vec![PromptMessage::user("hello")]);
}

#[tokio::test]
async fn observers_see_errors_then_retries_in_order() {
    let a = failing("a", 500);
    let b = failing("b", 500);
    let c = Arc::new(language("c"));
    let log = EventLog::default();
    let on_error = log.clone();
    let on_retry = log.clone();

    let model = RetryableLanguageModel::builder(a)
        .retry(b)
        .retry(c)
        .on_error(move |ctx| {
            on_error.push(format!("error:{}", ctx.current.model().model_id()));
        })
        .on_retry(move |ctx| {
            assert!(ctx.current.is_error());
            on_retry.push(format!(
                "retry:{}:{}",
                ctx.current.model().model_id(),
                ctx.attempts.len()
            ));
        })
        .build()
        .unwrap();
    model.do_generate(options()).await.unwrap();

    assert_eq!(
        log.events(),
        ["error:a", "retry:b:1", "error:b", "retry:c:2"]
    );
}

#[tokio::test]
async fn user_cancellation_is_never_retried() {
    let a = Arc::new(language("a").fallback(Scripted::Hang));
    let b = Arc::new(language("b"));
    let model = RetryableLanguageModel::builder(a)
        .retry(b.clone())
        .build()
        .unwrap();

    let signal = AbortSignal::new();
    signal.abort();
    let err = model
        .do_generate(options().with_abort_signal(signal))
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::Aborted(_)));
    assert_eq!(b.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_with_prior_attempts_on_the_model() {
    let a = failing("a", 500);
    let model = RetryableLanguageModel::builder(a.clone())
        .retry(
            Retry::<LanguageCapability>::new(a.clone())
                .max_attempts(3)
                .delay(Duration::from_millis(100))
                .backoff_factor(2.0),
        )
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    let _ = model.do_generate(options()).await;
    let elapsed = started.elapsed();

    // 100 * 2^1 + 100 * 2^2
    assert_eq!(a.call_count(), 3);
    assert!(elapsed >= Duration::from_millis(600), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(700), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn retry_after_header_sets_the_wait() {
    let headers: ResponseHeaders =
        HashMap::from([("retry-after-ms".to_string(), "1500".to_string())]);
    let a = Arc::new(language("a").script([Scripted::Err(LlmError::api_error_with_headers(
        429,
        "rate limited",
        headers,
    ))]));

    let model = RetryableLanguageModel::builder(a.clone())
        .retry(strategies::retry_after_delay::<LanguageCapability>(RetryAfterDelay::new(
            Duration::from_millis(10),
        )))
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    model.do_generate(options()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(a.call_count(), 2);
    assert!(elapsed >= Duration::from_millis(1500), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1600), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn configured_cap_clamps_retry_after_hints() {
    let headers: ResponseHeaders = HashMap::from([("retry-after".to_string(), "30".to_string())]);
    let a = Arc::new(language("a").script([Scripted::Err(LlmError::api_error_with_headers(
        429,
        "rate limited",
        headers,
    ))]));

    let settings = RetrySettings::from_json(r#"{"max_retry_after_ms": 2000}"#).unwrap();
    let model = RetryableLanguageModel::builder(a.clone())
        .retry(strategies::retry_after_delay::<LanguageCapability>(
            RetryAfterDelay::new(Duration::from_millis(10)).settings(&settings),
        ))
        .settings(&settings)
        .unwrap()
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    model.do_generate(options()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(a.call_count(), 2);
    assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
}

#[tokio::test]
async fn fallbacks_can_be_named_through_a_registry() {
    let a = failing("a", 503);
    let b: Arc<dyn LanguageModel> = Arc::new(language("b").reply("from registry"));
    let registry = ModelRegistry::<LanguageCapability>::new().with_model(b);

    let model = RetryableLanguageModel::builder(a)
        .retry(strategies::service_unavailable::<LanguageCapability>("mock:b"))
        .resolver(registry)
        .build()
        .unwrap();
    let result = model.do_generate(options()).await.unwrap();
    assert_eq!(result.content_text().as_deref(), Some("from registry"));
}
