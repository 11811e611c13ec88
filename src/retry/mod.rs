//! Retry machinery
//! - attempt.rs: attempts and the per-request ledger
//! - backoff.rs: exponential backoff
//! - retry_after.rs: `retry-after-ms` / `retry-after` header hints
//! - directive.rs: retry directives and strategy shapes
//! - engine.rs: strategy selection (`find_retry`)
//! - sticky.rs: sticky fallback memory and reset policies
//! - observer.rs: `on_error` / `on_retry` observers
//! - run.rs: the attempt loop
//! - stream_guard.rs: replay-before-content guard for streams

pub mod attempt;
pub mod backoff;
pub mod directive;
pub mod engine;
pub mod observer;
pub mod retry_after;
pub mod run;
pub mod sticky;
pub mod stream_guard;

pub use attempt::{Attempt, AttemptLedger};
pub use backoff::backoff_delay;
pub use directive::{
    FnStrategy, ModelSource, OverridesOf, Retry, RetryContext, RetryStrategy, Retryable,
};
pub use engine::{SelectedRetry, find_retry};
pub use observer::{CallbackObserver, RetryObserver, TracingObserver};
pub use retry_after::{MAX_RETRY_AFTER, parse_retry_after, parse_retry_after_at};
pub use run::{CallFn, Completion, InspectFn, LoopState, RetryRun};
pub use sticky::{ResetPolicy, StickyModel};
pub use stream_guard::guard_stream;
