//! Cancellation utilities
//!
//! An [`AbortSignal`] is either owned by the caller (cancelling it means the
//! user gave up on the request) or scoped to a single attempt with a deadline
//! (firing means the attempt timed out). The retry loop treats the two very
//! differently, so the origin travels with the signal.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::types::PartStream;

/// Who owns an [`AbortSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOrigin {
    /// Created by the caller; firing is a user cancellation.
    Caller,
    /// Created for one retried attempt; firing is a timeout.
    Timeout,
}

/// A cloneable cancellation signal passed to models through their call options.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    token: CancellationToken,
    origin: SignalOrigin,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    /// Create a caller-owned signal.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            origin: SignalOrigin::Caller,
            timeout: None,
            deadline: None,
        }
    }

    /// Create a signal that fires once `timeout` has elapsed from now.
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            origin: SignalOrigin::Timeout,
            timeout: Some(timeout),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Request cancellation. Every clone observes it.
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn origin(&self) -> SignalOrigin {
        self.origin
    }

    /// Whether the signal has fired, either explicitly or by deadline.
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the signal fires.
    pub async fn aborted(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// The error a call observing this signal fails with.
    pub fn abort_error(&self) -> LlmError {
        match (self.origin, self.timeout) {
            (SignalOrigin::Timeout, Some(timeout)) => LlmError::TimeoutError(format!(
                "attempt exceeded its {}ms timeout",
                timeout.as_millis()
            )),
            (SignalOrigin::Timeout, None) => {
                LlmError::TimeoutError("attempt exceeded its timeout".to_string())
            }
            (SignalOrigin::Caller, _) => {
                LlmError::Aborted("request was aborted by the caller".to_string())
            }
        }
    }

    /// Run `future` until it completes or this signal fires.
    ///
    /// A model that reports [`LlmError::Aborted`] because a timeout-scoped
    /// signal fired is reported as a timeout instead.
    pub async fn guard<F, T>(&self, future: F) -> Result<T, LlmError>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        tokio::select! {
            biased;
            _ = self.aborted() => Err(self.abort_error()),
            result = future => result.map_err(|error| {
                if self.origin == SignalOrigin::Timeout
                    && error.is_user_cancellation()
                    && self.is_aborted()
                {
                    self.abort_error()
                } else {
                    error
                }
            }),
        }
    }
}

/// Stop a part stream as soon as `signal` fires, yielding the signal's error last.
pub fn abortable_stream(stream: PartStream, signal: AbortSignal) -> PartStream {
    let mut inner = stream;
    let s = async_stream::stream! {
        loop {
            tokio::select! {
                biased;
                _ = signal.aborted() => {
                    yield Err(signal.abort_error());
                    break;
                }
                item = inner.next() => {
                    let Some(item) = item else { break };
                    yield item;
                }
            }
        }
    };
    Box::pin(s)
}
