//! Sticky fallback memory
//!
//! After a request had to fall back from the model it started on, the model
//! it ended on stays "hot" for a bounded number of requests or seconds, so
//! later independent requests skip the known-bad primary.
//!
//! State lives behind a short-lived mutex that is never held across an
//! await. Concurrent requests sharing one model race on the slot and the
//! last writer wins.

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::LlmError;
use crate::traits::{Capability, ModelRef};

/// How long a sticky fallback stays in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    /// Number of subsequent requests served by the fallback. `0` disables stickiness.
    Requests(u32),
    /// Seconds since the fallback was recorded.
    Seconds(u64),
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self::Requests(0)
    }
}

impl FromStr for ResetPolicy {
    type Err = LlmError;

    /// Accepts `after-request`, `after-N-requests`, `after-N-request` and
    /// `after-N-seconds`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            LlmError::ConfigurationError(format!(
                "invalid reset policy '{s}', expected 'after-request', 'after-N-requests' or 'after-N-seconds'"
            ))
        };

        if s == "after-request" {
            return Ok(Self::Requests(1));
        }

        let rest = s.strip_prefix("after-").ok_or_else(invalid)?;
        let (count, unit) = rest.split_once('-').ok_or_else(invalid)?;
        if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        match unit {
            "requests" | "request" => count.parse().map(Self::Requests).map_err(|_| invalid()),
            "seconds" => count.parse().map(Self::Seconds).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

/// The remembered fallback.
struct StickyState<C: Capability> {
    model: Arc<C::Model>,
    set_at: Instant,
    requests_remaining: u32,
}

/// Chooses the start model of each request and remembers successful fallbacks.
pub struct StickyModel<C: Capability> {
    primary: Arc<C::Model>,
    policy: ResetPolicy,
    state: Mutex<Option<StickyState<C>>>,
}

impl<C: Capability> std::fmt::Debug for StickyModel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sticky = self.lock().as_ref().map(|state| state.model.key());
        f.debug_struct("StickyModel")
            .field("primary", &self.primary.key())
            .field("policy", &self.policy)
            .field("sticky", &sticky)
            .finish()
    }
}

impl<C: Capability> StickyModel<C> {
    pub fn new(primary: Arc<C::Model>, policy: ResetPolicy) -> Self {
        Self {
            primary,
            policy,
            state: Mutex::new(None),
        }
    }

    pub fn primary(&self) -> &Arc<C::Model> {
        &self.primary
    }

    pub fn policy(&self) -> ResetPolicy {
        self.policy
    }

    /// The currently remembered fallback, without consuming a request.
    pub fn current(&self) -> Option<Arc<C::Model>> {
        self.lock().as_ref().map(|state| Arc::clone(&state.model))
    }

    /// Pick the model a new request starts on.
    pub fn start_model(&self) -> Arc<C::Model> {
        let mut state = self.lock();
        let Some(sticky) = state.as_mut() else {
            return Arc::clone(&self.primary);
        };

        let keep = match self.policy {
            ResetPolicy::Requests(_) => {
                if sticky.requests_remaining > 0 {
                    sticky.requests_remaining -= 1;
                    true
                } else {
                    false
                }
            }
            ResetPolicy::Seconds(seconds) => {
                sticky.set_at.elapsed() < Duration::from_secs(seconds)
            }
        };

        if keep {
            return Arc::clone(&sticky.model);
        }

        tracing::info!(
            capability = C::NAME,
            model = %sticky.model.key(),
            primary = %self.primary.key(),
            "sticky fallback expired"
        );
        *state = None;
        Arc::clone(&self.primary)
    }

    /// Remember `end` if a successful request finished on a different model than `start`.
    /// Does nothing while stickiness is disabled.
    pub fn record(&self, start: &C::Model, end: &Arc<C::Model>) {
        if self.policy == ResetPolicy::Requests(0) || start.key() == end.key() {
            return;
        }

        let requests_remaining = match self.policy {
            ResetPolicy::Requests(n) => n,
            ResetPolicy::Seconds(_) => 0,
        };
        tracing::info!(
            capability = C::NAME,
            from = %start.key(),
            to = %end.key(),
            policy = ?self.policy,
            "sticky fallback recorded"
        );
        *self.lock() = Some(StickyState {
            model: Arc::clone(end),
            set_at: Instant::now(),
            requests_remaining,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Option<StickyState<C>>> {
        // A poisoned slot only ever holds a complete value.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLanguageModel;
    use crate::traits::{LanguageCapability, LanguageModel};

    fn model(id: &str) -> Arc<dyn LanguageModel> {
        Arc::new(MockLanguageModel::new("mock", id))
    }

    fn sticky_on(
        primary: &Arc<dyn LanguageModel>,
        policy: ResetPolicy,
    ) -> StickyModel<LanguageCapability> {
        StickyModel::new(Arc::clone(primary), policy)
    }

    #[test]
    fn parses_reset_policies() {
        assert_eq!(
            "after-request".parse::<ResetPolicy>().unwrap(),
            ResetPolicy::Requests(1)
        );
        assert_eq!(
            "after-3-requests".parse::<ResetPolicy>().unwrap(),
            ResetPolicy::Requests(3)
        );
        assert_eq!(
            "after-1-request".parse::<ResetPolicy>().unwrap(),
            ResetPolicy::Requests(1)
        );
        assert_eq!(
            "after-30-seconds".parse::<ResetPolicy>().unwrap(),
            ResetPolicy::Seconds(30)
        );
        assert_eq!(ResetPolicy::default(), ResetPolicy::Requests(0));
    }

    #[test]
    fn rejects_malformed_reset_policies() {
        for bad in [
            "",
            "after",
            "after-",
            "after-x-requests",
            "after--1-requests",
            "after-2-minutes",
            "before-2-requests",
            "after-2-requests-please",
            "after-+2-requests",
        ] {
            assert!(
                matches!(bad.parse::<ResetPolicy>(), Err(LlmError::ConfigurationError(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn request_policy_counts_down_then_returns_to_primary() {
        let a = model("a");
        let b = model("b");
        let sticky = sticky_on(&a, ResetPolicy::Requests(2));

        assert_eq!(sticky.start_model().model_id(), "a");
        sticky.record(a.as_ref(), &b);

        assert_eq!(sticky.start_model().model_id(), "b");
        assert_eq!(sticky.start_model().model_id(), "b");
        assert_eq!(sticky.start_model().model_id(), "a");
        assert!(sticky.current().is_none());
    }

    #[test]
    fn default_policy_expires_immediately() {
        let a = model("a");
        let b = model("b");
        let sticky = sticky_on(&a, ResetPolicy::default());
        sticky.record(a.as_ref(), &b);
        assert_eq!(sticky.start_model().model_id(), "a");
    }

    #[test]
    fn same_model_leaves_state_untouched() {
        let a = model("a");
        let b = model("b");
        let sticky = sticky_on(&a, ResetPolicy::Requests(2));
        sticky.record(a.as_ref(), &b);

        let start = sticky.start_model();
        sticky.record(start.as_ref(), &start);

        // One request left on the original countdown.
        assert_eq!(sticky.start_model().model_id(), "b");
        assert_eq!(sticky.start_model().model_id(), "a");
    }

    #[tokio::test(start_paused = true)]
    async fn seconds_policy_expires_with_time() {
        let a = model("a");
        let b = model("b");
        let sticky = sticky_on(&a, ResetPolicy::Seconds(5));
        sticky.record(a.as_ref(), &b);

        assert_eq!(sticky.start_model().model_id(), "b");
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(sticky.start_model().model_id(), "b");
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(sticky.start_model().model_id(), "a");
    }
}
