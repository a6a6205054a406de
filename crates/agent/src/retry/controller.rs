//! Retry controller.
//!
//! A call moves through
//! `Attempting → {Success, ClassifyFailure}` and
//! `ClassifyFailure → {ShrinkAndRetry, WaitAndRetry, Fail}`.
//! Transitions are pure functions on [`RetryState`]; [`RetryController::run`]
//! performs the side effects (provider call, shrink, countdown) between them.

use parley_config::RetryConfig;
use parley_core::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::classify::{FailureKind, classify};
use crate::context::ContextWindow;

/// Where a single call currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// Calling the provider; `attempt` counts rate-limit retries used so far.
    Attempting { attempt: u32 },
    ClassifyFailure { attempt: u32, kind: FailureKind },
    ShrinkAndRetry { attempt: u32 },
    WaitAndRetry { attempt: u32, wait: Duration },
    Success,
    Fail,
}

impl RetryState {
    pub fn initial() -> Self {
        Self::Attempting { attempt: 0 }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Fail)
    }

    /// `Attempting` → `Success` or `ClassifyFailure`.
    pub fn after_attempt(self, outcome: Result<(), FailureKind>) -> Self {
        match (self, outcome) {
            (Self::Attempting { .. }, Ok(())) => Self::Success,
            (Self::Attempting { attempt }, Err(kind)) => Self::ClassifyFailure { attempt, kind },
            (other, _) => other,
        }
    }

    /// `ClassifyFailure` → `ShrinkAndRetry`, `WaitAndRetry` or `Fail`.
    ///
    /// Shrinking is bounded by the window floor, not by `max_retries`.
    pub fn decide(self, max_retries: u32, can_shrink: bool) -> Self {
        match self {
            Self::ClassifyFailure { attempt, kind } => match kind {
                FailureKind::ContextTooLarge if can_shrink => Self::ShrinkAndRetry { attempt },
                FailureKind::RateLimited { wait } if attempt < max_retries => {
                    Self::WaitAndRetry { attempt, wait }
                }
                _ => Self::Fail,
            },
            other => other,
        }
    }

    /// Back to `Attempting`; only a rate-limit wait consumes a retry slot.
    pub fn retry(self) -> Self {
        match self {
            Self::ShrinkAndRetry { attempt } => Self::Attempting { attempt },
            Self::WaitAndRetry { attempt, .. } => Self::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }
}

/// Limits applied to every call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub default_wait: Duration,
    pub shrink_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            default_wait: Duration::from_secs(config.default_delay_secs),
            shrink_pause: Duration::from_millis(config.shrink_pause_ms),
        }
    }
}

/// Drives one provider call to a terminal state.
#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `call` until it succeeds or the policy gives up.
    ///
    /// `call` receives the window as it stands for that attempt, so a shrink
    /// takes effect on the very next request. On failure the last provider
    /// error is returned unchanged.
    pub async fn run<T, F, Fut>(
        &self,
        agent: &str,
        window: &mut ContextWindow,
        mut call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut(&ContextWindow) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut state = RetryState::initial();
        let mut value: Option<T> = None;
        let mut last_error: Option<ProviderError> = None;

        loop {
            state = match state {
                RetryState::Attempting { attempt } => {
                    debug!(agent, attempt, limit = window.limit(), "Calling provider");
                    match call(&*window).await {
                        Ok(v) => {
                            value = Some(v);
                            state.after_attempt(Ok(()))
                        }
                        Err(e) => {
                            let kind = classify(&e, self.policy.default_wait);
                            warn!(agent, attempt, kind = ?kind, error = %e, "Provider call failed");
                            last_error = Some(e);
                            state.after_attempt(Err(kind))
                        }
                    }
                }
                RetryState::ClassifyFailure { .. } => {
                    state.decide(self.policy.max_retries, window.can_shrink())
                }
                RetryState::ShrinkAndRetry { .. } => {
                    window.shrink();
                    tokio::time::sleep(self.policy.shrink_pause).await;
                    state.retry()
                }
                RetryState::WaitAndRetry { attempt, wait } => {
                    info!(
                        agent,
                        retry = attempt + 1,
                        max_retries = self.policy.max_retries,
                        "Rate limited; retrying after wait"
                    );
                    countdown(agent, wait).await;
                    state.retry()
                }
                RetryState::Success => {
                    return value.ok_or_else(|| {
                        ProviderError::InvalidResponse("call succeeded without a value".into())
                    });
                }
                RetryState::Fail => {
                    return Err(last_error.unwrap_or_else(|| {
                        ProviderError::InvalidResponse("retry loop ended without a result".into())
                    }));
                }
            };
        }
    }
}

/// Sleep for `wait`, logging the remaining time at every 10-second mark and
/// during the final five seconds.
pub async fn countdown(agent: &str, wait: Duration) {
    let total = wait.as_secs();
    info!(agent, seconds = total, "Waiting before retry");

    let fraction = wait - Duration::from_secs(total);
    if !fraction.is_zero() {
        tokio::time::sleep(fraction).await;
    }

    for remaining in (1..=total).rev() {
        if remaining % 10 == 0 || remaining <= 5 {
            info!(agent, remaining, "Retrying in {remaining}s");
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    info!(agent, "Resuming");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextLimit;
    use std::cell::Cell;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            default_wait: Duration::from_secs(30),
            shrink_pause: Duration::from_millis(500),
        }
    }

    fn too_large() -> ProviderError {
        ProviderError::ApiError {
            status_code: 400,
            message: "maximum context length exceeded".into(),
        }
    }

    fn rate_limited() -> ProviderError {
        ProviderError::RateLimited {
            retry_after_secs: None,
            message: "Too many requests".into(),
        }
    }

    #[test]
    fn transitions() {
        let s = RetryState::initial();
        assert_eq!(s.clone().after_attempt(Ok(())), RetryState::Success);

        let failed = s.after_attempt(Err(FailureKind::ContextTooLarge));
        assert_eq!(
            failed.clone().decide(3, true),
            RetryState::ShrinkAndRetry { attempt: 0 }
        );
        assert_eq!(failed.decide(3, false), RetryState::Fail);

        let wait = Duration::from_secs(5);
        let limited = RetryState::ClassifyFailure {
            attempt: 2,
            kind: FailureKind::RateLimited { wait },
        };
        let next = limited.decide(3, true);
        assert_eq!(next, RetryState::WaitAndRetry { attempt: 2, wait });
        assert_eq!(next.retry(), RetryState::Attempting { attempt: 3 });

        let exhausted = RetryState::ClassifyFailure {
            attempt: 3,
            kind: FailureKind::RateLimited { wait },
        };
        assert_eq!(exhausted.decide(3, true), RetryState::Fail);

        let fatal = RetryState::ClassifyFailure {
            attempt: 0,
            kind: FailureKind::Fatal,
        };
        assert!(fatal.decide(3, true).is_terminal());
    }

    #[test]
    fn shrink_does_not_consume_a_slot() {
        assert_eq!(
            RetryState::ShrinkAndRetry { attempt: 1 }.retry(),
            RetryState::Attempting { attempt: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_retries_exactly_max_retries_times() {
        let controller = RetryController::new(policy(3));
        let mut window = ContextWindow::new(true, true, ContextLimit::new(20, 4));
        let calls = Cell::new(0u32);

        let result: Result<(), _> = controller
            .run("Claude", &mut window, |_| {
                calls.set(calls.get() + 1);
                async { Err(rate_limited()) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
        // one initial call plus three retries
        assert_eq!(calls.get(), 4);
        assert_eq!(window.limit(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn context_too_large_shrinks_without_using_retries() {
        // zero rate-limit retries: any success must come from shrinking
        let controller = RetryController::new(policy(0));
        let mut window = ContextWindow::new(true, true, ContextLimit::new(20, 4));
        let limits = std::cell::RefCell::new(Vec::new());

        let result = controller
            .run("ChatGPT", &mut window, |w| {
                limits.borrow_mut().push(w.limit());
                let outcome = if w.limit() > 7 {
                    Err(too_large())
                } else {
                    Ok("fits")
                };
                async move { outcome }
            })
            .await;

        assert_eq!(result.unwrap(), "fits");
        assert_eq!(*limits.borrow(), vec![20, 12, 7]);
        assert_eq!(window.limit(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn context_too_large_at_floor_fails() {
        let controller = RetryController::new(policy(3));
        let mut window = ContextWindow::new(true, true, ContextLimit::new(20, 4));
        let calls = Cell::new(0u32);

        let result: Result<(), _> = controller
            .run("Gemini", &mut window, |_| {
                calls.set(calls.get() + 1);
                async { Err(too_large()) }
            })
            .await;

        assert!(result.is_err());
        // 20, 12, 7, 4, then no further reduction
        assert_eq!(calls.get(), 4);
        assert_eq!(window.limit(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn context_too_large_without_adaptive_fails_immediately() {
        let controller = RetryController::new(policy(3));
        let mut window = ContextWindow::new(true, false, ContextLimit::new(20, 4));
        let calls = Cell::new(0u32);

        let result: Result<(), _> = controller
            .run("Gemini", &mut window, |_| {
                calls.set(calls.get() + 1);
                async { Err(too_large()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_is_not_retried() {
        let controller = RetryController::new(policy(3));
        let mut window = ContextWindow::new(true, true, ContextLimit::new(20, 4));
        let calls = Cell::new(0u32);

        let result: Result<(), _> = controller
            .run("ChatGPT", &mut window, |_| {
                calls.set(calls.get() + 1);
                async { Err(ProviderError::AuthenticationFailed("bad key".into())) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::AuthenticationFailed(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_one_rate_limit() {
        let controller = RetryController::new(policy(3));
        let mut window = ContextWindow::new(true, true, ContextLimit::new(20, 4));
        let calls = Cell::new(0u32);
        let started = tokio::time::Instant::now();

        let result = controller
            .run("Claude", &mut window, |_| {
                calls.set(calls.get() + 1);
                let outcome = if calls.get() == 1 {
                    Err(ProviderError::RateLimited {
                        retry_after_secs: None,
                        message: "Please retry after 12 seconds".into(),
                    })
                } else {
                    Ok(calls.get())
                };
                async move { outcome }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert!(started.elapsed() >= Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_sleeps_full_duration() {
        let started = tokio::time::Instant::now();
        countdown("Claude", Duration::from_millis(2500)).await;
        assert!(started.elapsed() >= Duration::from_millis(2500));
    }
}
