//! AirPrint advertisement via the privileged root helper
//!
//! The web app runs unprivileged; (re)publishing printer advertisements
//! and restarting the host are delegated to the `printerpal-root` helper
//! through a no-prompt sudo call. Re-ensures are rate limited by
//! [`EnsureLimiter`]: at most one ensure in flight process-wide, re-run
//! only when the printer set changed or the window elapsed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::command::run_cmd;
use crate::error::{PalError, PalResult};

/// Default root helper location, overridable via `PRINTERPAL_ROOT_HELPER`.
pub const DEFAULT_ROOT_HELPER: &str = "/usr/local/sbin/printerpal-root";

/// Re-ensure window when the printer set did not change.
pub const ENSURE_WINDOW: Duration = Duration::from_secs(600);

pub fn root_helper_path() -> String {
    std::env::var("PRINTERPAL_ROOT_HELPER").unwrap_or_else(|_| DEFAULT_ROOT_HELPER.to_string())
}

/// Ask the root helper to (re)publish AirPrint advertisements.
///
/// Returns the helper's trimmed stdout.
pub async fn ensure_airprint(timeout: Duration) -> PalResult<String> {
    let helper = root_helper_path();
    if !std::path::Path::new(&helper).exists() {
        return Err(PalError::NotFound(format!("Root helper not found at {helper}")));
    }
    let res = run_cmd(&["sudo", "-n", &helper, "ensure-airprint"], timeout, true).await?;
    Ok(res.stdout.trim().to_string())
}

/// Delegate a host restart to the root helper.
pub async fn restart_host() -> PalResult<String> {
    let helper = root_helper_path();
    if !std::path::Path::new(&helper).exists() {
        return Err(PalError::NotFound(format!("Root helper not found at {helper}")));
    }
    let res = run_cmd(&["sudo", "-n", &helper, "restart-host"], Duration::from_secs(5), true).await?;
    Ok(res.stdout.trim().to_string())
}

/// Monotonic time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock backed [`Clock`].
#[derive(Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    last_ensure: Option<Instant>,
    last_sig: String,
}

/// Rate limiter and mutual-exclusion guard for AirPrint re-ensures.
///
/// `begin` hands out at most one [`EnsureTicket`] at a time; a caller
/// finding the guard held gets `None` and skips the cycle instead of
/// blocking. A ticket that is dropped without [`EnsureTicket::commit`]
/// leaves the limiter state untouched, so a failed ensure is retried on
/// the next eligible cycle.
pub struct EnsureLimiter {
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<LimiterState>>,
}

impl EnsureLimiter {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            state: Arc::new(Mutex::new(LimiterState::default())),
        }
    }

    /// Try to start an ensure for the given printer-set signature.
    ///
    /// Returns `None` when another ensure is in flight, or when the
    /// signature is unchanged and the window has not elapsed.
    pub fn begin(&self, signature: &str) -> Option<EnsureTicket> {
        let guard = Arc::clone(&self.state).try_lock_owned().ok()?;
        let now = self.clock.now();
        if guard.last_sig == signature {
            if let Some(last) = guard.last_ensure {
                if now.duration_since(last) <= self.window {
                    return None;
                }
            }
        }
        Some(EnsureTicket {
            guard,
            signature: signature.to_string(),
            now,
        })
    }
}

impl Default for EnsureLimiter {
    fn default() -> Self {
        Self::new(ENSURE_WINDOW, Arc::new(MonotonicClock))
    }
}

/// Exclusive permission to run one ensure-operation.
pub struct EnsureTicket {
    guard: OwnedMutexGuard<LimiterState>,
    signature: String,
    now: Instant,
}

impl EnsureTicket {
    /// Record a successful ensure; future cycles with the same signature
    /// are suppressed until the window elapses.
    pub fn commit(mut self) {
        self.guard.last_ensure = Some(self.now);
        self.guard.last_sig = std::mem::take(&mut self.signature);
    }
}

/// Rate-limited, best-effort re-ensure.
///
/// Never fails the caller: errors are logged and swallowed.
pub async fn maybe_ensure(limiter: &EnsureLimiter, signature: &str) {
    let Some(ticket) = limiter.begin(signature) else {
        return;
    };
    match ensure_airprint(Duration::from_secs(45)).await {
        Ok(output) => {
            info!(signature, output = %output, "AirPrint ensure completed");
            ticket.commit();
        }
        Err(e) => {
            // Non-fatal: AirPrint may not be available in all deployments.
            warn!(error = %e, "AirPrint ensure failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Manually advanced clock for limiter tests
    struct TestClock {
        base: Instant,
        offset: StdMutex<Duration>,
    }

    impl TestClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: StdMutex::new(Duration::ZERO),
            }
        }

        fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }
    }

    fn limiter_with_clock() -> (EnsureLimiter, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new());
        (
            EnsureLimiter::new(Duration::from_secs(600), clock.clone()),
            clock,
        )
    }

    #[tokio::test]
    async fn test_first_ensure_allowed() {
        let (limiter, _clock) = limiter_with_clock();
        assert!(limiter.begin("A,B").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_ensure_skipped() {
        let (limiter, _clock) = limiter_with_clock();
        let ticket = limiter.begin("A").expect("first ticket");
        // Second trigger while the first is in flight: skipped, not queued
        assert!(limiter.begin("A").is_none());
        assert!(limiter.begin("B").is_none());
        drop(ticket);
        assert!(limiter.begin("A").is_some());
    }

    #[tokio::test]
    async fn test_same_signature_rate_limited() {
        let (limiter, clock) = limiter_with_clock();
        limiter.begin("A").unwrap().commit();

        clock.advance(Duration::from_secs(30));
        assert!(limiter.begin("A").is_none());

        clock.advance(Duration::from_secs(600));
        assert!(limiter.begin("A").is_some());
    }

    #[tokio::test]
    async fn test_signature_change_bypasses_window() {
        let (limiter, clock) = limiter_with_clock();
        limiter.begin("A").unwrap().commit();
        clock.advance(Duration::from_secs(1));
        assert!(limiter.begin("A,B").is_some());
    }

    #[tokio::test]
    async fn test_failed_ensure_not_committed() {
        let (limiter, clock) = limiter_with_clock();
        // Dropped without commit: state untouched
        drop(limiter.begin("A").unwrap());
        clock.advance(Duration::from_secs(1));
        assert!(limiter.begin("A").is_some());
    }

    #[tokio::test]
    async fn test_only_one_ticket_across_tasks() {
        let (limiter, _clock) = limiter_with_clock();
        let limiter = Arc::new(limiter);

        let ticket = limiter.begin("A").expect("holder");
        let mut handles = Vec::new();
        for _ in 0..8 {
            let l = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { l.begin("A").is_some() }));
        }
        for h in handles {
            assert!(!h.await.unwrap(), "no task may obtain a second ticket");
        }
        drop(ticket);
    }
}
