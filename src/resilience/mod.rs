//! Resilience primitives shared by guarded capabilities: a circuit breaker
//! per external provider, plus bounded retry with exponential backoff.

pub mod retry;

pub use retry::{RetryPolicy, retry_with_backoff};

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::ResilienceConfig;
use crate::embedding::ProviderError;

/// Breaker lifecycle: closed passes calls through, open rejects them
/// outright, half-open admits exactly one trial call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_until: Option<Instant>,
    /// Guards the half-open window: only one trial call may be in flight.
    trial_in_flight: bool,
}

/// Circuit breaker guarding one external capability.
///
/// The breaker's interior state is the only shared-mutable piece of this
/// crate's concurrency model; it lives behind a `parking_lot::Mutex` and
/// every transition happens inside short critical sections.
pub struct CircuitBreaker {
    name: &'static str,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(name: &'static str, config: &ResilienceConfig) -> Self {
        Self {
            name,
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: config.reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_until: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Current state, advancing open → half-open when the cooldown has
    /// elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        inner.state
    }

    /// Run `op` under breaker accounting.
    ///
    /// Open circuit: the operation is not attempted and
    /// [`ProviderError::Unavailable`] is returned immediately. Half-open:
    /// a single trial call is admitted; its outcome decides the next
    /// state. Timeouts count as failures like any other transient error.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        if !self.try_acquire() {
            return Err(ProviderError::Unavailable(format!(
                "circuit for {} is open",
                self.name
            )));
        }

        // If the caller's future is dropped mid-call (outer timeout,
        // cancellation), release the half-open trial slot so the breaker
        // does not wedge.
        let mut guard = TrialGuard {
            breaker: self,
            armed: true,
        };
        let result = op().await;
        guard.armed = false;
        match &result {
            Ok(_) => self.record_success(),
            Err(err) => self.record_failure(err),
        }
        result
    }

    /// [`Self::execute`] with a degraded-mode fallback invoked on any
    /// failure, including an open circuit.
    pub async fn execute_with_fallback<T, F, Fut, FB>(
        &self,
        op: F,
        fallback: FB,
    ) -> Result<T, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
        FB: FnOnce(ProviderError) -> Result<T, ProviderError>,
    {
        match self.execute(op).await {
            Ok(value) => Ok(value),
            Err(err) => fallback(err),
        }
    }

    /// Whether a call may proceed right now. Advances state transitions
    /// and claims the half-open trial slot.
    fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    false
                } else {
                    inner.trial_in_flight = true;
                    true
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            info!(capability = self.name, "circuit closed after successful trial");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_until = None;
        inner.trial_in_flight = false;
    }

    fn record_failure(&self, err: &ProviderError) {
        // Invalid input says nothing about provider health.
        if !err.is_transient() {
            let mut inner = self.inner.lock();
            inner.trial_in_flight = false;
            return;
        }

        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                warn!(capability = self.name, "trial call failed, circuit re-opened");
                self.open(&mut inner);
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        capability = self.name,
                        failures = inner.consecutive_failures,
                        "failure threshold reached, circuit opened"
                    );
                    self.open(&mut inner);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_until = Some(Instant::now() + self.reset_timeout);
        inner.trial_in_flight = false;
    }

    fn release_trial(&self) {
        self.inner.lock().trial_in_flight = false;
    }

    fn advance(&self, inner: &mut BreakerInner) {
        if inner.state == CircuitState::Open
            && inner.opened_until.is_some_and(|until| Instant::now() >= until)
        {
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
        }
    }
}

struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.release_trial();
        }
    }
}
