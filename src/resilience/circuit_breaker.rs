//! Circuit breaker for inference dependencies.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: one trial call probes whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open:      consecutive_failures >= failure_threshold
//! Open → Half-Open:   a call arrives after recovery_timeout (it becomes the trial)
//! Half-Open → Closed: consecutive_successes >= success_threshold
//! Half-Open → Open:   trial fails or times out
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single trial in Half-Open; concurrent callers are rejected until it resolves
//! - The state lock is never held while the protected operation runs
//! - Every transition bumps a generation; outcomes of calls admitted under an
//!   older generation only touch the lifetime totals
//! - A call abandoned by its caller is not counted at all

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::resilience::error::{CallError, CircuitOpenError};
use crate::resilience::timeouts::{run_with_deadline, Deadline};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used by the `circuit_breaker_state` gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Breaker thresholds and deadlines. Immutable once a breaker is built.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip Closed → Open.
    pub failure_threshold: u32,

    /// Per-call deadline in seconds. Exceeding it counts as a timeout failure.
    pub timeout_seconds: f64,

    /// Minimum time in Open before a trial call is admitted.
    pub recovery_timeout_seconds: f64,

    /// Consecutive trial successes required to close from Half-Open.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            timeout_seconds: 5.0,
            recovery_timeout_seconds: 30.0,
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_timeout_seconds(mut self, secs: f64) -> Self {
        self.timeout_seconds = secs;
        self
    }

    pub fn with_recovery_timeout_seconds(mut self, secs: f64) -> Self {
        self.recovery_timeout_seconds = secs;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Per-call deadline. Invalid values collapse to zero.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds).unwrap_or(Duration::ZERO)
    }

    /// Minimum Open duration. Invalid values collapse to zero.
    pub fn recovery_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.recovery_timeout_seconds).unwrap_or(Duration::ZERO)
    }
}

/// Point-in-time view of a breaker, served by the status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_timeouts: u64,
    pub total_rejections: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub seconds_in_state: f64,
    pub uptime_seconds: f64,
}

/// Mutable control state and counters, guarded by one lock.
#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_state_change_at: Instant,
    generation: u64,
    trial_in_flight: bool,

    total_requests: u64,
    total_successes: u64,
    total_failures: u64,
    total_timeouts: u64,
    total_rejections: u64,
}

impl Inner {
    fn transition(&mut self, to: CircuitState, now: Instant) {
        self.state = to;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.last_state_change_at = now;
        self.generation += 1;
        self.trial_in_flight = false;
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Success,
    Failure,
    Timeout,
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
        }
    }
}

/// A state change observed while holding the lock, logged after release.
/// The state gauge is set under the lock so it follows transition order.
struct Transition {
    from: CircuitState,
    to: CircuitState,
    failures: u32,
}

/// Circuit breaker guarding a single named dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    created_at: Instant,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let now = Instant::now();
        let breaker = Self {
            name: name.into(),
            config,
            created_at: now,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_state_change_at: now,
                generation: 0,
                trial_in_flight: false,
                total_requests: 0,
                total_successes: 0,
                total_failures: 0,
                total_timeouts: 0,
                total_rejections: 0,
            }),
        };
        metrics::record_breaker_state(&breaker.name, CircuitState::Closed);
        breaker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. Does not perform the Open → Half-Open transition;
    /// that only happens when a call is attempted.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `operation` through the breaker under the configured deadline.
    ///
    /// Dropping the returned future before it resolves abandons the call
    /// without recording an outcome.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute(None, operation).await
    }

    /// Like [`call`](Self::call), but the caller may abandon the call by
    /// cancelling `cancel`, which yields [`CallError::Cancelled`].
    pub async fn call_cancellable<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute(Some(cancel), operation).await
    }

    async fn execute<F, Fut, T, E>(
        &self,
        cancel: Option<&CancellationToken>,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.admit()?;
        let limit = self.config.timeout();

        match run_with_deadline(limit, cancel, operation()).await {
            Deadline::Completed(Ok(value)) => {
                permit.settle(Outcome::Success);
                Ok(value)
            }
            Deadline::Completed(Err(e)) => {
                permit.settle(Outcome::Failure);
                Err(CallError::Operation(e))
            }
            Deadline::Elapsed => {
                permit.settle(Outcome::Timeout);
                Err(CallError::Timeout {
                    breaker: self.name.clone(),
                    after: limit,
                })
            }
            Deadline::Cancelled => {
                tracing::debug!(breaker = %self.name, "Call cancelled by caller, not counted");
                Err(CallError::Cancelled)
            }
        }
    }

    /// Decide whether a call may proceed. Never awaits.
    fn admit(&self) -> Result<Permit<'_>, CircuitOpenError> {
        let now = Instant::now();
        let mut transition = None;

        let decision = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => Ok((inner.generation, false)),
                CircuitState::Open
                    if now.duration_since(inner.last_state_change_at)
                        >= self.config.recovery_timeout() =>
                {
                    inner.transition(CircuitState::HalfOpen, now);
                    inner.trial_in_flight = true;
                    metrics::record_breaker_state(&self.name, inner.state);
                    transition = Some(Transition {
                        from: CircuitState::Open,
                        to: CircuitState::HalfOpen,
                        failures: 0,
                    });
                    Ok((inner.generation, true))
                }
                CircuitState::HalfOpen if !inner.trial_in_flight => {
                    inner.trial_in_flight = true;
                    Ok((inner.generation, true))
                }
                CircuitState::Open | CircuitState::HalfOpen => {
                    inner.total_requests += 1;
                    inner.total_rejections += 1;
                    Err(now.duration_since(inner.last_state_change_at))
                }
            }
        };

        if let Some(t) = transition {
            self.report_transition(t);
        }

        match decision {
            Ok((generation, trial)) => Ok(Permit {
                breaker: self,
                generation,
                trial,
                settled: false,
            }),
            Err(open_for) => {
                tracing::debug!(breaker = %self.name, open_for = ?open_for, "Call rejected, circuit open");
                metrics::record_rejection(&self.name);
                Err(CircuitOpenError {
                    breaker: self.name.clone(),
                    open_for,
                })
            }
        }
    }

    /// Commit the outcome of an admitted call.
    fn record(&self, generation: u64, outcome: Outcome) {
        let now = Instant::now();
        let mut transition = None;

        {
            let mut inner = self.lock();
            inner.total_requests += 1;
            match outcome {
                Outcome::Success => inner.total_successes += 1,
                Outcome::Failure => inner.total_failures += 1,
                Outcome::Timeout => {
                    inner.total_failures += 1;
                    inner.total_timeouts += 1;
                }
            }

            if inner.generation == generation {
                let from = inner.state;
                let mut failures = 0;
                match outcome {
                    Outcome::Success => {
                        inner.consecutive_successes += 1;
                        inner.consecutive_failures = 0;
                        if from == CircuitState::HalfOpen {
                            inner.trial_in_flight = false;
                            if inner.consecutive_successes >= self.config.success_threshold {
                                inner.transition(CircuitState::Closed, now);
                            }
                        }
                    }
                    Outcome::Failure | Outcome::Timeout => {
                        inner.consecutive_failures += 1;
                        inner.consecutive_successes = 0;
                        let trip = match from {
                            CircuitState::HalfOpen => true,
                            CircuitState::Closed => {
                                inner.consecutive_failures >= self.config.failure_threshold
                            }
                            CircuitState::Open => false,
                        };
                        if trip {
                            failures = inner.consecutive_failures;
                            inner.transition(CircuitState::Open, now);
                        }
                    }
                }
                if inner.state != from {
                    metrics::record_breaker_state(&self.name, inner.state);
                    transition = Some(Transition {
                        from,
                        to: inner.state,
                        failures,
                    });
                }
            }
        }

        metrics::record_outcome(&self.name, outcome.label());
        if let Some(t) = transition {
            self.report_transition(t);
        }
    }

    /// Release a trial slot held by a call that was abandoned.
    fn abandon(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.trial_in_flight = false;
        }
    }

    /// Force the breaker back to Closed for manual recovery.
    ///
    /// Clears control state but keeps the lifetime totals, which are
    /// monitoring data.
    pub fn reset(&self) {
        let from = {
            let mut inner = self.lock();
            let from = inner.state;
            inner.transition(CircuitState::Closed, Instant::now());
            metrics::record_breaker_state(&self.name, inner.state);
            from
        };
        tracing::info!(breaker = %self.name, from = %from, "Circuit breaker reset");
    }

    /// Force the breaker Open, e.g. to drain a dependency during maintenance.
    pub fn force_open(&self) {
        let from = {
            let mut inner = self.lock();
            let from = inner.state;
            inner.transition(CircuitState::Open, Instant::now());
            metrics::record_breaker_state(&self.name, inner.state);
            from
        };
        tracing::warn!(breaker = %self.name, from = %from, "Circuit breaker forced open");
    }

    /// Snapshot of committed counters. Never waits on in-flight calls.
    pub fn stats(&self) -> BreakerStats {
        let now = Instant::now();
        let inner = self.lock();
        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            total_requests: inner.total_requests,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_timeouts: inner.total_timeouts,
            total_rejections: inner.total_rejections,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            seconds_in_state: now.duration_since(inner.last_state_change_at).as_secs_f64(),
            uptime_seconds: now.duration_since(self.created_at).as_secs_f64(),
        }
    }

    fn report_transition(&self, t: Transition) {
        match t.to {
            CircuitState::Open => {
                tracing::warn!(
                    breaker = %self.name,
                    failures = t.failures,
                    from = %t.from,
                    "Circuit breaker opening"
                );
            }
            CircuitState::HalfOpen => {
                tracing::info!(breaker = %self.name, "Circuit breaker entering half-open, admitting trial call");
            }
            CircuitState::Closed => {
                tracing::info!(breaker = %self.name, from = %t.from, "Circuit breaker closing after successful recovery");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission ticket for one call.
///
/// Dropping it without settling (the caller went away) releases any trial
/// slot and records nothing.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.record(self.generation, outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.abandon(self.generation);
        }
    }
}
