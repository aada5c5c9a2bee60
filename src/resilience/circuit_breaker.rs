//! Circuit breaker for the external dependency.
//!
//! # States
//! - Closed: calls pass through, consecutive failures are counted
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: cooldown elapsed, the next check lets a probe through
//!
//! # State Transitions
//! ```text
//! Closed → Open:      failure count reaches threshold
//! Open → Open:        failure recorded while open (re-arms the cooldown)
//! Open → Closed:      first check after cooldown (count reset, probe admitted)
//! any → Closed:       success, or a reachable dependency returning bad data
//! ```
//!
//! Half-Open is not stored. It is an Open state whose cooldown has run out and
//! which collapses to `Closed { 0 }` on the next check. A probe that fails
//! therefore only brings the count to 1; it takes `threshold` failures in a
//! row to open the circuit again.
//!
//! Probes are not serialized: callers that check concurrently right after the
//! cooldown all see a closed circuit. At most the number of in-flight callers
//! leak through before failures re-open it.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Stored breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant, consecutive_failures: u32 },
}

impl BreakerState {
    pub const CLOSED: BreakerState = BreakerState::Closed { consecutive_failures: 0 };
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerEvent {
    /// A caller asks whether it may proceed.
    Check,
    /// Transport error, timeout or non-2xx status.
    Failure,
    /// Call succeeded.
    Success,
    /// The dependency answered but its data was unusable.
    Reset,
}

/// Observed status, including the implicit half-open phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitStatus::Closed => "closed",
            CircuitStatus::Open => "open",
            CircuitStatus::HalfOpen => "half_open",
        }
    }
}

/// Threshold and cooldown for one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl BreakerPolicy {
    fn cooled_down(&self, opened_at: Instant, now: Instant) -> bool {
        opened_at
            .checked_add(self.cooldown)
            .is_some_and(|until| now >= until)
    }
}

impl From<&CircuitBreakerConfig> for BreakerPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            cooldown: config.cooldown(),
        }
    }
}

/// Pure transition function of the breaker.
pub fn transition(
    state: BreakerState,
    event: BreakerEvent,
    now: Instant,
    policy: &BreakerPolicy,
) -> BreakerState {
    match (state, event) {
        (_, BreakerEvent::Success | BreakerEvent::Reset) => BreakerState::CLOSED,

        (BreakerState::Closed { consecutive_failures }, BreakerEvent::Failure) => {
            let failures = consecutive_failures.saturating_add(1);
            if failures >= policy.failure_threshold {
                BreakerState::Open {
                    opened_at: now,
                    consecutive_failures: failures,
                }
            } else {
                BreakerState::Closed {
                    consecutive_failures: failures,
                }
            }
        }
        (BreakerState::Open { consecutive_failures, .. }, BreakerEvent::Failure) => {
            BreakerState::Open {
                opened_at: now,
                consecutive_failures: consecutive_failures.saturating_add(1),
            }
        }

        (BreakerState::Open { opened_at, .. }, BreakerEvent::Check)
            if policy.cooled_down(opened_at, now) =>
        {
            BreakerState::CLOSED
        }
        (state, BreakerEvent::Check) => state,
    }
}

/// Failure-counting circuit breaker guarding a single named dependency.
pub struct CircuitBreaker {
    name: String,
    policy: BreakerPolicy,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, policy: BreakerPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            state: Mutex::new(BreakerState::CLOSED),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(name, BreakerPolicy::from(config))
    }

    fn apply(&self, event: BreakerEvent) -> BreakerState {
        let now = Instant::now();
        let mut state = self.state.lock();
        let previous = *state;
        *state = transition(previous, event, now, &self.policy);
        let current = *state;
        drop(state);

        match (previous, current) {
            (BreakerState::Closed { .. }, BreakerState::Open { consecutive_failures, .. }) => {
                tracing::warn!(
                    dependency = %self.name,
                    failures = consecutive_failures,
                    cooldown_secs = self.policy.cooldown.as_secs(),
                    "Circuit tripped: open"
                );
                metrics::record_circuit_transition("open");
            }
            (BreakerState::Open { .. }, BreakerState::Closed { .. }) => {
                if event == BreakerEvent::Check {
                    tracing::info!(dependency = %self.name, "Circuit half-open: allowing a probe request");
                } else {
                    tracing::info!(dependency = %self.name, "Circuit closed");
                }
                metrics::record_circuit_transition("closed");
            }
            _ => {}
        }
        current
    }

    /// Whether calls must be short-circuited right now.
    ///
    /// Once the cooldown has elapsed this resets the breaker and returns false.
    pub fn is_open(&self) -> bool {
        let open = matches!(self.apply(BreakerEvent::Check), BreakerState::Open { .. });
        if open {
            tracing::debug!(dependency = %self.name, "Circuit open: blocking request");
        }
        open
    }

    pub fn record_failure(&self) {
        self.apply(BreakerEvent::Failure);
    }

    pub fn record_success(&self) {
        self.apply(BreakerEvent::Success);
    }

    /// Clear the failure count without counting a success or failure.
    pub fn reset(&self) {
        self.apply(BreakerEvent::Reset);
    }

    /// Current status; does not mutate state.
    pub fn status(&self) -> CircuitStatus {
        match *self.state.lock() {
            BreakerState::Closed { .. } => CircuitStatus::Closed,
            BreakerState::Open { opened_at, .. } => {
                if self.policy.cooled_down(opened_at, Instant::now()) {
                    CircuitStatus::HalfOpen
                } else {
                    CircuitStatus::Open
                }
            }
        }
    }

    pub fn failure_count(&self) -> u32 {
        match *self.state.lock() {
            BreakerState::Closed { consecutive_failures }
            | BreakerState::Open { consecutive_failures, .. } => consecutive_failures,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
