//! Circuit breaker guarding one remote operation.
//!
//! State machine: Closed -> Open -> `HalfOpen` -> Closed | Open
//!
//! - **Closed**: calls run; each failure increments the counter. Reaching
//!   `failure_threshold` opens the circuit.
//! - **Open**: calls are rejected without running until `reset_timeout`
//!   has elapsed since the circuit opened.
//! - **`HalfOpen`**: exactly one trial call runs. Success closes the circuit
//!   and zeroes the counter; failure reopens it and restarts the cooldown.
//!
//! One instance guards exactly one logical operation.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::ConfigError;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Cooldown before a trial call is allowed.
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
        }
    }
}

impl BreakerConfig {
    #[must_use]
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    /// # Errors
    ///
    /// [`ConfigError::ZeroFailureThreshold`]: a zero threshold would open
    /// the circuit on every failure count, including none.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        Ok(())
    }
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    /// The call was rejected without running the operation.
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },
    /// The operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitError<E> {
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitError::Open { .. })
    }

    /// The operation's own error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitError::Inner(err) => Some(err),
            CircuitError::Open { .. } => None,
        }
    }
}

/// Callback invoked after each transition with `(from, to)`.
pub type StateListener = Box<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

struct BreakerInner {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    /// Bumped on every state change. A call settles only against the
    /// generation it was admitted in.
    generation: u64,
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
    listener: Option<StateListener>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("failures", &inner.failures)
            .finish_non_exhaustive()
    }
}

type Transition = Option<(CircuitState, CircuitState)>;

impl CircuitBreaker {
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
                trial_in_flight: false,
                generation: 0,
            }),
            listener: None,
        }
    }

    /// Creates a breaker that reports every transition to `listener`.
    #[must_use]
    pub fn with_listener(
        name: impl Into<String>,
        config: BreakerConfig,
        listener: impl Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    ) -> Self {
        Self {
            listener: Some(Box::new(listener)),
            ..Self::new(name, config)
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. An open circuit whose cooldown has elapsed still
    /// reports `Open` until the next call moves it to `HalfOpen`.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failures
    }

    /// Forces the circuit closed and zeroes the counter.
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            inner.trial_in_flight = false;
            Self::close(&mut inner)
        };
        self.notify(transition);
    }

    /// Runs `op` if the circuit allows it.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitError::Open`] without running `op` while the circuit
    /// is open (or a half-open trial is already running), and
    /// [`CircuitError::Inner`] when `op` fails.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut permit = self.acquire()?;
        let result = op().await;
        permit.settled = true;
        self.settle(&permit, result.is_ok());
        result.map_err(CircuitError::Inner)
    }

    fn acquire<E>(&self) -> Result<Permit<'_>, CircuitError<E>> {
        let (trial, generation, transition) = {
            let mut inner = self.inner.lock();
            let (trial, transition) = match inner.state {
                CircuitState::Closed => (false, None),
                CircuitState::Open => {
                    let cooled = inner
                        .opened_at
                        .is_some_and(|at| at.elapsed() >= self.config.reset_timeout());
                    if !cooled {
                        drop(inner);
                        return Err(self.reject());
                    }
                    inner.state = CircuitState::HalfOpen;
                    inner.generation += 1;
                    inner.trial_in_flight = true;
                    (true, Some((CircuitState::Open, CircuitState::HalfOpen)))
                }
                CircuitState::HalfOpen => {
                    if inner.trial_in_flight {
                        drop(inner);
                        return Err(self.reject());
                    }
                    inner.trial_in_flight = true;
                    (true, None)
                }
            };
            (trial, inner.generation, transition)
        };
        self.notify(transition);
        Ok(Permit {
            breaker: self,
            trial,
            generation,
            settled: false,
        })
    }

    fn reject<E>(&self) -> CircuitError<E> {
        warn!(breaker = %self.name, "circuit open, rejecting call");
        CircuitError::Open {
            name: self.name.clone(),
        }
    }

    /// Applies a finished call's outcome.
    ///
    /// Results from calls admitted before the last state change are
    /// ignored: a slow call let in while Closed cannot close an Open
    /// circuit, and only the half-open trial can settle `HalfOpen`.
    fn settle(&self, permit: &Permit<'_>, success: bool) {
        let transition = {
            let mut inner = self.inner.lock();
            if inner.generation != permit.generation {
                return;
            }
            if permit.trial {
                inner.trial_in_flight = false;
            }
            if success {
                Self::close(&mut inner)
            } else {
                inner.failures = inner.failures.saturating_add(1);
                match inner.state {
                    CircuitState::HalfOpen => Some(Self::open(&mut inner)),
                    CircuitState::Closed if inner.failures >= self.config.failure_threshold => {
                        Some(Self::open(&mut inner))
                    }
                    _ => None,
                }
            }
        };
        self.notify(transition);
    }

    /// Success re-enters Closed, the only place the counter is zeroed.
    fn close(inner: &mut BreakerInner) -> Transition {
        let from = inner.state;
        inner.failures = 0;
        inner.opened_at = None;
        if from == CircuitState::Closed {
            return None;
        }
        inner.state = CircuitState::Closed;
        inner.generation += 1;
        Some((from, CircuitState::Closed))
    }

    fn open(inner: &mut BreakerInner) -> (CircuitState, CircuitState) {
        let from = inner.state;
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.generation += 1;
        (from, CircuitState::Open)
    }

    fn notify(&self, transition: Transition) {
        let Some((from, to)) = transition else {
            return;
        };
        match to {
            CircuitState::Open => warn!(breaker = %self.name, %from, "circuit opened"),
            CircuitState::HalfOpen => info!(breaker = %self.name, "circuit half-open, allowing trial call"),
            CircuitState::Closed => info!(breaker = %self.name, %from, "circuit closed"),
        }
        if let Some(listener) = &self.listener {
            listener(from, to);
        }
    }
}

/// Admission for one call. A half-open trial dropped before completing
/// (e.g. its future was cancelled) frees the trial slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    generation: u64,
    settled: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            let mut inner = self.breaker.inner.lock();
            if inner.generation == self.generation {
                inner.trial_in_flight = false;
            }
        }
    }
}
