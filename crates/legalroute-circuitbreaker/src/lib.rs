//! Per-backend circuit breaker.
//!
//! Each inference backend (GPU, CPU) gets one [`CircuitBreaker`] instance.
//! Unlike a generic `tower::Layer`, this breaker is consulted explicitly by
//! the routing decision engine: an admission check before dispatch, and an
//! outcome report (`on_success`/`on_failure`) after the forwarder returns.
//! That split is what lets the engine combine the breaker's verdict with
//! health and admission-gate signals before deciding whether to even attempt
//! the backend.
//!
//! ## States
//! - **Closed**: requests pass through; every failure increments a counter,
//!   every success resets it.
//! - **Open**: requests are rejected without dispatch until the cooldown
//!   elapses.
//! - **Half-Open**: exactly one trial request is permitted; success closes
//!   the circuit, failure reopens it with a fresh cooldown.
//!
//! ## Example
//!
//! ```rust
//! use legalroute_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::builder()
//!         .name("gpu")
//!         .failure_threshold(5)
//!         .cooldown(Duration::from_secs(30))
//!         .build(),
//! );
//!
//! if breaker.try_admit().is_ok() {
//!     // dispatch to the backend, then report the outcome:
//!     breaker.on_success();
//! }
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! ```

mod circuit;
mod config;
mod error;

pub use circuit::CircuitState;
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;

use circuit::Circuit;
use legalroute_core::{EventListeners, ResilienceEvent};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Event emitted on a circuit state transition.
#[derive(Debug, Clone)]
pub struct CircuitBreakerEvent {
    /// Name of the breaker instance (typically the backend id).
    pub name: String,
    pub from: CircuitState,
    pub to: CircuitState,
    timestamp: Instant,
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        "state_transition"
    }

    fn timestamp(&self) -> Instant {
        self.timestamp
    }

    fn pattern_name(&self) -> &str {
        &self.name
    }
}

/// A per-backend, count-based circuit breaker.
///
/// Cloning shares the underlying state (`Arc`), matching how the routing
/// engine holds one breaker per backend across concurrently handled
/// requests.
#[derive(Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    circuit: Arc<Mutex<Circuit>>,
    state_atomic: Arc<AtomicU8>,
    listeners: Arc<EventListeners<CircuitBreakerEvent>>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker in the closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            circuit: Arc::new(Mutex::new(Circuit::new(Arc::clone(&state_atomic)))),
            config: Arc::new(config),
            state_atomic,
            listeners: Arc::new(EventListeners::new()),
        }
    }

    /// Registers a listener invoked on every state transition.
    pub fn with_listener<L>(self, listener: L) -> Self
    where
        L: legalroute_core::EventListener<CircuitBreakerEvent> + 'static,
    {
        // EventListeners is behind an Arc so we rebuild it with the new listener added.
        let mut listeners = EventListeners::new();
        listeners.add(listener);
        Self {
            listeners: Arc::new(listeners),
            ..self
        }
    }

    /// Returns the current state without taking a lock.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Attempts to admit a call. On `Open`, returns
    /// [`CircuitBreakerError::Open`] unless the cooldown has elapsed, in
    /// which case exactly one caller transitions the breaker to `HalfOpen`
    /// and is admitted.
    pub fn try_admit(&self) -> Result<(), CircuitBreakerError> {
        let before = self.state();
        let admitted = {
            let mut circuit = self.circuit.lock().expect("circuit breaker mutex poisoned");
            circuit.try_admit(self.config.cooldown())
        };
        let after = self.state();
        if before != after {
            self.emit_transition(before, after);
        }
        if admitted {
            Ok(())
        } else {
            #[cfg(feature = "metrics")]
            metrics::counter!("circuit_breaker_calls_rejected_total", "breaker" => self.config.name.clone()).increment(1);
            Err(CircuitBreakerError::Open)
        }
    }

    /// Records a successful outcome.
    pub fn on_success(&self) {
        let before = self.state();
        {
            let mut circuit = self.circuit.lock().expect("circuit breaker mutex poisoned");
            circuit.on_success();
        }
        let after = self.state();
        if before != after {
            self.emit_transition(before, after);
        }
        #[cfg(feature = "metrics")]
        metrics::counter!("circuit_breaker_calls_success_total", "breaker" => self.config.name.clone()).increment(1);
    }

    /// Records a failed outcome (5xx, connection error, or timeout).
    pub fn on_failure(&self) {
        let before = self.state();
        {
            let mut circuit = self.circuit.lock().expect("circuit breaker mutex poisoned");
            circuit.on_failure(self.config.failure_threshold());
        }
        let after = self.state();
        if before != after {
            self.emit_transition(before, after);
        }
        #[cfg(feature = "metrics")]
        metrics::counter!("circuit_breaker_calls_failure_total", "breaker" => self.config.name.clone()).increment(1);
    }

    fn emit_transition(&self, from: CircuitState, to: CircuitState) {
        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.config.name, ?from, ?to, "circuit breaker state transition");
        #[cfg(feature = "metrics")]
        metrics::gauge!("circuit_breaker_state", "breaker" => self.config.name.clone()).set(to as u8 as f64);
        self.listeners.emit(&CircuitBreakerEvent {
            name: self.config.name.clone(),
            from,
            to,
            timestamp: Instant::now(),
        });
    }
}
