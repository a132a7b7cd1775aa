//! The count-based circuit state machine.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

/// The three states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Requests pass through; failures accumulate.
    Closed = 0,
    /// Requests are rejected without dispatch.
    Open = 1,
    /// Exactly one trial request is permitted.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// The mutable state guarded by the breaker's mutex. Transitions are O(1).
pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: std::sync::Arc<AtomicU8>,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Set while a half-open trial has been handed out but not yet resolved,
    /// so a second concurrent admission attempt during half-open is rejected.
    half_open_trial_in_flight: bool,
}

impl Circuit {
    pub(crate) fn new(state_atomic: std::sync::Arc<AtomicU8>) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            consecutive_failures: 0,
            opened_at: None,
            half_open_trial_in_flight: false,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    fn set_state(&mut self, state: CircuitState) {
        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
    }

    /// Called before dispatch. Returns `true` if the call may proceed,
    /// performing the Open -> HalfOpen transition if the cooldown elapsed.
    pub(crate) fn try_admit(&mut self, cooldown: std::time::Duration) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|t| t.elapsed() >= cooldown)
                    .unwrap_or(false);
                if elapsed {
                    self.set_state(CircuitState::HalfOpen);
                    self.half_open_trial_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_trial_in_flight {
                    false
                } else {
                    self.half_open_trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Records a successful outcome.
    pub(crate) fn on_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                self.consecutive_failures = 0;
                self.opened_at = None;
                self.half_open_trial_in_flight = false;
                self.set_state(CircuitState::Closed);
            }
            CircuitState::Open => {
                // Stray success report after the window already flipped; ignore.
            }
        }
    }

    /// Records a failed outcome. Returns `true` if this call caused a
    /// Closed -> Open or HalfOpen -> Open transition.
    pub(crate) fn on_failure(&mut self, failure_threshold: u32) -> bool {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= failure_threshold {
                    self.opened_at = Some(Instant::now());
                    self.set_state(CircuitState::Open);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                self.consecutive_failures = failure_threshold.max(1);
                self.opened_at = Some(Instant::now());
                self.half_open_trial_in_flight = false;
                self.set_state(CircuitState::Open);
                true
            }
            CircuitState::Open => false,
        }
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
