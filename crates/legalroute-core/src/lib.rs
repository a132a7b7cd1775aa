//! Shared infrastructure for the legalroute serving tier.
//!
//! Every component crate (health monitor, circuit breaker, admission gate,
//! cache, retrieval index) emits its own event type through the listener
//! system defined here, so the binary crate can wire tracing/metrics once
//! instead of each component reinventing observability plumbing.

pub mod events;

pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
