//! Routing decision engine: chooses between the GPU and CPU backends per
//! request and owns the single-hop fallback rule.

use crate::forwarder::{BackendForwarder, BackendInferRequest, ForwardError, ForwardOutcome};
use legalroute_bulkhead::AdmissionGate;
use legalroute_circuitbreaker::{CircuitBreaker, CircuitState};
use legalroute_healthcheck::HealthMonitor;
use reqwest::header::HeaderMap;
use std::sync::Arc;

/// Identifies which backend ultimately served (or tried to serve) a
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendId {
    Gpu,
    Cpu,
}

impl BackendId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Gpu => "gpu",
            BackendId::Cpu => "cpu",
        }
    }
}

/// Why a request did not end up on the GPU backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    UserPreference,
    CircuitOpen,
    Unhealthy,
    QueueFull,
    GpuError,
    GpuFailed,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::UserPreference => "user_preference",
            FallbackReason::CircuitOpen => "circuit_open",
            FallbackReason::Unhealthy => "unhealthy",
            FallbackReason::QueueFull => "queue_full",
            FallbackReason::GpuError => "gpu_error",
            FallbackReason::GpuFailed => "gpu_failed",
        }
    }
}

/// Everything one backend needs to be dispatched to and monitored.
pub struct BackendHandle {
    pub forwarder: BackendForwarder,
    pub breaker: CircuitBreaker,
    pub health: Option<Arc<HealthMonitor>>,
    pub gate: Option<AdmissionGate>,
}

/// The terminal result of routing one request: which backend served it
/// (or attempted to), whether a fallback hop happened, and the response or
/// error to hand back to the caller.
pub struct DispatchOutcome {
    pub backend: BackendId,
    pub fallback_reason: Option<FallbackReason>,
    pub result: Result<String, DispatchError>,
}

#[derive(Debug, Clone)]
pub enum DispatchError {
    Timeout,
    Unreachable,
    ServerError { status: reqwest::StatusCode, body: String },
}

/// Owns both backend handles and the fallback policy between them.
pub struct RoutingEngine {
    gpu: BackendHandle,
    cpu: BackendHandle,
}

impl RoutingEngine {
    pub fn new(gpu: BackendHandle, cpu: BackendHandle) -> Self {
        Self { gpu, cpu }
    }

    pub fn gpu_breaker(&self) -> &CircuitBreaker {
        &self.gpu.breaker
    }

    pub fn cpu_breaker(&self) -> &CircuitBreaker {
        &self.cpu.breaker
    }

    pub fn gpu_gate(&self) -> Option<&AdmissionGate> {
        self.gpu.gate.as_ref()
    }

    pub fn gpu_health(&self) -> Option<&Arc<HealthMonitor>> {
        self.gpu.health.as_ref()
    }

    /// Routes one request. `prefer_gpu = false` sends it straight to CPU
    /// with no further fallback, per the caller-override rule.
    pub async fn dispatch(
        &self,
        prompt: &str,
        max_tokens: u32,
        model: Option<String>,
        query: &str,
        headers: &HeaderMap,
        prefer_gpu: bool,
    ) -> DispatchOutcome {
        if !prefer_gpu {
            let result = self.call_cpu(prompt, max_tokens, model, query, headers).await;
            return DispatchOutcome {
                backend: BackendId::Cpu,
                fallback_reason: Some(FallbackReason::UserPreference),
                result,
            };
        }

        match self.eligibility_reason() {
            Some(reason) => {
                let result = self.call_cpu(prompt, max_tokens, model, query, headers).await;
                DispatchOutcome { backend: BackendId::Cpu, fallback_reason: Some(reason), result }
            }
            None => self.dispatch_gpu_with_fallback(prompt, max_tokens, model, query, headers).await,
        }
    }

    /// Checks the three GPU eligibility conditions (breaker admits, health
    /// flag healthy, a permit *appears* available) without consuming
    /// anything. A pure peek: the permit is only actually taken in
    /// [`Self::dispatch_gpu_with_fallback`], after this check passes, per
    /// the "permit acquire strictly after the eligibility check" ordering
    /// rule.
    fn eligibility_reason(&self) -> Option<FallbackReason> {
        if self.gpu.breaker.state() == CircuitState::Open {
            return Some(FallbackReason::CircuitOpen);
        }
        if let Some(health) = &self.gpu.health {
            if !health.is_usable() {
                return Some(FallbackReason::Unhealthy);
            }
        }
        if let Some(gate) = &self.gpu.gate {
            if gate.available_permits() == 0 {
                return Some(FallbackReason::QueueFull);
            }
        }
        None
    }

    async fn dispatch_gpu_with_fallback(
        &self,
        prompt: &str,
        max_tokens: u32,
        model: Option<String>,
        query: &str,
        headers: &HeaderMap,
    ) -> DispatchOutcome {
        // The eligibility check above is a peek; `try_admit` is the one
        // step with side effects (it opens a half-open trial), and the
        // actual permit acquire happens only now, after it.
        if self.gpu.breaker.try_admit().is_err() {
            let result = self.call_cpu(prompt, max_tokens, model, query, headers).await;
            return DispatchOutcome {
                backend: BackendId::Cpu,
                fallback_reason: Some(FallbackReason::CircuitOpen),
                result,
            };
        }

        let permit = match &self.gpu.gate {
            Some(gate) => match gate.try_acquire().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    // The gate lost the race after try_admit opened a
                    // half-open trial: release it so the breaker isn't
                    // left stuck waiting for a trial that never ran. In
                    // the ordinary `Closed` state try_admit was a no-op,
                    // so there's nothing to undo there.
                    if self.gpu.breaker.state() == CircuitState::HalfOpen {
                        self.gpu.breaker.on_failure();
                    }
                    let result = self.call_cpu(prompt, max_tokens, model, query, headers).await;
                    return DispatchOutcome {
                        backend: BackendId::Cpu,
                        fallback_reason: Some(FallbackReason::QueueFull),
                        result,
                    };
                }
            },
            None => None,
        };

        let request = BackendInferRequest { prompt: prompt.to_string(), max_tokens, model: model.clone() };
        let outcome = self.gpu.forwarder.forward(&request, query, headers).await;
        // Permit released here, strictly after the response has been
        // fully read out of `outcome`.
        drop(permit);

        match outcome {
            Ok(ForwardOutcome::Success(response)) => {
                self.gpu.breaker.on_success();
                DispatchOutcome { backend: BackendId::Gpu, fallback_reason: None, result: Ok(response.content) }
            }
            Ok(ForwardOutcome::ServerError { status, body }) => {
                self.gpu.breaker.on_failure();
                self.fallback_after_gpu_failure(
                    prompt,
                    max_tokens,
                    model,
                    query,
                    headers,
                    FallbackReason::GpuError,
                    DispatchError::ServerError { status, body },
                )
                .await
            }
            Err(ForwardError::Timeout) => {
                self.gpu.breaker.on_failure();
                self.fallback_after_gpu_failure(
                    prompt,
                    max_tokens,
                    model,
                    query,
                    headers,
                    FallbackReason::GpuFailed,
                    DispatchError::Timeout,
                )
                .await
            }
            Err(ForwardError::Unreachable(_)) | Err(ForwardError::Malformed(_)) => {
                self.gpu.breaker.on_failure();
                self.fallback_after_gpu_failure(
                    prompt,
                    max_tokens,
                    model,
                    query,
                    headers,
                    FallbackReason::GpuFailed,
                    DispatchError::Unreachable,
                )
                .await
            }
        }
    }

    /// Performs the single allowed CPU fallback hop after a GPU failure.
    /// If CPU also fails, the original GPU error is returned to the
    /// caller, not the CPU one.
    async fn fallback_after_gpu_failure(
        &self,
        prompt: &str,
        max_tokens: u32,
        model: Option<String>,
        query: &str,
        headers: &HeaderMap,
        reason: FallbackReason,
        gpu_error: DispatchError,
    ) -> DispatchOutcome {
        match self.call_cpu(prompt, max_tokens, model, query, headers).await {
            Ok(content) => {
                DispatchOutcome { backend: BackendId::Cpu, fallback_reason: Some(reason), result: Ok(content) }
            }
            Err(_) => {
                DispatchOutcome { backend: BackendId::Cpu, fallback_reason: Some(reason), result: Err(gpu_error) }
            }
        }
    }

    async fn call_cpu(
        &self,
        prompt: &str,
        max_tokens: u32,
        model: Option<String>,
        query: &str,
        headers: &HeaderMap,
    ) -> Result<String, DispatchError> {
        let request = BackendInferRequest { prompt: prompt.to_string(), max_tokens, model };
        match self.cpu.forwarder.forward(&request, query, headers).await {
            Ok(ForwardOutcome::Success(response)) => {
                self.cpu.breaker.on_success();
                Ok(response.content)
            }
            Ok(ForwardOutcome::ServerError { status, body }) => {
                self.cpu.breaker.on_failure();
                Err(DispatchError::ServerError { status, body })
            }
            Err(ForwardError::Timeout) => {
                self.cpu.breaker.on_failure();
                Err(DispatchError::Timeout)
            }
            Err(ForwardError::Unreachable(_)) | Err(ForwardError::Malformed(_)) => {
                self.cpu.breaker.on_failure();
                Err(DispatchError::Unreachable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_reason_strings_use_the_documented_vocabulary() {
        assert_eq!(FallbackReason::UserPreference.as_str(), "user_preference");
        assert_eq!(FallbackReason::CircuitOpen.as_str(), "circuit_open");
        assert_eq!(FallbackReason::Unhealthy.as_str(), "unhealthy");
        assert_eq!(FallbackReason::QueueFull.as_str(), "queue_full");
        assert_eq!(FallbackReason::GpuError.as_str(), "gpu_error");
        assert_eq!(FallbackReason::GpuFailed.as_str(), "gpu_failed");
    }

    #[test]
    fn backend_id_strings_use_the_documented_vocabulary() {
        assert_eq!(BackendId::Gpu.as_str(), "gpu");
        assert_eq!(BackendId::Cpu.as_str(), "cpu");
    }
}
