//! Task Gateway — the single entry point for every AI call.
//!
//! Flow: parse task id → build typed request → breaker.execute(vendor call bounded
//! by the call timeout) → validate output → typed result.
//!
//! No retries happen here. A failed call is reported once; retry policy belongs
//! to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::ai::breaker::{BreakerError, BreakerRegistry, BreakerSnapshot, HealthStatus};
use crate::ai::error::GatewayError;
use crate::ai::schema::validate_response;
use crate::ai::task::{Task, TaskRequest, TaskResult};
use crate::ai::vendors::{VendorAdapter, VendorError, VendorId};
use crate::errors::NormalizedError;

pub struct TaskGateway {
    adapter: Arc<dyn VendorAdapter>,
    breakers: Arc<BreakerRegistry>,
    call_timeout: Duration,
}

impl TaskGateway {
    pub fn new(
        adapter: Arc<dyn VendorAdapter>,
        breakers: Arc<BreakerRegistry>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            adapter,
            breakers,
            call_timeout,
        }
    }

    pub fn current_vendor(&self) -> VendorId {
        self.adapter.vendor()
    }

    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }

    /// Whether the current vendor's breaker would admit a call right now.
    pub fn accepting_requests(&self) -> bool {
        self.breakers
            .get(self.adapter.vendor().as_str())
            .map_or(true, |breaker| breaker.is_available())
    }

    pub fn health(&self) -> HealthStatus {
        self.breakers.health()
    }

    /// Runs `task` with an untyped payload. Unknown tasks and malformed payloads
    /// fail before any vendor call or breaker bookkeeping.
    pub async fn ask(&self, task: &str, payload: Value) -> Result<TaskResult, NormalizedError> {
        let request = self.prepare(task, payload)?;
        self.ask_request(&request).await
    }

    /// Parses the task id and builds its typed request without calling a vendor.
    pub fn prepare(&self, task: &str, payload: Value) -> Result<TaskRequest, NormalizedError> {
        task.parse::<Task>()
            .and_then(|parsed| TaskRequest::from_payload(parsed, payload))
            .map_err(|e| self.report(task, e))
    }

    /// Runs an already typed request.
    pub async fn ask_request(&self, request: &TaskRequest) -> Result<TaskResult, NormalizedError> {
        self.run(request)
            .await
            .map_err(|e| self.report(request.task().as_str(), e))
    }

    async fn run(&self, request: &TaskRequest) -> Result<TaskResult, GatewayError> {
        let vendor = self.adapter.vendor();
        let breaker = self.breakers.get_or_create(vendor.as_str());
        let started = Instant::now();

        let raw = breaker
            .execute(|| self.call_vendor(request))
            .await
            .map_err(|e| match e {
                BreakerError::Open { .. } => GatewayError::ServiceUnavailable {
                    vendor: vendor.to_string(),
                },
                BreakerError::Inner(e) => GatewayError::Vendor(e),
            })?;

        // the breaker has already recorded the call as a success; a contract
        // violation is reported to the caller without touching it
        let result = validate_response(request, &raw)?;

        info!(
            task = %request.task(),
            %vendor,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "task completed"
        );
        Ok(result)
    }

    async fn call_vendor(&self, request: &TaskRequest) -> Result<Value, VendorError> {
        match tokio::time::timeout(self.call_timeout, self.adapter.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(VendorError::Timeout(self.call_timeout.as_millis() as u64)),
        }
    }

    fn report(&self, task: &str, err: GatewayError) -> NormalizedError {
        let normalized = err.normalize();
        warn!(
            task,
            vendor = %self.adapter.vendor(),
            code = %normalized.code,
            "task failed: {}",
            normalized.message
        );
        normalized
    }
}
