use thiserror::Error;

use crate::ai::schema::SchemaError;
use crate::ai::vendors::VendorError;
use crate::errors::{codes, NormalizedError};

/// Every way a gateway call can fail. Converted to `NormalizedError` at the boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unsupported task: {0}")]
    UnsupportedTask(String),

    #[error("Invalid payload for {0}")]
    InvalidPayload(String),

    #[error("Service unavailable: circuit for '{vendor}' is open")]
    ServiceUnavailable { vendor: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Vendor(#[from] VendorError),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::UnsupportedTask(_) => codes::UNSUPPORTED_TASK,
            GatewayError::InvalidPayload(_) => codes::INVALID_PAYLOAD,
            GatewayError::ServiceUnavailable { .. } => codes::SERVICE_UNAVAILABLE,
            GatewayError::Schema(_) => codes::SCHEMA_VALIDATION_FAILED,
            GatewayError::Vendor(e) => e.code(),
        }
    }

    pub fn normalize(&self) -> NormalizedError {
        match self {
            GatewayError::Vendor(e) => normalize_vendor(e),
            _ => NormalizedError::new(self.code(), self.to_string()),
        }
    }
}

/// Normalizes an opaque error. Known error types are recovered by downcasting;
/// anything else becomes `UNKNOWN_ERROR`.
pub fn normalize_any(err: &anyhow::Error) -> NormalizedError {
    if let Some(e) = err.downcast_ref::<NormalizedError>() {
        return e.clone();
    }
    if let Some(e) = err.downcast_ref::<GatewayError>() {
        return e.normalize();
    }
    if let Some(e) = err.downcast_ref::<VendorError>() {
        return normalize_vendor(e);
    }
    if let Some(e) = err.downcast_ref::<SchemaError>() {
        return NormalizedError::new(codes::SCHEMA_VALIDATION_FAILED, e.to_string());
    }
    if let Some(e) = err.downcast_ref::<reqwest::Error>() {
        let code = if e.is_timeout() {
            "VENDOR_TIMEOUT"
        } else {
            "VENDOR_HTTP_ERROR"
        };
        return NormalizedError::new(code, format!("HTTP error: {e}"));
    }
    NormalizedError::new(codes::UNKNOWN_ERROR, err.to_string())
}

fn normalize_vendor(err: &VendorError) -> NormalizedError {
    match err {
        // adapters may wrap a known error in anyhow
        VendorError::Other(inner) => normalize_any(inner),
        _ => NormalizedError::new(err.code(), err.to_string()),
    }
}

impl From<GatewayError> for NormalizedError {
    fn from(err: GatewayError) -> Self {
        err.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::schema::SchemaIssue;
    use crate::ai::task::Task;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            GatewayError::UnsupportedTask("x".into()).code(),
            "UNSUPPORTED_TASK"
        );
        assert_eq!(
            GatewayError::ServiceUnavailable {
                vendor: "mock".into()
            }
            .code(),
            "SERVICE_UNAVAILABLE"
        );
        assert_eq!(
            GatewayError::Vendor(VendorError::Timeout(30_000)).code(),
            "VENDOR_TIMEOUT"
        );
    }

    #[test]
    fn test_schema_error_message_is_preserved() {
        let err = GatewayError::Schema(SchemaError {
            task: Task::Score,
            issues: vec![SchemaIssue {
                path: "total".into(),
                message: "must equal 80, got 50".into(),
            }],
        });
        let normalized = err.normalize();
        assert_eq!(normalized.code, "SCHEMA_VALIDATION_FAILED");
        assert!(normalized.message.contains("total: must equal 80, got 50"));
    }

    #[test]
    fn test_unknown_vendor_failure_normalizes_to_unknown_error() {
        let err = GatewayError::Vendor(VendorError::Other(anyhow::anyhow!("socket exploded")));
        let normalized = NormalizedError::from(err);
        assert_eq!(normalized.code, "UNKNOWN_ERROR");
        assert_eq!(normalized.message, "socket exploded");
    }

    #[test]
    fn test_invalid_payload_message_names_task() {
        let err = GatewayError::InvalidPayload("score: missing field `answer`".into());
        assert_eq!(
            err.normalize().message,
            "Invalid payload for score: missing field `answer`"
        );
    }

    #[test]
    fn test_normalize_any_recovers_known_errors() {
        let err = anyhow::Error::new(VendorError::Timeout(500));
        assert_eq!(normalize_any(&err).code, "VENDOR_TIMEOUT");

        let err = anyhow::Error::new(NormalizedError::new(codes::RATE_LIMIT, "slow down"));
        assert_eq!(normalize_any(&err), NormalizedError::new("RATE_LIMIT", "slow down"));

        let err = anyhow::Error::new(GatewayError::UnsupportedTask("translate".into()));
        assert_eq!(normalize_any(&err).code, "UNSUPPORTED_TASK");
    }

    #[test]
    fn test_normalize_any_keeps_context_chain_unknown() {
        let err = anyhow::anyhow!("disk full").context("writing cache");
        let normalized = normalize_any(&err);
        assert_eq!(normalized.code, "UNKNOWN_ERROR");
        assert_eq!(normalized.message, "writing cache");
    }

    #[test]
    fn test_wrapped_vendor_error_keeps_its_code() {
        let inner = anyhow::Error::new(VendorError::Auth("invalid x-api-key".into()));
        let err = GatewayError::Vendor(VendorError::Other(inner));
        let normalized = err.normalize();
        assert_eq!(normalized.code, "VENDOR_AUTH_FAILED");
        assert!(normalized.message.contains("invalid x-api-key"));
    }
}
