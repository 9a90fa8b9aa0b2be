//! Vendor adapters — interchangeable backends that execute a task.
//!
//! Selection is by a single configured `VendorId`. Every adapter honours the same
//! contract: typed `TaskRequest` in, unvalidated JSON out. Validation is the
//! gateway's job, never the adapter's.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::ai::task::TaskRequest;
use crate::errors::codes;

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod prompts;

pub use anthropic::AnthropicVendor;
pub use mock::MockVendor;
pub use openai::OpenAiVendor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorId {
    Mock,
    Anthropic,
    OpenAi,
}

impl VendorId {
    pub const fn as_str(self) -> &'static str {
        match self {
            VendorId::Mock => "mock",
            VendorId::Anthropic => "anthropic",
            VendorId::OpenAi => "openai",
        }
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(VendorId::Mock),
            "anthropic" => Ok(VendorId::Anthropic),
            "openai" => Ok(VendorId::OpenAi),
            other => Err(format!("unknown vendor '{other}'")),
        }
    }
}

/// Credential presence per vendor. Only presence matters for availability.
#[derive(Debug, Clone, Default)]
pub struct VendorCredentials {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

/// Whether `vendor` can be used with the given credentials. Never touches the network.
pub fn is_vendor_available(vendor: VendorId, credentials: &VendorCredentials) -> bool {
    let present = |key: &Option<String>| key.as_deref().is_some_and(|k| !k.trim().is_empty());
    match vendor {
        VendorId::Mock => true,
        VendorId::Anthropic => present(&credentials.anthropic_api_key),
        VendorId::OpenAi => present(&credentials.openai_api_key),
    }
}

#[derive(Debug, Error)]
pub enum VendorError {
    #[error("Vendor call timed out after {0}ms")]
    Timeout(u64),

    #[error("Vendor rejected credentials: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed vendor response: {0}")]
    MalformedResponse(String),

    #[error("Vendor returned empty content")]
    EmptyContent,

    #[error("Vendor '{0}' has no credentials configured")]
    MissingCredentials(VendorId),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VendorError {
    pub fn code(&self) -> &'static str {
        match self {
            VendorError::Timeout(_) => "VENDOR_TIMEOUT",
            VendorError::Auth(_) => "VENDOR_AUTH_FAILED",
            VendorError::Http(_) => "VENDOR_HTTP_ERROR",
            VendorError::Api { .. } => "VENDOR_API_ERROR",
            VendorError::MalformedResponse(_) => "VENDOR_MALFORMED_RESPONSE",
            VendorError::EmptyContent => "VENDOR_EMPTY_CONTENT",
            VendorError::MissingCredentials(_) => "VENDOR_AUTH_FAILED",
            VendorError::Other(_) => codes::UNKNOWN_ERROR,
        }
    }
}

/// The capability every backend implements.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    fn vendor(&self) -> VendorId;

    async fn execute(&self, request: &TaskRequest) -> Result<Value, VendorError>;
}

/// Lookup table from vendor id to adapter.
pub fn build_adapter(
    vendor: VendorId,
    credentials: &VendorCredentials,
    http_timeout: Duration,
) -> Result<Arc<dyn VendorAdapter>, VendorError> {
    let adapter: Arc<dyn VendorAdapter> = match vendor {
        VendorId::Mock => Arc::new(MockVendor),
        VendorId::Anthropic => {
            let key = credentials
                .anthropic_api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or(VendorError::MissingCredentials(vendor))?;
            Arc::new(AnthropicVendor::new(key, http_timeout)?)
        }
        VendorId::OpenAi => {
            let key = credentials
                .openai_api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or(VendorError::MissingCredentials(vendor))?;
            Arc::new(OpenAiVendor::new(key, http_timeout)?)
        }
    };
    Ok(adapter)
}

/// Maps a transport failure, keeping client-side timeouts distinguishable.
pub(crate) fn send_error(err: reqwest::Error, timeout: Duration) -> VendorError {
    if err.is_timeout() {
        VendorError::Timeout(timeout.as_millis() as u64)
    } else {
        VendorError::Http(err)
    }
}

/// Maps a non-success HTTP status to a vendor error.
pub(crate) fn classify_status(status: reqwest::StatusCode, message: String) -> VendorError {
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            VendorError::Auth(message)
        }
        _ => VendorError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub(crate) fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}

/// Parses model text output as a JSON value.
pub(crate) fn parse_model_json(text: &str) -> Result<Value, VendorError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(VendorError::EmptyContent);
    }
    serde_json::from_str(text).map_err(|e| VendorError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_id_parsing_is_case_insensitive() {
        assert_eq!("Anthropic".parse::<VendorId>().unwrap(), VendorId::Anthropic);
        assert_eq!(" openai ".parse::<VendorId>().unwrap(), VendorId::OpenAi);
        assert!("gemini".parse::<VendorId>().is_err());
    }

    #[test]
    fn test_mock_always_available() {
        assert!(is_vendor_available(
            VendorId::Mock,
            &VendorCredentials::default()
        ));
    }

    #[test]
    fn test_live_vendor_availability_follows_credentials() {
        let creds = VendorCredentials {
            anthropic_api_key: Some("sk-ant-test".to_string()),
            openai_api_key: Some("   ".to_string()),
        };
        assert!(is_vendor_available(VendorId::Anthropic, &creds));
        assert!(!is_vendor_available(VendorId::OpenAi, &creds));
    }

    #[test]
    fn test_build_adapter_without_key_fails() {
        let err = build_adapter(
            VendorId::OpenAi,
            &VendorCredentials::default(),
            Duration::from_secs(5),
        )
        .err()
        .unwrap();
        assert!(matches!(err, VendorError::MissingCredentials(VendorId::OpenAi)));
    }

    #[test]
    fn test_build_adapter_selects_vendor() {
        let creds = VendorCredentials {
            anthropic_api_key: Some("sk-ant-test".to_string()),
            openai_api_key: None,
        };
        let adapter = build_adapter(VendorId::Anthropic, &creds, Duration::from_secs(5)).unwrap();
        assert_eq!(adapter.vendor(), VendorId::Anthropic);
        let adapter = build_adapter(VendorId::Mock, &creds, Duration::from_secs(5)).unwrap();
        assert_eq!(adapter.vendor(), VendorId::Mock);
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_model_json_errors() {
        assert!(matches!(
            parse_model_json("```json\n```"),
            Err(VendorError::EmptyContent)
        ));
        assert!(matches!(
            parse_model_json("Sure! Here is your JSON"),
            Err(VendorError::MalformedResponse(_))
        ));
        assert_eq!(parse_model_json("{\"a\": 1}").unwrap()["a"], 1);
    }

    #[test]
    fn test_auth_statuses_classified() {
        assert!(matches!(
            classify_status(reqwest::StatusCode::UNAUTHORIZED, "bad key".into()),
            VendorError::Auth(_)
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down".into()),
            VendorError::Api { status: 429, .. }
        ));
    }
}
