use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Structured error body returned by the Arc Admin API on non-2xx responses.
///
/// Arc wraps it OData-style as `{"error": {"code": ..., "message": ...}}`, but
/// some endpoints return the inner object directly. Both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamError {
    /// Upstream machine code (may be empty when only a message is present)
    #[serde(default)]
    pub code: String,
    /// Upstream human-readable message
    #[serde(default)]
    pub message: String,
}

impl UpstreamError {
    pub fn from_body(body: &Value) -> Option<Self> {
        let inner = match body.get("error") {
            Some(Value::Object(_)) => body.get("error")?,
            Some(Value::String(message)) => {
                return Some(Self {
                    code: String::new(),
                    message: message.clone(),
                });
            }
            _ => body,
        };
        let obj = inner.as_object()?;
        let code = obj
            .get("code")
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if code.is_empty() && message.is_empty() {
            return None;
        }
        Some(Self { code, message })
    }
}

/// Errors raised by the pure helpers in this crate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("'{field}' must be {expected}")]
    InvalidValue {
        field: String,
        expected: &'static str,
    },
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
    #[error("unknown datetime filter style '{0}' (expected 'bare' or 'quoted')")]
    UnknownDateStyle(String),
}

/// Error codes carried by tool errors across the adapter
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const UPSTREAM_ERROR: &str = "upstream_error";
    pub const CONNECTION_ERROR: &str = "connection_error";
    pub const TIMEOUT: &str = "timeout";
    pub const RESPONSE_ERROR: &str = "response_error";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::UpstreamError;

    #[test]
    fn parses_odata_wrapped_error() {
        let body = json!({"error": {"code": "409", "message": "Connector already exists"}});
        let err = UpstreamError::from_body(&body).unwrap();
        assert_eq!(err.code, "409");
        assert_eq!(err.message, "Connector already exists");
    }

    #[test]
    fn parses_bare_error_object_and_numeric_code() {
        let body = json!({"code": 42, "message": "bad filter"});
        let err = UpstreamError::from_body(&body).unwrap();
        assert_eq!(err.code, "42");
        assert_eq!(err.message, "bad filter");
    }

    #[test]
    fn ignores_bodies_without_code_or_message() {
        assert!(UpstreamError::from_body(&json!({"value": []})).is_none());
        assert!(UpstreamError::from_body(&json!("plain text")).is_none());
    }
}
