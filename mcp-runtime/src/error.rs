use arc_mcp_core::error::codes;
use arc_mcp_core::{CoreError, UpstreamError};
use serde_json::{Value, json};

use crate::client::ClientError;

#[derive(Debug)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }
}

/// Failure of a single tool call. Rendered into an `isError` tool result,
/// never into a JSON-RPC error.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
    pub docs_hint: Option<String>,
    pub details: Option<Value>,
    /// HTTP status of the upstream response, when the failure came from Arc.
    pub status: Option<u16>,
    pub upstream: Option<UpstreamError>,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            docs_hint: None,
            details: None,
            status: None,
            upstream: None,
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::new(codes::VALIDATION_FAILED, message).with_field(field)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_validation(&self) -> bool {
        self.code == codes::VALIDATION_FAILED
    }

    /// Text shown to the assistant. Upstream structured errors keep Arc's
    /// own code and message.
    pub fn render(&self) -> String {
        let mut text = match (&self.upstream, self.status) {
            (Some(upstream), Some(status)) if !upstream.code.is_empty() => format!(
                "Arc API error (HTTP {status}) [{}]: {}",
                upstream.code, upstream.message
            ),
            (Some(upstream), Some(status)) => {
                format!("Arc API error (HTTP {status}): {}", upstream.message)
            }
            (None, Some(status)) => format!("Arc API error (HTTP {status}): {}", self.message),
            _ if self.is_validation() => format!("Invalid arguments: {}", self.message),
            _ => format!("Error: {}", self.message),
        };
        if let Some(hint) = &self.docs_hint {
            text.push_str("\n\nHint: ");
            text.push_str(hint);
        }
        text
    }

    pub fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.code,
            "message": self.message
        });
        if let Some(field) = &self.field {
            payload["field"] = Value::String(field.clone());
        }
        if let Some(docs_hint) = &self.docs_hint {
            payload["docs_hint"] = Value::String(docs_hint.clone());
        }
        if let Some(status) = self.status {
            payload["status"] = json!(status);
        }
        if let Some(upstream) = &self.upstream {
            payload["upstream"] = json!(upstream);
        }
        if let Some(details) = &self.details {
            payload["details"] = details.clone();
        }
        payload
    }
}

impl From<ClientError> for ToolError {
    fn from(err: ClientError) -> Self {
        let message = err.to_string();
        match err {
            ClientError::Api { status, detail, .. } => {
                let mut tool_error = ToolError::new(codes::UPSTREAM_ERROR, message);
                tool_error.status = Some(status);
                tool_error.upstream = detail;
                tool_error
            }
            ClientError::Timeout { .. } => ToolError::new(codes::TIMEOUT, message),
            ClientError::Transport { .. } => ToolError::new(codes::CONNECTION_ERROR, message)
                .with_docs_hint("Check ARC_BASE_URL and that the Arc server is running."),
            ClientError::Decode { .. } => ToolError::new(codes::RESPONSE_ERROR, message),
            ClientError::InvalidBaseUrl { .. } | ClientError::Build(_) => {
                ToolError::new(codes::INTERNAL_ERROR, message)
            }
        }
    }
}

impl From<CoreError> for ToolError {
    fn from(err: CoreError) -> Self {
        let field = match &err {
            CoreError::InvalidValue { field, .. } => Some(field.clone()),
            CoreError::InvalidCron { .. } => Some("receiveinterval".to_string()),
            CoreError::UnknownDateStyle(_) => None,
        };
        let tool_error = ToolError::new(codes::VALIDATION_FAILED, err.to_string());
        match field {
            Some(field) => tool_error.with_field(field),
            None => tool_error,
        }
    }
}

/// Fixed hints for upstream statuses that usually mean misconfiguration.
pub fn status_hint(status: u16) -> Option<&'static str> {
    match status {
        401 => Some(
            "Authentication failed. Check ARC_AUTH_TOKEN (an Arc auth token, or user:password for Basic auth).",
        ),
        403 => Some("The Arc user lacks permission for this operation."),
        404 => Some("The requested Arc resource was not found. Check the identifier and try again."),
        500 => Some("Arc reported an internal server error. Check the Arc application log."),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, code: &str, message: &str) -> ToolError {
        ToolError::from(ClientError::Api {
            status,
            detail: Some(UpstreamError {
                code: code.to_string(),
                message: message.to_string(),
            }),
            body: String::new(),
        })
    }

    #[test]
    fn upstream_errors_keep_code_and_message() {
        let err = api_error(409, "DUP", "Connector already exists");
        assert_eq!(err.code, codes::UPSTREAM_ERROR);
        assert_eq!(
            err.render(),
            "Arc API error (HTTP 409) [DUP]: Connector already exists"
        );
    }

    #[test]
    fn validation_errors_are_marked() {
        let err = ToolError::validation("connectorId", "Missing required field 'connectorId'");
        assert!(err.is_validation());
        assert_eq!(
            err.render(),
            "Invalid arguments: Missing required field 'connectorId'"
        );
        assert_eq!(err.to_value()["field"], "connectorId");
    }

    #[test]
    fn core_errors_become_validation_failures() {
        let err = ToolError::from(CoreError::InvalidValue {
            field: "smtpport".to_string(),
            expected: "an integer",
        });
        assert!(err.is_validation());
        assert_eq!(err.field.as_deref(), Some("smtpport"));
    }

    #[test]
    fn only_known_statuses_have_hints() {
        assert!(status_hint(401).unwrap().contains("ARC_AUTH_TOKEN"));
        assert!(status_hint(403).is_some());
        assert!(status_hint(404).is_some());
        assert!(status_hint(500).is_some());
        assert!(status_hint(409).is_none());
    }
}
