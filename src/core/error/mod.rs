use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::core::types::ProviderId;

pub const API_CONNECTION_ERROR: &str = "APIConnectionError";
pub const API_CONNECTION_TIMEOUT_ERROR: &str = "APIConnectionTimeoutError";
pub const API_USER_ABORT_ERROR: &str = "APIUserAbortError";
pub const API_DECODE_ERROR: &str = "APIDecodeError";
pub const INVALID_REQUEST_ERROR: &str = "InvalidRequestError";

pub const DEPLOYMENT_NOT_FOUND_CODE: &str = "DeploymentNotFound";

/// Normalized error taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatErrorType {
    InvalidCredentials,
    ProviderBizError,
    AdapterError,
}

/// Structured failure reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderBizDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Requested model id, attached for `DeploymentNotFound`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_id: Option<String>,
    /// Remaining provider fields with camelCase keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Unstructured failure. Only these three fields survive; nothing else from
/// the underlying error is retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub message: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    #[error(
        "invalid credentials [provider={provider}, missing={missing}]",
        missing = .missing.join(", ")
    )]
    InvalidCredentials {
        provider: ProviderId,
        missing: Vec<String>,
    },
    #[error(
        "provider business error{context}: {code}: {message}",
        context = format_context(.provider, .endpoint, .error.deploy_id.as_deref(), .error.status),
        code = .error.code,
        message = .error.message
    )]
    ProviderBizError {
        provider: ProviderId,
        endpoint: String,
        error: ProviderBizDetails,
    },
    #[error(
        "adapter error{context}: {name}: {message}",
        context = format_context(.provider, .endpoint, None, None),
        name = .error.name,
        message = .error.message
    )]
    AdapterError {
        provider: ProviderId,
        endpoint: String,
        error: AdapterErrorDetails,
    },
}

impl ChatError {
    pub fn invalid_credentials(provider: ProviderId, missing: &[&str]) -> Self {
        Self::InvalidCredentials {
            provider,
            missing: missing.iter().map(|field| (*field).to_string()).collect(),
        }
    }

    pub fn error_type(&self) -> ChatErrorType {
        match self {
            Self::InvalidCredentials { .. } => ChatErrorType::InvalidCredentials,
            Self::ProviderBizError { .. } => ChatErrorType::ProviderBizError,
            Self::AdapterError { .. } => ChatErrorType::AdapterError,
        }
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            Self::InvalidCredentials { provider, .. }
            | Self::ProviderBizError { provider, .. }
            | Self::AdapterError { provider, .. } => *provider,
        }
    }

    /// Redacted endpoint, when the error was raised after construction.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::InvalidCredentials { .. } => None,
            Self::ProviderBizError { endpoint, .. } | Self::AdapterError { endpoint, .. } => {
                Some(endpoint)
            }
        }
    }

    /// Wire shape for an upstream HTTP layer: `{errorType, provider, endpoint?, error}`.
    pub fn to_payload(&self) -> Value {
        let error = match self {
            Self::InvalidCredentials { missing, .. } => json!({ "missing": missing }),
            Self::ProviderBizError { error, .. } => json!(error),
            Self::AdapterError { error, .. } => json!(error),
        };

        let mut payload = Map::new();
        payload.insert("errorType".to_string(), json!(self.error_type()));
        payload.insert("provider".to_string(), json!(self.provider()));
        if let Some(endpoint) = self.endpoint() {
            payload.insert("endpoint".to_string(), json!(endpoint));
        }
        payload.insert("error".to_string(), error);
        Value::Object(payload)
    }
}

/// Provider-call failure, decoded once at the transport boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderFailure {
    #[error("{code}: {message}")]
    Coded {
        code: String,
        message: String,
        status: Option<u16>,
        details: Map<String, Value>,
    },
    #[error("{}: {}", .0.name, .0.message)]
    Uncoded(AdapterErrorDetails),
}

impl ProviderFailure {
    pub fn uncoded(
        name: impl Into<String>,
        message: impl Into<String>,
        cause: Option<String>,
    ) -> Self {
        Self::Uncoded(AdapterErrorDetails {
            cause,
            message: message.into(),
            name: name.into(),
        })
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Coded { code, .. } => Some(code),
            Self::Uncoded(_) => None,
        }
    }
}

/// SDK-style error name for an HTTP status that came back without an error code.
pub fn status_error_name(status: u16) -> &'static str {
    match status {
        400 => "BadRequestError",
        401 => "AuthenticationError",
        403 => "PermissionDeniedError",
        404 => "NotFoundError",
        409 => "ConflictError",
        422 => "UnprocessableEntityError",
        429 => "RateLimitError",
        500..=599 => "InternalServerError",
        _ => "APIError",
    }
}

fn format_context(
    provider: &ProviderId,
    endpoint: &str,
    model: Option<&str>,
    status: Option<u16>,
) -> String {
    let mut context = vec![format!("provider={provider}")];

    if !endpoint.is_empty() {
        context.push(format!("endpoint={endpoint}"));
    }
    if let Some(model) = model {
        context.push(format!("model={model}"));
    }
    if let Some(status) = status {
        context.push(format!("status_code={status}"));
    }

    format!(" [{}]", context.join(", "))
}
