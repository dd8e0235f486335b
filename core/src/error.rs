//! Error types for the PAY.JP client.
//!
//! # Design
//! `ClientError` is the closed taxonomy every call resolves to. Rate limiting
//! gets a dedicated variant because callers back off on it instead of showing
//! the API message. `RequiredThreeDSecure` is not a failure of the call; it
//! carries the secondary token the caller must verify before a card token can
//! be issued.

use std::fmt;

use serde::Deserialize;

use crate::object::ObjectType;
use crate::types::ThreeDSecureToken;

/// Errors returned by `PayjpClient` calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No HTTP response was received.
    #[error("transport error: {0}")]
    SystemError(#[from] TransportError),

    /// The body was missing or did not match the expected shape.
    #[error("invalid JSON in HTTP {status} response: {source}")]
    InvalidJson {
        status: u16,
        body: String,
        #[source]
        source: DecodeError,
    },

    /// A non-2xx status with a well-formed API error body.
    #[error("service error: {0}")]
    ServiceError(ApiErrorResponse),

    /// HTTP 429.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Token creation answered with a 3-D Secure token instead of a card token.
    #[error("3-D Secure authentication required ({})", .0.id)]
    RequiredThreeDSecure(ThreeDSecureToken),
}

impl ClientError {
    /// The parsed API error, when the server supplied one.
    pub fn api_error(&self) -> Option<&ApiErrorResponse> {
        match self {
            ClientError::ServiceError(error) => Some(error),
            _ => None,
        }
    }
}

/// Errors produced while turning a response body into a domain object.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The `object` discriminator names a type this client does not know.
    #[error("unknown object type `{0}`")]
    UnknownObject(String),

    /// A tagged type was expected but the payload carries no `object` field.
    #[error("missing `object` field, expected `{expected}`")]
    MissingObject { expected: ObjectType },

    #[error("expected {expected}, found `{found}` object")]
    TypeMismatch {
        expected: &'static str,
        found: ObjectType,
    },

    /// Neither success nor error: 1xx, 3xx and out-of-range statuses.
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
}

/// Transport-level failures: no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    /// The worker running the request went away before completing.
    #[error("request interrupted: {0}")]
    Interrupted(String),
}

/// Errors raised while assembling a `ClientConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("public key must not be empty")]
    EmptyPublicKey,

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

/// The `error` object of a PAY.JP error body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorResponse {
    pub message: String,
    #[serde(rename = "status")]
    pub status_code: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub param: Option<String>,
}

impl fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.status_code, self.error_type, self.message)?;
        if let Some(code) = &self.code {
            write!(f, " code={code}")?;
        }
        if let Some(param) = &self.param {
            write!(f, " param={param}")?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorResponse,
}

/// Parse a `{"error": {...}}` body.
pub fn parse_api_error(body: &str) -> Result<ApiErrorResponse, DecodeError> {
    let envelope: ErrorEnvelope = serde_json::from_str(body)?;
    Ok(envelope.error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_error_body() {
        let body = r#"{"error":{"message":"Invalid card number","status":402,"type":"card_error","code":"invalid_number","param":"card[number]"}}"#;
        let error = parse_api_error(body).unwrap();
        assert_eq!(error.status_code, 402);
        assert_eq!(error.error_type, "card_error");
        assert_eq!(error.code.as_deref(), Some("invalid_number"));
        assert_eq!(error.param.as_deref(), Some("card[number]"));
    }

    #[test]
    fn code_and_param_are_optional() {
        let body = r#"{"error":{"message":"Server error","status":500,"type":"server_error"}}"#;
        let error = parse_api_error(body).unwrap();
        assert!(error.code.is_none());
        assert!(error.param.is_none());
        assert_eq!(error.to_string(), "500 server_error (Server error)");
    }

    #[test]
    fn rejects_body_without_error_object() {
        assert!(parse_api_error(r#"{"message":"nope"}"#).is_err());
        assert!(parse_api_error("").is_err());
    }

    #[test]
    fn api_error_accessor() {
        let body = r#"{"error":{"message":"m","status":400,"type":"client_error"}}"#;
        let err = ClientError::ServiceError(parse_api_error(body).unwrap());
        assert_eq!(err.api_error().unwrap().message, "m");
        assert!(ClientError::RateLimitExceeded.api_error().is_none());
    }
}
