/// Error Handling Module
///
/// Domain error types for the session protocol and its collaborators, the
/// unified `AppError`, and the mapping of those errors onto HTTP responses.
///
/// Outward-facing rule: a token that cannot be decoded and a token whose
/// signature does not verify produce the same response.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

// ============================================================================
// 1. DOMAIN-SPECIFIC ERROR TYPES
// ============================================================================

/// Token decoding and verification failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Cannot be decoded, or its claims are inconsistent
    Malformed,
    /// Decodes, but the signature (or issuer) does not verify
    InvalidSignature,
    /// Verifies, but `now >= exp`
    Expired,
    /// Signing failed on malformed claims
    Encoding(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "token is malformed"),
            TokenError::InvalidSignature => write!(f, "token signature is invalid"),
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::Encoding(msg) => write!(f, "token encoding failed: {}", msg),
        }
    }
}

impl StdError for TokenError {}

/// Authentication and authorization failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No usable credential (401)
    Unauthorized(&'static str),
    /// A verifiable credential that does not prove origin (403)
    Forbidden(&'static str),
}

impl AuthError {
    /// The single rejection used for malformed, forged and expired credentials
    pub const INVALID_TOKEN: AuthError = AuthError::Unauthorized("invalid or expired token");
    pub const REVOKED: AuthError = AuthError::Unauthorized("revoked");
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Unauthorized(reason) => write!(f, "Unauthorized: {}", reason),
            AuthError::Forbidden(reason) => write!(f, "Forbidden: {}", reason),
        }
    }
}

impl StdError for AuthError {}

/// Identity store failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Unavailable(String),
    Timeout(Duration),
    /// The tracker has been blacklisted and cannot be resolved
    Revoked(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Identity store unavailable: {}", msg),
            StoreError::Timeout(after) => {
                write!(f, "Identity store timed out after {}ms", after.as_millis())
            }
            StoreError::Revoked(tracker) => write!(f, "Tracker {} has been revoked", tracker),
        }
    }
}

impl StdError for StoreError {}

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooLong(String, usize),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => ConfigError::MissingRequired(key),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}

// ============================================================================
// 2. UNIFIED APPLICATION ERROR TYPE
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    Token(TokenError),
    Store(StoreError),
    Validation(ValidationError),
    Config(ConfigError),
    NotFound(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::NotFound(what) => write!(f, "{} not found", what),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    fn describe(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Auth(AuthError::Unauthorized(reason)) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", reason.to_string())
            }
            AppError::Auth(AuthError::Forbidden(reason)) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", reason.to_string())
            }

            // Outside the filters a bad token is still only "not a credential"
            AppError::Token(TokenError::Encoding(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TOKEN_ENCODING_ERROR",
                "Internal server error".to_string(),
            ),
            AppError::Token(_) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "invalid or expired token".to_string(),
            ),

            AppError::Store(StoreError::Unavailable(_)) | AppError::Store(StoreError::Timeout(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Identity service temporarily unavailable".to_string(),
            ),
            AppError::Store(StoreError::Revoked(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IDENTITY_ERROR",
                "Internal server error".to_string(),
            ),

            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Server configuration error".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }

    /// Log with a level matching who is at fault
    pub fn log_error(&self, error_id: &str) {
        match self {
            AppError::Auth(_) | AppError::Token(TokenError::Malformed)
            | AppError::Token(TokenError::InvalidSignature)
            | AppError::Token(TokenError::Expired) => {
                tracing::warn!(error_id = error_id, error = %self, "Authentication error");
            }
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::NotFound(what) => {
                tracing::info!(error_id = error_id, what = %what, "Not found");
            }
            AppError::Store(e) => {
                tracing::error!(error_id = error_id, error = %e, "Identity store error");
            }
            AppError::Config(e) => {
                tracing::error!(error_id = error_id, error = %e, "Configuration error");
            }
            AppError::Token(e) => {
                tracing::error!(error_id = error_id, error = %e, "Token error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let (status, code, message) = self.describe();
        HttpResponse::build(status).json(ErrorResponse::new(
            error_id,
            message,
            code.to_string(),
            status.as_u16(),
        ))
    }

    fn status_code(&self) -> StatusCode {
        self.describe().0
    }
}

// ============================================================================
// 4. ERROR CONTEXT
// ============================================================================

/// Per-operation context attached to log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub tracker: Option<String>,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            tracker: None,
            operation: operation.into(),
        }
    }

    pub fn with_tracker(mut self, tracker: impl Into<String>) -> Self {
        self.tracker = Some(tracker.into());
        self
    }

    pub fn log_error(&self, error: &AppError) {
        tracing::warn!(
            request_id = %self.request_id,
            operation = %self.operation,
            tracker = ?self.tracker,
            error = %error,
            "Operation failed"
        );
    }
}
