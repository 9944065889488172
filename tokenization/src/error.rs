//! Error types for the tokenization pipeline.
//!
//! Two layers are distinguished:
//!
//! - [`TokenizationError`] is a domain error with a stable [`ErrorCode`], raised
//!   by local logic such as payload parsing or configuration checks.
//! - [`TokenRequestError`] is what a token request resolves to on failure. It
//!   separates local validation failures, transport failures, server rejections
//!   and domain errors, because each is logged and surfaced differently.

use std::error::Error as StdError;
use std::fmt;

use crate::response::ErrorResponse;
use crate::validation::ValidationError;

/// Boxed error used for causes that cross crate boundaries.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Stable identifier carried by every [`TokenizationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Card details failed local validation.
    CardValidation,
    /// The Google Pay payload is not a well-formed wallet token.
    GooglePayRequestParsing,
    /// A successful response body could not be decoded.
    TokenResponseParsing,
    /// Configuration is missing or malformed.
    InvalidConfiguration,
}

impl ErrorCode {
    /// Returns the wire identifier for this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CardValidation => "card_validation_error",
            Self::GooglePayRequestParsing => "google_pay_request_parsing_error",
            Self::TokenResponseParsing => "token_response_parsing_error",
            Self::InvalidConfiguration => "invalid_configuration",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-level tokenization failure.
///
/// Displays as its message so it can be handed to the caller unchanged.
#[derive(Debug)]
pub struct TokenizationError {
    code: ErrorCode,
    message: String,
    source: Option<BoxError>,
}

impl TokenizationError {
    /// Creates a new error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TokenizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for TokenizationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let source: &(dyn StdError + 'static) = self.source.as_deref()?;
        Some(source)
    }
}

/// Failure outcome of a single token request.
#[derive(Debug, thiserror::Error)]
pub enum TokenRequestError {
    /// Card details were rejected before any network call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// No response was received from the tokenization service.
    #[error("network error: the tokenization service could not be reached")]
    Network {
        /// The transport failure.
        #[source]
        source: BoxError,
    },

    /// The service answered with a non-success status.
    #[error("tokenization service responded with status {status}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Decoded error body, when the service sent one.
        body: Option<ErrorResponse>,
    },

    /// Local domain failure such as a malformed Google Pay payload.
    #[error("{0}")]
    Internal(#[from] TokenizationError),

    /// The owning scope was torn down before the request completed.
    #[error("token request was cancelled")]
    Cancelled,
}

impl TokenRequestError {
    /// Returns the message to surface to the caller.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns the domain error code, if this is an internal error.
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Validation(_) => Some(ErrorCode::CardValidation),
            Self::Internal(e) => Some(e.code()),
            Self::Network { .. } | Self::Server { .. } | Self::Cancelled => None,
        }
    }
}
