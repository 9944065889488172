//! Analytics event model.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Severity attached to an event for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal lifecycle event.
    Info,
    /// Recoverable problem.
    Warn,
    /// Failed operation.
    Error,
}

/// Fixed set of event types emitted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenizationEventType {
    /// A client was built for an environment.
    #[serde(rename = "checkout_api_client_initialised")]
    ClientInitialised,
    /// A token request is about to be dispatched.
    #[serde(rename = "token_requested")]
    TokenRequested,
    /// A token request completed with any outcome.
    #[serde(rename = "token_response")]
    TokenResponse,
    /// A token request failed with a local error.
    #[serde(rename = "token_request_error")]
    TokenRequestError,
}

impl TokenizationEventType {
    /// Returns the event identifier.
    #[must_use]
    pub const fn event_id(self) -> &'static str {
        match self {
            Self::ClientInitialised => "checkout_api_client_initialised",
            Self::TokenRequested => "token_requested",
            Self::TokenResponse => "token_response",
            Self::TokenRequestError => "token_request_error",
        }
    }
}

impl fmt::Display for TokenizationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_id())
    }
}

/// Property names used in event payloads.
pub mod attribute {
    /// Token type, `card` or `googlepay`.
    pub const TOKEN_TYPE: &str = "tokenType";
    /// Merchant public key.
    pub const PUBLIC_KEY: &str = "publicKey";
    /// Issued token.
    pub const TOKEN_ID: &str = "tokenID";
    /// Card scheme reported by the service.
    pub const SCHEME: &str = "scheme";
    /// HTTP status code of a failed request.
    pub const HTTP_STATUS_CODE: &str = "httpStatusCode";
    /// Nested server error body.
    pub const SERVER_ERROR: &str = "serverError";
    /// Server request identifier.
    pub const REQUEST_ID: &str = "requestId";
    /// Server error category.
    pub const ERROR_TYPE: &str = "errorType";
    /// Server error codes.
    pub const ERROR_CODES: &str = "errorCodes";
    /// Message of a local error.
    pub const ERROR_MESSAGE: &str = "errorMessage";
    /// Stable code of a local error.
    pub const ERROR_CODE: &str = "errorCode";
    /// Target environment.
    pub const ENVIRONMENT: &str = "environment";
}

/// One immutable analytics record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingEvent {
    /// Severity.
    pub level: MonitoringLevel,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: TokenizationEventType,
    /// Session the event belongs to.
    pub correlation_id: Uuid,
    /// Keyed properties in insertion order.
    pub properties: Map<String, Value>,
}

impl LoggingEvent {
    /// Starts an event with no properties.
    #[must_use]
    pub fn new(
        level: MonitoringLevel,
        event_type: TokenizationEventType,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            level,
            event_type,
            correlation_id,
            properties: Map::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_owned(), value.into());
        self
    }

    /// Adds a property when `value` is present.
    #[must_use]
    pub fn with_opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    /// Returns a property by name.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}
