//! Analytics logging for token requests.
//!
//! The pipeline reports each attempt through a [`TokenizationLogger`]:
//!
//! 1. `log_token_request_event` immediately before dispatch
//! 2. `log_token_response_event` once the outcome is known
//! 3. `log_error_on_token_requested_event` additionally for local errors
//! 4. `reset_session` to close the attempt
//!
//! [`EventLogger`] is the standard implementation. It turns these calls into
//! [`LoggingEvent`]s stamped with the current session's correlation id and
//! hands them to an injected [`EventSink`]. Resetting the session rotates the
//! correlation id so that events from consecutive attempts can be told apart.
//!
//! Overlapping attempts each take their own [`TokenizationLogger::session`],
//! an [`EventSession`] for [`EventLogger`], so one attempt's reset never
//! splits another attempt's events across sessions.

mod event;
mod sink;

use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Value, json};
use uuid::Uuid;

use crate::config::Environment;
use crate::error::TokenizationError;
use crate::request::TokenType;
use crate::response::{ErrorResponse, TokenDetailsResponse};

pub use event::{LoggingEvent, MonitoringLevel, TokenizationEventType, attribute};
#[cfg(feature = "telemetry")]
pub use sink::TracingSink;
pub use sink::{EventSink, MemorySink};

/// Lifecycle logging contract of the token pipeline.
///
/// None of these calls may fail or panic; logging never affects the outcome
/// of a token request.
pub trait TokenizationLogger: Send + Sync {
    /// A client was built for `environment`.
    fn log_client_initialised_event(&self, environment: Environment);

    /// A token request is about to be dispatched.
    fn log_token_request_event(&self, token_type: TokenType, public_key: &str);

    /// A token request completed.
    ///
    /// `success` is set for a successful outcome; `status` and `error` for a
    /// server rejection. All three are `None` when no response was received.
    fn log_token_response_event(
        &self,
        token_type: TokenType,
        public_key: &str,
        success: Option<&TokenDetailsResponse>,
        status: Option<u16>,
        error: Option<&ErrorResponse>,
    );

    /// A token request failed with a local error.
    fn log_error_on_token_requested_event(
        &self,
        token_type: TokenType,
        public_key: &str,
        error: &(dyn StdError + 'static),
    );

    /// Marks the end of one tokenization attempt.
    fn reset_session(&self);

    /// Returns a logger scoped to a single tokenization attempt.
    ///
    /// The default shares this logger's session.
    fn session(&self) -> Box<dyn TokenizationLogger + '_> {
        Box::new(self)
    }
}

macro_rules! forward_logger {
    ($($ty:ty),+) => {$(
        impl<L: TokenizationLogger + ?Sized> TokenizationLogger for $ty {
            fn log_client_initialised_event(&self, environment: Environment) {
                (**self).log_client_initialised_event(environment);
            }

            fn log_token_request_event(&self, token_type: TokenType, public_key: &str) {
                (**self).log_token_request_event(token_type, public_key);
            }

            fn log_token_response_event(
                &self,
                token_type: TokenType,
                public_key: &str,
                success: Option<&TokenDetailsResponse>,
                status: Option<u16>,
                error: Option<&ErrorResponse>,
            ) {
                (**self).log_token_response_event(token_type, public_key, success, status, error);
            }

            fn log_error_on_token_requested_event(
                &self,
                token_type: TokenType,
                public_key: &str,
                error: &(dyn StdError + 'static),
            ) {
                (**self).log_error_on_token_requested_event(token_type, public_key, error);
            }

            fn reset_session(&self) {
                (**self).reset_session();
            }

            fn session(&self) -> Box<dyn TokenizationLogger + '_> {
                (**self).session()
            }
        }
    )+};
}

forward_logger!(&L, Arc<L>);

/// [`TokenizationLogger`] that builds [`LoggingEvent`]s for an [`EventSink`].
pub struct EventLogger<S> {
    sink: S,
    correlation_id: RwLock<Uuid>,
}

impl<S> fmt::Debug for EventLogger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLogger")
            .field("correlation_id", &self.correlation_id())
            .finish_non_exhaustive()
    }
}

impl<S: EventSink> EventLogger<S> {
    /// Creates a logger writing to `sink`, starting a fresh session.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            correlation_id: RwLock::new(Uuid::new_v4()),
        }
    }

    /// Returns the sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    fn token_event(
        level: MonitoringLevel,
        event_type: TokenizationEventType,
        correlation_id: Uuid,
        token_type: TokenType,
        public_key: &str,
    ) -> LoggingEvent {
        LoggingEvent::new(level, event_type, correlation_id)
            .with(attribute::TOKEN_TYPE, token_type.as_str())
            .with(attribute::PUBLIC_KEY, public_key)
    }

    fn record_client_initialised(&self, correlation_id: Uuid, environment: Environment) {
        let event = LoggingEvent::new(
            MonitoringLevel::Info,
            TokenizationEventType::ClientInitialised,
            correlation_id,
        )
        .with(attribute::ENVIRONMENT, environment.as_str());
        self.sink.record(event);
    }

    fn record_request(&self, correlation_id: Uuid, token_type: TokenType, public_key: &str) {
        let event = Self::token_event(
            MonitoringLevel::Info,
            TokenizationEventType::TokenRequested,
            correlation_id,
            token_type,
            public_key,
        );
        self.sink.record(event);
    }

    fn record_response(
        &self,
        correlation_id: Uuid,
        token_type: TokenType,
        public_key: &str,
        success: Option<&TokenDetailsResponse>,
        status: Option<u16>,
        error: Option<&ErrorResponse>,
    ) {
        let level = if success.is_some() {
            MonitoringLevel::Info
        } else {
            MonitoringLevel::Error
        };
        let event = Self::token_event(
            level,
            TokenizationEventType::TokenResponse,
            correlation_id,
            token_type,
            public_key,
        )
        .with_opt(attribute::TOKEN_ID, success.map(|s| s.token.as_str()))
        .with_opt(attribute::SCHEME, success.and_then(|s| s.scheme.as_deref()))
        .with_opt(attribute::HTTP_STATUS_CODE, status)
        .with_opt(attribute::SERVER_ERROR, error.map(server_error_value));
        self.sink.record(event);
    }

    fn record_error(
        &self,
        correlation_id: Uuid,
        token_type: TokenType,
        public_key: &str,
        error: &(dyn StdError + 'static),
    ) {
        let code = error
            .downcast_ref::<TokenizationError>()
            .map(|e| e.code().as_str());
        let event = Self::token_event(
            MonitoringLevel::Error,
            TokenizationEventType::TokenRequestError,
            correlation_id,
            token_type,
            public_key,
        )
        .with(attribute::ERROR_MESSAGE, error.to_string())
        .with_opt(attribute::ERROR_CODE, code);
        self.sink.record(event);
    }
}

impl<S> EventLogger<S> {
    /// Returns the id stamped on events of the current session.
    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        read_id(&self.correlation_id)
    }
}

fn read_id(id: &RwLock<Uuid>) -> Uuid {
    *id.read().unwrap_or_else(PoisonError::into_inner)
}

fn rotate_id(id: &RwLock<Uuid>) {
    *id.write().unwrap_or_else(PoisonError::into_inner) = Uuid::new_v4();
}

fn server_error_value(error: &ErrorResponse) -> Value {
    let mut value = serde_json::Map::new();
    if let Some(request_id) = &error.request_id {
        value.insert(attribute::REQUEST_ID.to_owned(), json!(request_id));
    }
    if let Some(error_type) = &error.error_type {
        value.insert(attribute::ERROR_TYPE.to_owned(), json!(error_type));
    }
    value.insert(attribute::ERROR_CODES.to_owned(), json!(error.error_codes));
    Value::Object(value)
}

impl<S: EventSink> TokenizationLogger for EventLogger<S> {
    fn log_client_initialised_event(&self, environment: Environment) {
        self.record_client_initialised(self.correlation_id(), environment);
    }

    fn log_token_request_event(&self, token_type: TokenType, public_key: &str) {
        self.record_request(self.correlation_id(), token_type, public_key);
    }

    fn log_token_response_event(
        &self,
        token_type: TokenType,
        public_key: &str,
        success: Option<&TokenDetailsResponse>,
        status: Option<u16>,
        error: Option<&ErrorResponse>,
    ) {
        self.record_response(
            self.correlation_id(),
            token_type,
            public_key,
            success,
            status,
            error,
        );
    }

    fn log_error_on_token_requested_event(
        &self,
        token_type: TokenType,
        public_key: &str,
        error: &(dyn StdError + 'static),
    ) {
        self.record_error(self.correlation_id(), token_type, public_key, error);
    }

    fn reset_session(&self) {
        rotate_id(&self.correlation_id);
        self.sink.session_reset();
    }

    fn session(&self) -> Box<dyn TokenizationLogger + '_> {
        Box::new(EventSession {
            logger: self,
            correlation_id: RwLock::new(Uuid::new_v4()),
        })
    }
}

/// Session of an [`EventLogger`] owned by a single tokenization attempt.
///
/// Stamps its own correlation id and rotates only that id on reset.
pub struct EventSession<'a, S> {
    logger: &'a EventLogger<S>,
    correlation_id: RwLock<Uuid>,
}

impl<S> fmt::Debug for EventSession<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSession")
            .field("correlation_id", &self.correlation_id())
            .finish_non_exhaustive()
    }
}

impl<S> EventSession<'_, S> {
    /// Returns the id stamped on this session's events.
    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        read_id(&self.correlation_id)
    }
}

impl<S: EventSink> TokenizationLogger for EventSession<'_, S> {
    fn log_client_initialised_event(&self, environment: Environment) {
        self.logger
            .record_client_initialised(self.correlation_id(), environment);
    }

    fn log_token_request_event(&self, token_type: TokenType, public_key: &str) {
        self.logger
            .record_request(self.correlation_id(), token_type, public_key);
    }

    fn log_token_response_event(
        &self,
        token_type: TokenType,
        public_key: &str,
        success: Option<&TokenDetailsResponse>,
        status: Option<u16>,
        error: Option<&ErrorResponse>,
    ) {
        self.logger.record_response(
            self.correlation_id(),
            token_type,
            public_key,
            success,
            status,
            error,
        );
    }

    fn log_error_on_token_requested_event(
        &self,
        token_type: TokenType,
        public_key: &str,
        error: &(dyn StdError + 'static),
    ) {
        self.logger
            .record_error(self.correlation_id(), token_type, public_key, error);
    }

    fn reset_session(&self) {
        rotate_id(&self.correlation_id);
        self.logger.sink.session_reset();
    }

    fn session(&self) -> Box<dyn TokenizationLogger + '_> {
        self.logger.session()
    }
}
