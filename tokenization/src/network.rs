//! Network client abstraction for the tokenization endpoint.
//!
//! Every call resolves to exactly one [`NetworkApiResponse`] variant. Transport
//! failures, HTTP rejections and local parsing failures are kept apart because
//! the pipeline logs and surfaces each of them differently.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{BoxError, TokenizationError};
use crate::request::CardTokenRequestBody;
use crate::response::{ErrorResponse, TokenDetailsResponse};

/// Boxed, sendable future returned by dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a single call to the tokenization endpoint.
#[derive(Debug)]
pub enum NetworkApiResponse<T> {
    /// The service accepted the request.
    Success(T),
    /// No response was received.
    NetworkError(BoxError),
    /// The service answered with a non-success status.
    ServerError {
        /// Decoded error body, if any.
        body: Option<ErrorResponse>,
        /// HTTP status code.
        status: u16,
    },
    /// A local failure prevented or followed the call, e.g. a malformed payload.
    InternalError(TokenizationError),
}

impl<T> NetworkApiResponse<T> {
    /// Wraps a transport failure.
    pub fn network_error(error: impl Into<BoxError>) -> Self {
        Self::NetworkError(error.into())
    }

    /// Whether this is the [`NetworkApiResponse::Success`] variant.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Client for the tokenization endpoint.
///
/// Implementations must not share mutable state between calls; several
/// requests may be in flight at once.
pub trait TokenNetworkApiClient: Send + Sync {
    /// Requests a token for card details.
    fn send_card_token_request(
        &self,
        body: CardTokenRequestBody,
    ) -> BoxFuture<'_, NetworkApiResponse<TokenDetailsResponse>>;

    /// Requests a token for a raw Google Pay payload.
    ///
    /// A malformed payload must resolve to
    /// [`NetworkApiResponse::InternalError`] carrying
    /// [`ErrorCode::GooglePayRequestParsing`](crate::error::ErrorCode::GooglePayRequestParsing).
    fn send_google_pay_token_request(
        &self,
        payload: String,
    ) -> BoxFuture<'_, NetworkApiResponse<TokenDetailsResponse>>;
}

impl<C: TokenNetworkApiClient + ?Sized> TokenNetworkApiClient for Arc<C> {
    fn send_card_token_request(
        &self,
        body: CardTokenRequestBody,
    ) -> BoxFuture<'_, NetworkApiResponse<TokenDetailsResponse>> {
        (**self).send_card_token_request(body)
    }

    fn send_google_pay_token_request(
        &self,
        payload: String,
    ) -> BoxFuture<'_, NetworkApiResponse<TokenDetailsResponse>> {
        (**self).send_google_pay_token_request(payload)
    }
}
