//! Token request orchestration.
//!
//! [`TokenRepository`] drives one token request through
//! `Validating → Dispatching → Responding → Completed`:
//!
//! - **Validating**: card details are checked locally. A rejection ends the
//!   request with [`TokenRequestError::Validation`]; nothing is logged and the
//!   network is not touched. Google Pay payloads skip this stage.
//! - **Dispatching**: the request event is logged, then the client is called.
//! - **Responding**: the response event is logged (plus the error event for
//!   local errors) and the session is reset.
//! - **Completed**: the request resolves to exactly one `Ok` or `Err`.
//!
//! Requests run either on the caller's task ([`TokenRepository::card_token`])
//! or on the repository's [`NetworkScope`]
//! ([`TokenRepository::send_card_token_request`]). Cancelling the scope stops
//! requests still waiting on the network; they log nothing further.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::card::Card;
use crate::error::TokenRequestError;
use crate::logging::TokenizationLogger;
use crate::network::{NetworkApiResponse, TokenNetworkApiClient};
use crate::request::{CardTokenRequestBody, TokenType};
use crate::response::{TokenDetails, TokenDetailsResponse};
use crate::validation::{CardValidator, Validator};

/// Result of one token request.
pub type TokenResult = Result<TokenDetails, TokenRequestError>;

/// Cancellation scope for token requests.
///
/// Clones share the same scope. Cancelling it makes every request still
/// awaiting the network resolve to [`TokenRequestError::Cancelled`].
#[derive(Clone, Default)]
pub struct NetworkScope {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl fmt::Debug for NetworkScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkScope")
            .field("cancelled", &self.token.is_cancelled())
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}

impl NetworkScope {
    /// Creates a new, independent scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scope that is also cancelled when `parent` is.
    #[must_use]
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            tracker: TaskTracker::new(),
        }
    }

    /// Tears the scope down.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the scope has been torn down.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of requests currently running on this scope.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Cancels the scope and waits for its tasks to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.token.cancel();
        self.tracker.wait().await;
    }

    fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(future)
    }
}

/// A token request running on a [`NetworkScope`].
///
/// Resolves to the request's [`TokenResult`]. Dropping it does not stop the
/// request.
#[derive(Debug)]
pub struct PendingToken {
    handle: JoinHandle<TokenResult>,
}

impl PendingToken {
    /// Stops the request if it has not completed yet.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Whether the request has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for PendingToken {
    type Output = TokenResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(Pin::new(&mut self.handle).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Poll::Ready(Err(TokenRequestError::Cancelled)),
        }
    }
}

struct Pipeline {
    client: Box<dyn TokenNetworkApiClient>,
    validator: Box<dyn Validator<Card>>,
    logger: Box<dyn TokenizationLogger>,
    public_key: String,
}

/// Entry point for card and Google Pay token requests.
///
/// Holds no per-request state; any number of requests may run concurrently.
#[derive(Clone)]
pub struct TokenRepository {
    pipeline: Arc<Pipeline>,
    scope: NetworkScope,
}

impl fmt::Debug for TokenRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRepository")
            .field("public_key", &self.pipeline.public_key)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl TokenRepository {
    /// Creates a repository with the default [`CardValidator`] and a fresh
    /// [`NetworkScope`].
    pub fn new(
        client: impl TokenNetworkApiClient + 'static,
        logger: impl TokenizationLogger + 'static,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                client: Box::new(client),
                validator: Box::new(CardValidator::new()),
                logger: Box::new(logger),
                public_key: public_key.into(),
            }),
            scope: NetworkScope::new(),
        }
    }

    /// Replaces the card validator.
    ///
    /// # Panics
    ///
    /// Panics if called on a repository that has already been cloned.
    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator<Card> + 'static) -> Self {
        Arc::get_mut(&mut self.pipeline)
            .expect("with_validator must be called before the repository is cloned")
            .validator = Box::new(validator);
        self
    }

    /// Runs spawned requests on `scope` instead of a private one.
    #[must_use]
    pub fn with_scope(mut self, scope: NetworkScope) -> Self {
        self.scope = scope;
        self
    }

    /// Returns the scope spawned requests run on.
    #[must_use]
    pub const fn scope(&self) -> &NetworkScope {
        &self.scope
    }

    /// Returns the public key logged with every request.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.pipeline.public_key
    }

    /// Tokenizes card details on the current task.
    ///
    /// # Errors
    ///
    /// Returns [`TokenRequestError`] describing why no token was issued.
    pub async fn card_token(&self, card: &Card) -> TokenResult {
        self.pipeline.card_token(card, &self.scope.token).await
    }

    /// Tokenizes a raw Google Pay payload on the current task.
    ///
    /// # Errors
    ///
    /// Returns [`TokenRequestError`] describing why no token was issued.
    pub async fn google_pay_token(&self, payload: &str) -> TokenResult {
        self.pipeline
            .google_pay_token(payload.to_owned(), &self.scope.token)
            .await
    }

    /// Spawns a card token request on the repository's scope.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn send_card_token_request(&self, card: Card) -> PendingToken {
        let pipeline = Arc::clone(&self.pipeline);
        let token = self.scope.token.clone();
        PendingToken {
            handle: self
                .scope
                .spawn(async move { pipeline.card_token(&card, &token).await }),
        }
    }

    /// Spawns a Google Pay token request on the repository's scope.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn send_google_pay_token_request(&self, payload: String) -> PendingToken {
        let pipeline = Arc::clone(&self.pipeline);
        let token = self.scope.token.clone();
        PendingToken {
            handle: self
                .scope
                .spawn(async move { pipeline.google_pay_token(payload, &token).await }),
        }
    }
}

impl Pipeline {
    async fn card_token(&self, card: &Card, cancel: &CancellationToken) -> TokenResult {
        if cancel.is_cancelled() {
            return Err(TokenRequestError::Cancelled);
        }
        if let Err(e) = self.validator.validate(card) {
            #[cfg(feature = "telemetry")]
            tracing::debug!(error = %e, "card rejected before dispatch");
            return Err(e.into());
        }
        let body = CardTokenRequestBody::from(card);

        let session = self.logger.session();
        session.log_token_request_event(TokenType::Card, &self.public_key);
        let outcome = self.client.send_card_token_request(body);
        self.respond(&*session, TokenType::Card, cancel, outcome).await
    }

    async fn google_pay_token(&self, payload: String, cancel: &CancellationToken) -> TokenResult {
        if cancel.is_cancelled() {
            return Err(TokenRequestError::Cancelled);
        }
        let session = self.logger.session();
        session.log_token_request_event(TokenType::GooglePay, &self.public_key);
        let outcome = self.client.send_google_pay_token_request(payload);
        self.respond(&*session, TokenType::GooglePay, cancel, outcome).await
    }

    async fn respond<F>(
        &self,
        session: &dyn TokenizationLogger,
        token_type: TokenType,
        cancel: &CancellationToken,
        outcome: F,
    ) -> TokenResult
    where
        F: Future<Output = NetworkApiResponse<TokenDetailsResponse>>,
    {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                #[cfg(feature = "telemetry")]
                tracing::debug!(%token_type, "token request cancelled while in flight");
                return Err(TokenRequestError::Cancelled);
            }
            outcome = outcome => outcome,
        };

        let key = self.public_key.as_str();
        let result = match outcome {
            NetworkApiResponse::Success(body) => {
                session.log_token_response_event(token_type, key, Some(&body), None, None);
                Ok(TokenDetails::from(body))
            }
            NetworkApiResponse::NetworkError(source) => {
                session.log_token_response_event(token_type, key, None, None, None);
                Err(TokenRequestError::Network { source })
            }
            NetworkApiResponse::ServerError { body, status } => {
                session.log_token_response_event(
                    token_type,
                    key,
                    None,
                    Some(status),
                    body.as_ref(),
                );
                Err(TokenRequestError::Server { status, body })
            }
            NetworkApiResponse::InternalError(error) => {
                session.log_token_response_event(token_type, key, None, None, None);
                session.log_error_on_token_requested_event(token_type, key, &error);
                Err(TokenRequestError::Internal(error))
            }
        };
        session.reset_session();

        #[cfg(feature = "telemetry")]
        {
            match &result {
                Ok(details) => tracing::info!(%token_type, token = %details.token, "token issued"),
                Err(e) => tracing::warn!(%token_type, error = %e, "token request failed"),
            }
        }

        result
    }
}
