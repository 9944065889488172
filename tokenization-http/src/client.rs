//! A [`TokenNetworkApiClient`] that talks to the tokenization endpoint over HTTP.
//!
//! [`HttpTokenClient`] sends `POST /tokens` with the merchant public key in the
//! `Authorization` header and folds every outcome into a
//! [`NetworkApiResponse`]:
//!
//! - transport failures and timeouts become `NetworkError`
//! - non-2xx statuses become `ServerError`, with the body decoded when possible
//! - an undecodable 2xx body becomes `InternalError`
//!
//! Integrates with `tracing` if the `telemetry` feature is enabled.

use std::time::Duration;

use http::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use tokenization::config::{Environment, TokenizationConfig};
use tokenization::error::{ErrorCode, TokenizationError};
use tokenization::logging::TokenizationLogger;
use tokenization::network::{BoxFuture, NetworkApiResponse, TokenNetworkApiClient};
use tokenization::repository::TokenRepository;
use tokenization::request::{CardTokenRequestBody, GooglePayTokenRequestBody};
use tokenization::response::{ErrorResponse, TokenDetailsResponse};
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::constants::{AUTHORIZATION_HEADER, PRODUCTION_BASE_URL, SANDBOX_BASE_URL, TOKENS_PATH};
use crate::error::HttpClientError;

type TokenOutcome = NetworkApiResponse<TokenDetailsResponse>;

/// HTTP client for the tokenization endpoint.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HttpTokenClient {
    /// Base URL of the service (e.g. `https://api.sandbox.checkout.com/`)
    base_url: Url,
    /// Full URL of `POST /tokens`
    tokens_url: Url,
    /// Shared Reqwest HTTP client
    client: Client,
    /// Public key sent as `Authorization`
    authorization: HeaderValue,
    /// Optional custom headers sent with each request
    headers: HeaderMap,
    /// Optional request timeout
    timeout: Option<Duration>,
}

impl std::fmt::Debug for HttpTokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenClient")
            .field("tokens_url", &self.tokens_url.as_str())
            .field("headers", &self.headers.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpTokenClient {
    /// Constructs a client for `base_url`, authenticating with `public_key`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] if the token URL cannot be derived from
    /// `base_url` or the key is not a valid header value.
    pub fn try_new(base_url: Url, public_key: &str) -> Result<Self, HttpClientError> {
        let tokens_url = base_url
            .join(TOKENS_PATH)
            .map_err(|e| HttpClientError::UrlParse {
                context: "Failed to construct ./tokens URL",
                source: e,
            })?;
        let mut authorization =
            HeaderValue::from_str(public_key).map_err(HttpClientError::InvalidPublicKey)?;
        authorization.set_sensitive(true);
        let client = Client::builder()
            .build()
            .map_err(HttpClientError::ClientBuild)?;
        Ok(Self {
            base_url,
            tokens_url,
            client,
            authorization,
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    /// Constructs a client for one of the hosted environments.
    ///
    /// # Errors
    ///
    /// See [`HttpTokenClient::try_new`].
    pub fn for_environment(
        environment: Environment,
        public_key: &str,
    ) -> Result<Self, HttpClientError> {
        let base = match environment {
            Environment::Sandbox => SANDBOX_BASE_URL,
            Environment::Production => PRODUCTION_BASE_URL,
        };
        Self::try_new(parse_base_url(base)?, public_key)
    }

    /// Constructs a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::Config`] if the configuration is invalid, or
    /// any error of [`HttpTokenClient::try_new`].
    pub fn from_config(config: &TokenizationConfig) -> Result<Self, HttpClientError> {
        config.validate()?;
        let mut client = match &config.base_url {
            Some(base) => Self::try_new(parse_base_url(base)?, &config.public_key)?,
            None => Self::for_environment(config.environment, &config.public_key)?,
        };
        if let Some(ms) = config.timeout_ms {
            client = client.with_timeout(Duration::from_millis(ms));
        }
        Ok(client)
    }

    /// Returns the base URL used by this client.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./tokens` URL relative to [`HttpTokenClient::base_url`].
    pub const fn tokens_url(&self) -> &Url {
        &self.tokens_url
    }

    /// Returns the configured timeout, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Attaches custom headers to all future requests.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends a card token request.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "tokenization.http_client.card",
            skip_all,
            fields(timeout = ?self.timeout)
        )
    )]
    pub async fn card_token(&self, body: &CardTokenRequestBody) -> TokenOutcome {
        self.post_json("POST /tokens (card)", body).await
    }

    /// Sends a Google Pay token request. The payload is checked before any
    /// request is made.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "tokenization.http_client.google_pay",
            skip_all,
            fields(timeout = ?self.timeout)
        )
    )]
    pub async fn google_pay_token(&self, payload: &str) -> TokenOutcome {
        match GooglePayTokenRequestBody::from_payload(payload) {
            Ok(body) => self.post_json("POST /tokens (googlepay)", &body).await,
            Err(e) => NetworkApiResponse::InternalError(e),
        }
    }

    async fn post_json<T>(&self, context: &'static str, payload: &T) -> TokenOutcome
    where
        T: serde::Serialize + Sync + ?Sized,
    {
        let mut req = self
            .client
            .post(self.tokens_url.clone())
            .header(AUTHORIZATION_HEADER, self.authorization.clone())
            .json(payload);
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let outcome = match req.send().await {
            Ok(http_response) => {
                let status = http_response.status();
                match http_response.bytes().await {
                    Ok(bytes) if status.is_success() => decode_token(context, &bytes),
                    Ok(bytes) => NetworkApiResponse::ServerError {
                        body: serde_json::from_slice::<ErrorResponse>(&bytes).ok(),
                        status: status.as_u16(),
                    },
                    Err(e) => NetworkApiResponse::network_error(e),
                }
            }
            Err(e) => NetworkApiResponse::network_error(e),
        };

        record_outcome(context, &outcome);

        outcome
    }
}

impl TokenNetworkApiClient for HttpTokenClient {
    fn send_card_token_request(
        &self,
        body: CardTokenRequestBody,
    ) -> BoxFuture<'_, TokenOutcome> {
        Box::pin(async move { self.card_token(&body).await })
    }

    fn send_google_pay_token_request(&self, payload: String) -> BoxFuture<'_, TokenOutcome> {
        Box::pin(async move { self.google_pay_token(&payload).await })
    }
}

/// Converts a string URL into an `HttpTokenClient` base, parsing the URL and
/// ensuring a single trailing slash.
fn parse_base_url(value: &str) -> Result<Url, HttpClientError> {
    let mut normalized = value.trim_end_matches('/').to_string();
    normalized.push('/');
    Url::parse(&normalized).map_err(|e| HttpClientError::UrlParse {
        context: "Failed to parse base url",
        source: e,
    })
}

fn decode_token(context: &'static str, bytes: &[u8]) -> TokenOutcome {
    match serde_json::from_slice::<TokenDetailsResponse>(bytes) {
        Ok(body) => NetworkApiResponse::Success(body),
        Err(e) => NetworkApiResponse::InternalError(
            TokenizationError::new(
                ErrorCode::TokenResponseParsing,
                format!("{context}: malformed token response: {e}"),
            )
            .with_source(e),
        ),
    }
}

/// Records the outcome of a request on the current span.
#[cfg(feature = "telemetry")]
fn record_outcome(context: &'static str, outcome: &TokenOutcome) {
    match outcome {
        NetworkApiResponse::Success(_) => tracing::debug!(context, "token request succeeded"),
        NetworkApiResponse::NetworkError(e) => {
            tracing::warn!(context, error = %e, "token request did not reach the service");
        }
        NetworkApiResponse::ServerError { status, .. } => {
            tracing::warn!(context, status, "token request rejected");
        }
        NetworkApiResponse::InternalError(e) => {
            tracing::error!(context, code = %e.code(), error = %e, "token response unreadable");
        }
    }
}

/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
const fn record_outcome(_context: &'static str, _outcome: &TokenOutcome) {}

/// Builds a [`TokenRepository`] backed by an [`HttpTokenClient`].
///
/// Logs the client-initialised event on `logger` before handing it to the
/// repository.
///
/// # Errors
///
/// See [`HttpTokenClient::from_config`].
pub fn repository_from_config<L>(
    config: &TokenizationConfig,
    logger: L,
) -> Result<TokenRepository, HttpClientError>
where
    L: TokenizationLogger + 'static,
{
    let client = HttpTokenClient::from_config(config)?;
    logger.log_client_initialised_event(config.environment);
    Ok(TokenRepository::new(
        client,
        logger,
        config.public_key.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokenization::card::Card;
    use tokenization::error::TokenRequestError;
    use tokenization::logging::{EventLogger, MemorySink, TokenizationEventType, attribute};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "pk_sbox_test";
    const GOOGLE_PAY_PAYLOAD: &str =
        r#"{"protocolVersion":"ECv1","signature":"sig","signedMessage":"msg"}"#;

    fn token_response() -> serde_json::Value {
        json!({
            "type": "card",
            "token": "tok_ubfj2q76miwundwlk72vxt2i7q",
            "expires_on": "2026-10-18T12:15:00Z",
            "expiry_month": 6,
            "expiry_year": 2030,
            "scheme": "VISA",
            "last4": "4242",
            "bin": "424242",
            "card_type": "CREDIT",
        })
    }

    fn card_body() -> CardTokenRequestBody {
        CardTokenRequestBody::from(&Card::new("4242 4242 4242 4242", 6, 30, "100"))
    }

    async fn client_for(server: &MockServer) -> HttpTokenClient {
        HttpTokenClient::try_new(server.uri().parse::<Url>().unwrap(), KEY).unwrap()
    }

    #[tokio::test]
    async fn test_card_request_is_posted_with_public_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .and(header(AUTHORIZATION_HEADER, KEY))
            .and(body_partial_json(json!({
                "type": "card",
                "number": "4242424242424242",
                "expiry_month": "06",
                "expiry_year": "2030",
                "cvv": "100",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(token_response()))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server).await.card_token(&card_body()).await;

        let NetworkApiResponse::Success(body) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(body.token, "tok_ubfj2q76miwundwlk72vxt2i7q");
        assert_eq!(body.scheme.as_deref(), Some("VISA"));
    }

    #[tokio::test]
    async fn test_google_pay_request_forwards_token_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .and(body_partial_json(json!({
                "type": "googlepay",
                "token_data": {
                    "protocolVersion": "ECv1",
                    "signature": "sig",
                    "signedMessage": "msg",
                },
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(token_response()))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .await
            .send_google_pay_token_request(GOOGLE_PAY_PAYLOAD.to_owned())
            .await;

        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_malformed_google_pay_payload_is_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(token_response()))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = client_for(&server).await.google_pay_token("{test: ECv1}").await;

        let NetworkApiResponse::InternalError(e) = outcome else {
            panic!("expected internal error, got {outcome:?}");
        };
        assert_eq!(e.code(), ErrorCode::GooglePayRequestParsing);
    }

    #[tokio::test]
    async fn test_server_error_body_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "request_id": "0HL80RJLS76I7",
                "error_type": "request_invalid",
                "error_codes": ["card_number_invalid"],
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server).await.card_token(&card_body()).await;

        let NetworkApiResponse::ServerError { body, status } = outcome else {
            panic!("expected server error, got {outcome:?}");
        };
        assert_eq!(status, 422);
        let body = body.unwrap();
        assert_eq!(body.request_id.as_deref(), Some("0HL80RJLS76I7"));
        assert_eq!(body.error_codes, vec!["card_number_invalid"]);
    }

    #[tokio::test]
    async fn test_server_error_without_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(501).set_body_string("Not Implemented"))
            .mount(&server)
            .await;

        let outcome = client_for(&server).await.card_token(&card_body()).await;

        assert!(matches!(
            outcome,
            NetworkApiResponse::ServerError {
                body: None,
                status: 501
            }
        ));
    }

    #[tokio::test]
    async fn test_undecodable_success_body_is_internal_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": 42})))
            .mount(&server)
            .await;

        let outcome = client_for(&server).await.card_token(&card_body()).await;

        let NetworkApiResponse::InternalError(e) = outcome else {
            panic!("expected internal error, got {outcome:?}");
        };
        assert_eq!(e.code(), ErrorCode::TokenResponseParsing);
        assert!(std::error::Error::source(&e).is_some());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let base_url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
        let client = HttpTokenClient::try_new(base_url, KEY).unwrap();

        let outcome = client.card_token(&card_body()).await;

        assert!(matches!(outcome, NetworkApiResponse::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(token_response())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server)
            .await
            .with_timeout(Duration::from_millis(50));
        let outcome = client.card_token(&card_body()).await;

        assert!(matches!(outcome, NetworkApiResponse::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_custom_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-merchant-app", "demo"))
            .respond_with(ResponseTemplate::new(201).set_body_json(token_response()))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-merchant-app", HeaderValue::from_static("demo"));
        let outcome = client_for(&server)
            .await
            .with_headers(headers)
            .card_token(&card_body())
            .await;

        assert!(outcome.is_success());
    }

    #[test]
    fn test_environment_base_urls() {
        let sandbox = HttpTokenClient::for_environment(Environment::Sandbox, KEY).unwrap();
        assert_eq!(
            sandbox.tokens_url().as_str(),
            "https://api.sandbox.checkout.com/tokens"
        );
        let live = HttpTokenClient::for_environment(Environment::Production, KEY).unwrap();
        assert_eq!(live.tokens_url().as_str(), "https://api.checkout.com/tokens");
    }

    #[test]
    fn test_config_base_url_override_and_timeout() {
        let mut config = TokenizationConfig::new(KEY, Environment::Production);
        config.base_url = Some("http://localhost:8080/v2//".into());
        config.timeout_ms = Some(1500);

        let client = HttpTokenClient::from_config(&config).unwrap();

        assert_eq!(client.tokens_url().as_str(), "http://localhost:8080/v2/tokens");
        assert_eq!(client.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TokenizationConfig::new("sk_secret", Environment::Sandbox);
        assert!(matches!(
            HttpTokenClient::from_config(&config),
            Err(HttpClientError::Config(_))
        ));
        assert!(matches!(
            HttpTokenClient::try_new("https://example.com/".parse().unwrap(), "pk_\nbad"),
            Err(HttpClientError::InvalidPublicKey(_))
        ));
    }

    #[tokio::test]
    async fn test_repository_from_config_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .respond_with(ResponseTemplate::new(201).set_body_json(token_response()))
            .mount(&server)
            .await;
        let mut config = TokenizationConfig::new(KEY, Environment::Sandbox);
        config.base_url = Some(server.uri());
        let logger = Arc::new(EventLogger::new(MemorySink::new()));

        let repository = repository_from_config(&config, Arc::clone(&logger)).unwrap();
        let details = repository
            .card_token(&Card::new("4242424242424242", 6, 2030, "100"))
            .await
            .unwrap();

        assert_eq!(details.token, "tok_ubfj2q76miwundwlk72vxt2i7q");
        assert_eq!(details.card.bin.as_deref(), Some("424242"));
        let events = logger.sink().events();
        let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                TokenizationEventType::ClientInitialised,
                TokenizationEventType::TokenRequested,
                TokenizationEventType::TokenResponse,
            ]
        );
        assert_eq!(events[1].property(attribute::PUBLIC_KEY), Some(&json!(KEY)));
        assert_eq!(logger.sink().session_resets(), 1);
    }

    #[tokio::test]
    async fn test_repository_surfaces_server_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let mut config = TokenizationConfig::new(KEY, Environment::Sandbox);
        config.base_url = Some(server.uri());
        let logger = Arc::new(EventLogger::new(MemorySink::new()));

        let repository = repository_from_config(&config, Arc::clone(&logger)).unwrap();
        let err = repository
            .google_pay_token(GOOGLE_PAY_PAYLOAD)
            .await
            .unwrap_err();

        assert!(matches!(err, TokenRequestError::Server { status: 401, body: None }));
        let response = &logger.sink().events()[2];
        assert_eq!(response.property(attribute::HTTP_STATUS_CODE), Some(&json!(401)));
    }
}
