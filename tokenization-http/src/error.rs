//! Error types for building an HTTP token client.

use tokenization::error::TokenizationError;

/// Errors that can occur while constructing an [`HttpTokenClient`](crate::HttpTokenClient).
///
/// Request failures are not errors here; they surface as
/// [`NetworkApiResponse`](tokenization::network::NetworkApiResponse) variants.
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The public key cannot be sent as a header value.
    #[error("public key is not a valid header value")]
    InvalidPublicKey(#[source] http::header::InvalidHeaderValue),

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] TokenizationError),
}
