//! HTTP-specific constants for the tokenization endpoint.

/// Base URL of the sandbox environment.
pub const SANDBOX_BASE_URL: &str = "https://api.sandbox.checkout.com/";

/// Base URL of the production environment.
pub const PRODUCTION_BASE_URL: &str = "https://api.checkout.com/";

/// Token endpoint, relative to the base URL.
pub const TOKENS_PATH: &str = "tokens";

/// Header carrying the merchant public key.
pub const AUTHORIZATION_HEADER: &str = "Authorization";
