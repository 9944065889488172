//! Client configuration.
//!
//! With the `config` feature, configuration is read from a TOML file whose
//! string values may reference environment variables as `$VAR` or `${VAR}`.
//!
//! ```toml
//! public_key = "$CKO_PUBLIC_KEY"
//! environment = "sandbox"
//! timeout_ms = 15000
//! ```
//!
//! # Environment Variables
//!
//! - `TOKENIZATION_CONFIG`: path to the file (default: `tokenization.toml`)
//! - `CKO_PUBLIC_KEY`: overrides `public_key`
//! - `CKO_ENVIRONMENT`: overrides `environment`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, TokenizationError};

/// Target deployment of the tokenization service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Test environment; no real money moves.
    #[default]
    Sandbox,
    /// Live environment.
    #[serde(alias = "live")]
    Production,
}

impl Environment {
    /// Returns the identifier used in config files and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = TokenizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" | "live" => Ok(Self::Production),
            other => Err(TokenizationError::new(
                ErrorCode::InvalidConfiguration,
                format!("unknown environment `{other}`"),
            )),
        }
    }
}

/// Settings needed to build a token client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizationConfig {
    /// Merchant public key, sent with every request and logged with every event.
    pub public_key: String,

    /// Target environment (default: `sandbox`).
    #[serde(default)]
    pub environment: Environment,

    /// Overrides the environment's base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds. No timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl TokenizationConfig {
    /// Creates a configuration for the given key and environment.
    #[must_use]
    pub fn new(public_key: impl Into<String>, environment: Environment) -> Self {
        Self {
            public_key: public_key.into(),
            environment,
            base_url: None,
            timeout_ms: None,
        }
    }

    /// Checks that the public key looks like one.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidConfiguration`] if the key is empty, still an
    /// unexpanded `$VAR` reference, or lacks the `pk_` prefix.
    pub fn validate(&self) -> Result<(), TokenizationError> {
        let key = self.public_key.trim();
        if key.is_empty() || key.starts_with('$') {
            return Err(TokenizationError::new(
                ErrorCode::InvalidConfiguration,
                "public key is not set",
            ));
        }
        if !key.starts_with("pk_") {
            return Err(TokenizationError::new(
                ErrorCode::InvalidConfiguration,
                "public key must start with `pk_`",
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "config")]
impl TokenizationConfig {
    /// Loads configuration from `TOKENIZATION_CONFIG`, falling back to
    /// `tokenization.toml`, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidConfiguration`] if the file cannot be read,
    /// parsed, or the result fails [`TokenizationConfig::validate`].
    pub fn load() -> Result<Self, TokenizationError> {
        let path =
            std::env::var("TOKENIZATION_CONFIG").unwrap_or_else(|_| "tokenization.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from `path`. A missing file is treated as empty so
    /// that environment variables alone can configure the client.
    ///
    /// # Errors
    ///
    /// See [`TokenizationConfig::load`].
    pub fn load_from(path: &str) -> Result<Self, TokenizationError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(TokenizationError::new(
                    ErrorCode::InvalidConfiguration,
                    format!("cannot read {path}"),
                )
                .with_source(e));
            }
        };
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text, expanding `$VAR` references and
    /// applying `CKO_PUBLIC_KEY` / `CKO_ENVIRONMENT` overrides.
    ///
    /// # Errors
    ///
    /// See [`TokenizationConfig::load`].
    pub fn from_toml_str(content: &str) -> Result<Self, TokenizationError> {
        let mut table: toml::Table = toml::from_str(&expand_env_vars(content)).map_err(|e| {
            TokenizationError::new(ErrorCode::InvalidConfiguration, "malformed configuration")
                .with_source(e)
        })?;
        if let Ok(key) = std::env::var("CKO_PUBLIC_KEY") {
            table.insert("public_key".to_owned(), toml::Value::String(key));
        }
        if let Ok(env) = std::env::var("CKO_ENVIRONMENT") {
            let env: Environment = env.parse()?;
            table.insert(
                "environment".to_owned(),
                toml::Value::String(env.as_str().to_owned()),
            );
        }
        let config: Self = toml::Value::Table(table).try_into().map_err(|e| {
            TokenizationError::new(ErrorCode::InvalidConfiguration, "invalid configuration")
                .with_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// Replaces `$VAR` and `${VAR}` with values from the process environment.
/// Unset variables are left verbatim so validation can report them.
#[cfg(feature = "config")]
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(inner) = after.strip_prefix('{') {
            match inner.find('}') {
                Some(end) => (&inner[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(after.len());
            (&after[..end], end)
        };
        match std::env::var(name) {
            Ok(value) if !name.is_empty() => out.push_str(&value),
            _ => out.push_str(&rest[pos..=pos + consumed]),
        }
        rest = &rest[pos + 1 + consumed..];
    }
    out.push_str(rest);
    out
}
