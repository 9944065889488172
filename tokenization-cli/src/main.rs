//! Requests a card or Google Pay token from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Tokenize a test card in the sandbox
//! CKO_PUBLIC_KEY=pk_sbox_... cargo run -p tokenization-cli -- \
//!     card --number 4242424242424242 --expiry-month 6 --expiry-year 2030 --cvv 100
//!
//! # Tokenize a Google Pay payload read from a file
//! cargo run -p tokenization-cli -- google-pay --file token.json
//!
//! # Show analytics events
//! RUST_LOG=tokenization::events=info cargo run -p tokenization-cli -- ...
//! ```
//!
//! # Environment Variables
//!
//! - `.env` values loaded at startup
//! - `TOKENIZATION_CONFIG`: Path to TOML configuration file (default: `tokenization.toml`)
//! - `CKO_PUBLIC_KEY`: Merchant public key
//! - `CKO_ENVIRONMENT`: `sandbox` or `production`
//! - `RUST_LOG`: Log level filter (default: `warn`)

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokenization::card::Card;
use tokenization::config::{Environment, TokenizationConfig};
use tokenization::error::TokenRequestError;
use tokenization::logging::{EventLogger, TracingSink};
use tokenization::repository::{PendingToken, TokenRepository};
use tracing_subscriber::EnvFilter;

/// Request a card or Google Pay token.
#[derive(Parser, Debug)]
#[command(name = "tokenize", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "TOKENIZATION_CONFIG", default_value = "tokenization.toml")]
    config: PathBuf,

    /// Overrides the configured public key.
    #[arg(long)]
    public_key: Option<String>,

    /// Overrides the configured environment.
    #[arg(long)]
    environment: Option<Environment>,

    /// Overrides the base URL of the service.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tokenize card details.
    Card {
        /// Card number; spaces and dashes are ignored.
        #[arg(long)]
        number: String,
        /// Expiry month, 1-12.
        #[arg(long)]
        expiry_month: u32,
        /// Expiry year, two or four digits.
        #[arg(long)]
        expiry_year: u32,
        /// Card verification value.
        #[arg(long)]
        cvv: String,
        /// Cardholder name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Tokenize a Google Pay payment token.
    GooglePay {
        /// Payment token JSON.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        payload: Option<String>,
        /// File containing the payment token JSON.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Tokenization failed: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stdout)]
async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = TokenizationConfig::load_from(&cli.config.to_string_lossy())
        .or_else(|e| fallback_config(&cli, e))?;
    if let Some(key) = cli.public_key {
        config.public_key = key;
    }
    if let Some(environment) = cli.environment {
        config.environment = environment;
    }
    if cli.base_url.is_some() {
        config.base_url = cli.base_url;
    }
    tracing::info!(environment = %config.environment, "Loaded configuration");

    let repository =
        tokenization_http::repository_from_config(&config, EventLogger::new(TracingSink))?;

    let pending = match cli.command {
        Command::Card {
            number,
            expiry_month,
            expiry_year,
            cvv,
            name,
        } => {
            let mut card = Card::new(number, expiry_month, expiry_year, cvv);
            if let Some(name) = name {
                card = card.with_name(name);
            }
            repository.send_card_token_request(card)
        }
        Command::GooglePay { payload, file } => {
            let payload = match (payload, file) {
                (Some(payload), _) => payload,
                (None, Some(path)) => std::fs::read_to_string(path)?,
                (None, None) => return Err("either --payload or --file is required".into()),
            };
            repository.send_google_pay_token_request(payload)
        }
    };

    let details = wait_for_token(&repository, pending).await?;
    println!("{}", serde_json::to_string_pretty(&details)?);
    Ok(())
}

/// Uses flags alone when the configuration file is unusable but the key was
/// given on the command line.
fn fallback_config(
    cli: &Cli,
    error: tokenization::error::TokenizationError,
) -> Result<TokenizationConfig, tokenization::error::TokenizationError> {
    match &cli.public_key {
        Some(key) => {
            tracing::warn!(error = %error, "Ignoring configuration file");
            Ok(TokenizationConfig::new(
                key.clone(),
                cli.environment.unwrap_or_default(),
            ))
        }
        None => Err(error),
    }
}

/// Waits for the token, cancelling the request on Ctrl-C.
async fn wait_for_token(
    repository: &TokenRepository,
    pending: PendingToken,
) -> Result<tokenization::response::TokenDetails, TokenRequestError> {
    tokio::select! {
        result = pending => result.inspect_err(|e| {
            if let TokenRequestError::Server { body: Some(body), .. } = e {
                tracing::warn!(
                    request_id = ?body.request_id,
                    error_type = ?body.error_type,
                    error_codes = ?body.error_codes,
                    "Service rejected the request"
                );
            }
        }),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, cancelling...");
            repository.scope().shutdown().await;
            Err(TokenRequestError::Cancelled)
        }
    }
}
