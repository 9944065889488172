//! Request bodies sent to the tokenization endpoint.
//!
//! Card input is mapped field by field. A Google Pay payload is forwarded as
//! the wallet's `token_data` with only its envelope checked; the service owns
//! schema validation of the signed message.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::card::{BillingAddress, Card, Phone};
use crate::error::{ErrorCode, TokenizationError};

/// Kind of token being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Raw card details.
    Card,
    /// Google Pay wallet token.
    GooglePay,
}

impl TokenType {
    /// Returns the wire identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::GooglePay => "googlepay",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a card token request.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CardTokenRequestBody {
    /// Always [`TokenType::Card`].
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Digits-only card number.
    pub number: String,
    /// Two-digit expiry month.
    pub expiry_month: String,
    /// Four-digit expiry year.
    pub expiry_year: String,
    /// Cardholder name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Card verification value.
    pub cvv: String,
    /// Billing address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<BillingAddress>,
    /// Cardholder phone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<Phone>,
}

impl fmt::Debug for CardTokenRequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardTokenRequestBody")
            .field("token_type", &self.token_type)
            .field("number", &"<redacted>")
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("name", &self.name)
            .field("cvv", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl From<&Card> for CardTokenRequestBody {
    fn from(card: &Card) -> Self {
        Self {
            token_type: TokenType::Card,
            number: card.sanitized_number(),
            expiry_month: format!("{:02}", card.expiry_month),
            expiry_year: card.normalized_expiry_year().to_string(),
            name: card.name.as_ref().map(|n| n.trim().to_owned()),
            cvv: card.cvv.clone(),
            billing_address: card.billing_address.clone(),
            phone: card.phone.clone(),
        }
    }
}

/// Envelope fields of a Google Pay payment token.
///
/// Unknown members are kept and forwarded untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GooglePayTokenData {
    /// Google Pay protocol version, e.g. `ECv2`.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Signature over the signed message.
    pub signature: String,
    /// Encrypted payment data.
    #[serde(rename = "signedMessage")]
    pub signed_message: String,
    /// Any further members of the payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a Google Pay token request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GooglePayTokenRequestBody {
    /// Always [`TokenType::GooglePay`].
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// The wallet payload.
    pub token_data: GooglePayTokenData,
}

impl GooglePayTokenRequestBody {
    /// Wraps a raw Google Pay payload.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenizationError`] with
    /// [`ErrorCode::GooglePayRequestParsing`] if the payload is not a JSON
    /// object with `protocolVersion`, `signature` and `signedMessage` strings.
    pub fn from_payload(payload: &str) -> Result<Self, TokenizationError> {
        let token_data = serde_json::from_str::<GooglePayTokenData>(payload).map_err(|e| {
            TokenizationError::new(
                ErrorCode::GooglePayRequestParsing,
                format!("invalid Google Pay payload: {e}"),
            )
            .with_source(e)
        })?;
        Ok(Self {
            token_type: TokenType::GooglePay,
            token_data,
        })
    }
}
