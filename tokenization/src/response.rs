//! Response bodies from the tokenization endpoint and their domain mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::{BillingAddress, Phone};

/// Success body returned by the tokenization endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDetailsResponse {
    /// Token type, `card` or `googlepay`.
    #[serde(rename = "type")]
    pub token_type: String,
    /// The token itself, e.g. `tok_...`.
    pub token: String,
    /// Instant after which the token can no longer be used.
    pub expires_on: DateTime<Utc>,
    /// Card expiry month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_month: Option<u32>,
    /// Card expiry year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_year: Option<u32>,
    /// Card scheme as reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Last four digits of the card number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last4: Option<String>,
    /// Bank identification number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,
    /// Card type, e.g. `CREDIT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    /// Card category, e.g. `CONSUMER`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_category: Option<String>,
    /// Issuing bank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Issuer country code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_country: Option<String>,
    /// Issuer product identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// Issuer product type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    /// Echoed billing address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<BillingAddress>,
    /// Echoed phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<Phone>,
    /// Echoed cardholder name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body returned alongside a non-success status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Request identifier for support correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Error category, e.g. `request_invalid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Detailed error codes, e.g. `card_number_invalid`.
    #[serde(default)]
    pub error_codes: Vec<String>,
}

/// Card metadata echoed back with a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardMetadata {
    /// Expiry month.
    pub expiry_month: Option<u32>,
    /// Expiry year.
    pub expiry_year: Option<u32>,
    /// Scheme name.
    pub scheme: Option<String>,
    /// Last four digits.
    pub last4: Option<String>,
    /// Bank identification number.
    pub bin: Option<String>,
    /// Card type.
    pub card_type: Option<String>,
    /// Card category.
    pub card_category: Option<String>,
    /// Issuing bank.
    pub issuer: Option<String>,
    /// Issuer country code.
    pub issuer_country: Option<String>,
    /// Issuer product identifier.
    pub product_id: Option<String>,
    /// Issuer product type.
    pub product_type: Option<String>,
}

/// Token handed back to the caller on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenDetails {
    /// The token.
    pub token: String,
    /// Token type as reported by the service.
    pub token_type: String,
    /// Expiry instant.
    pub expires_on: DateTime<Utc>,
    /// Card metadata.
    pub card: CardMetadata,
    /// Billing address.
    pub billing_address: Option<BillingAddress>,
    /// Phone.
    pub phone: Option<Phone>,
    /// Cardholder name.
    pub name: Option<String>,
}

impl From<TokenDetailsResponse> for TokenDetails {
    fn from(response: TokenDetailsResponse) -> Self {
        Self {
            token: response.token,
            token_type: response.token_type,
            expires_on: response.expires_on,
            card: CardMetadata {
                expiry_month: response.expiry_month,
                expiry_year: response.expiry_year,
                scheme: response.scheme,
                last4: response.last4,
                bin: response.bin,
                card_type: response.card_type,
                card_category: response.card_category,
                issuer: response.issuer,
                issuer_country: response.issuer_country,
                product_id: response.product_id,
                product_type: response.product_type,
            },
            billing_address: response.billing_address,
            phone: response.phone,
            name: response.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "type": "card",
        "token": "tok_ubfj2q76miwundwlk72vxt2i7q",
        "expires_on": "2026-10-18T12:15:00Z",
        "expiry_month": 6,
        "expiry_year": 2030,
        "scheme": "VISA",
        "last4": "4242",
        "bin": "424242",
        "card_type": "CREDIT",
        "card_category": "CONSUMER",
        "issuer_country": "GB",
        "billing_address": {"address_line1": "1 Main St", "country": "GB"}
    }"#;

    #[test]
    fn test_decodes_service_body() {
        let response: TokenDetailsResponse = serde_json::from_str(BODY).unwrap();
        assert_eq!(response.token, "tok_ubfj2q76miwundwlk72vxt2i7q");
        assert_eq!(response.last4.as_deref(), Some("4242"));
        assert_eq!(response.issuer, None);
        assert_eq!(
            response.billing_address.as_ref().map(|a| a.country.as_str()),
            Some("GB")
        );
    }

    #[test]
    fn test_maps_to_domain_details() {
        let response: TokenDetailsResponse = serde_json::from_str(BODY).unwrap();
        let expires_on = response.expires_on;
        let details = TokenDetails::from(response);
        assert_eq!(details.token, "tok_ubfj2q76miwundwlk72vxt2i7q");
        assert_eq!(details.token_type, "card");
        assert_eq!(details.expires_on, expires_on);
        assert_eq!(details.card.scheme.as_deref(), Some("VISA"));
        assert_eq!(details.card.expiry_year, Some(2030));
        assert_eq!(details.name, None);
    }

    #[test]
    fn test_error_response_defaults() {
        let body: ErrorResponse =
            serde_json::from_str(r#"{"request_id":"0HL80RJLS76I7","error_type":"request_invalid"}"#)
                .unwrap();
        assert_eq!(body.error_type.as_deref(), Some("request_invalid"));
        assert!(body.error_codes.is_empty());
    }
}
