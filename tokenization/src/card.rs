//! Card input model and card-scheme detection.
//!
//! A [`Card`] holds raw, unvalidated details as entered by the cardholder.
//! Nothing here rejects input; see [`crate::validation`] for the rules.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Raw card details supplied for one tokenization attempt.
///
/// `Debug` masks the number and CVV.
#[derive(Clone, PartialEq, Eq)]
pub struct Card {
    /// Card number, possibly containing spaces or dashes.
    pub number: String,
    /// Expiry month, `1..=12` when valid.
    pub expiry_month: u32,
    /// Expiry year, two or four digits.
    pub expiry_year: u32,
    /// Card verification value.
    pub cvv: String,
    /// Cardholder name.
    pub name: Option<String>,
    /// Billing address.
    pub billing_address: Option<BillingAddress>,
    /// Cardholder phone.
    pub phone: Option<Phone>,
}

impl Card {
    /// Creates a card from the mandatory fields.
    #[must_use]
    pub fn new(
        number: impl Into<String>,
        expiry_month: u32,
        expiry_year: u32,
        cvv: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            expiry_month,
            expiry_year,
            cvv: cvv.into(),
            name: None,
            billing_address: None,
            phone: None,
        }
    }

    /// Sets the cardholder name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the billing address.
    #[must_use]
    pub fn with_billing_address(mut self, address: BillingAddress) -> Self {
        self.billing_address = Some(address);
        self
    }

    /// Sets the cardholder phone.
    #[must_use]
    pub fn with_phone(mut self, phone: Phone) -> Self {
        self.phone = Some(phone);
        self
    }

    /// Returns the number with spaces and dashes removed.
    #[must_use]
    pub fn sanitized_number(&self) -> String {
        self.number
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect()
    }

    /// Returns the expiry year as four digits (`27` becomes `2027`).
    #[must_use]
    pub const fn normalized_expiry_year(&self) -> u32 {
        if self.expiry_year < 100 {
            2000 + self.expiry_year
        } else {
            self.expiry_year
        }
    }

    /// Detects the card scheme from the number prefix.
    #[must_use]
    pub fn scheme(&self) -> CardScheme {
        CardScheme::detect(&self.sanitized_number())
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let number = self.sanitized_number();
        let last4 = number
            .char_indices()
            .rev()
            .nth(3)
            .map_or("", |(i, _)| &number[i..]);
        f.debug_struct("Card")
            .field("number", &format_args!("****{last4}"))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvv", &"<redacted>")
            .field("name", &self.name)
            .field("billing_address", &self.billing_address)
            .field("phone", &self.phone)
            .finish()
    }
}

/// Cardholder billing address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAddress {
    /// First address line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    /// Second address line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    /// City.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// State or region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Postal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

/// Cardholder phone number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    /// International dialling prefix, e.g. `+44`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// Subscriber number.
    pub number: String,
}

/// Card network inferred from the number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardScheme {
    /// Visa.
    Visa,
    /// Mastercard.
    Mastercard,
    /// American Express.
    Amex,
    /// Diners Club.
    DinersClub,
    /// Discover.
    Discover,
    /// JCB.
    Jcb,
    /// Maestro.
    Maestro,
    /// Prefix not recognised.
    Unknown,
}

/// Prefix patterns in match order. Discover and JCB precede Maestro because
/// Maestro's `6xxx` ranges would otherwise shadow them.
static SCHEME_PATTERNS: LazyLock<Vec<(CardScheme, Regex)>> = LazyLock::new(|| {
    [
        (CardScheme::Visa, r"^4"),
        (
            CardScheme::Mastercard,
            r"^(5[1-5]|222[1-9]|22[3-9]\d|2[3-6]\d{2}|27[01]\d|2720)",
        ),
        (CardScheme::Amex, r"^3[47]"),
        (CardScheme::DinersClub, r"^3(0[0-5]|[689])"),
        (CardScheme::Jcb, r"^35(2[89]|[3-8])"),
        (CardScheme::Discover, r"^(6011|65|64[4-9]|622)"),
        (CardScheme::Maestro, r"^(5018|5020|5038|56|57|58|6304|6759|676[1-3])"),
    ]
    .into_iter()
    .map(|(scheme, pattern)| (scheme, Regex::new(pattern).expect("valid scheme pattern")))
    .collect()
});

impl CardScheme {
    /// Detects the scheme of a sanitized card number.
    #[must_use]
    pub fn detect(number: &str) -> Self {
        SCHEME_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(number))
            .map_or(Self::Unknown, |(scheme, _)| *scheme)
    }

    /// Returns the lowercase identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::DinersClub => "diners_club",
            Self::Discover => "discover",
            Self::Jcb => "jcb",
            Self::Maestro => "maestro",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a number of `len` digits is issued under this scheme.
    #[must_use]
    pub fn accepts_number_length(self, len: usize) -> bool {
        match self {
            Self::Visa => matches!(len, 13 | 16 | 19),
            Self::Mastercard => len == 16,
            Self::Amex => len == 15,
            Self::DinersClub => matches!(len, 14 | 16 | 19),
            Self::Discover => matches!(len, 16 | 19),
            Self::Jcb => (16..=19).contains(&len),
            Self::Maestro | Self::Unknown => (12..=19).contains(&len),
        }
    }

    /// Whether a CVV of `len` digits is valid for this scheme.
    #[must_use]
    pub const fn accepts_cvv_length(self, len: usize) -> bool {
        match self {
            Self::Amex => len == 4,
            Self::Unknown => matches!(len, 3 | 4),
            _ => len == 3,
        }
    }
}

impl fmt::Display for CardScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Luhn mod-10 checksum over an all-digit string.
///
/// Returns `false` for empty input or any non-digit character.
#[must_use]
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }
    let mut sum = 0u32;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}
