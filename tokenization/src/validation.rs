//! Local validation of card details.
//!
//! Validation gates the card path of the pipeline: a card that fails here is
//! never sent over the network. All violated rules are reported at once.

use std::fmt;

use chrono::{Datelike, Utc};

use crate::card::{Card, luhn_valid};

/// Result of validating an input.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A pure check over some input.
pub trait Validator<T: ?Sized>: Send + Sync {
    /// Validates `input`, returning every violated rule on failure.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] listing the violations.
    fn validate(&self, input: &T) -> ValidationResult<()>;
}

/// Card field a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardField {
    /// Card number.
    Number,
    /// Expiry month.
    ExpiryMonth,
    /// Expiry year.
    ExpiryYear,
    /// Card verification value.
    Cvv,
    /// Cardholder name.
    Name,
    /// Billing address country.
    BillingCountry,
    /// Phone number.
    Phone,
}

impl CardField {
    /// Returns the field name as used in request bodies.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::ExpiryMonth => "expiry_month",
            Self::ExpiryYear => "expiry_year",
            Self::Cvv => "cvv",
            Self::Name => "name",
            Self::BillingCountry => "billing_address.country",
            Self::Phone => "phone.number",
        }
    }
}

/// Why a field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationReason {
    /// Required value is empty or blank.
    Empty,
    /// Value must contain digits only.
    NonNumeric,
    /// Number of characters is not accepted.
    InvalidLength,
    /// Luhn checksum does not match.
    ChecksumMismatch,
    /// Value is outside the accepted range.
    OutOfRange,
    /// Expiry date lies in the past.
    Expired,
    /// Value does not have the expected shape.
    InvalidFormat,
}

impl ViolationReason {
    /// Returns a short description.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "is empty",
            Self::NonNumeric => "must contain digits only",
            Self::InvalidLength => "has an invalid length",
            Self::ChecksumMismatch => "failed the checksum",
            Self::OutOfRange => "is out of range",
            Self::Expired => "is in the past",
            Self::InvalidFormat => "is malformed",
        }
    }
}

/// A single violated rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldViolation {
    /// Offending field.
    pub field: CardField,
    /// Violated rule.
    pub reason: ViolationReason,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field.as_str(), self.reason.as_str())
    }
}

/// Non-empty set of violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Builds an error from collected violations, or `None` when there are none.
    #[must_use]
    pub fn from_violations(violations: Vec<FieldViolation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    /// Returns the violations in the order they were found.
    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Whether `field` has at least one violation.
    #[must_use]
    pub fn has_violation(&self, field: CardField) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid card details: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Format rules for [`Card`] input.
///
/// Expiry is checked against the current UTC month unless a reference month
/// is pinned with [`CardValidator::at`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CardValidator {
    reference: Option<(u32, u32)>,
}

impl CardValidator {
    /// Creates a validator that checks expiry against the current month.
    #[must_use]
    pub const fn new() -> Self {
        Self { reference: None }
    }

    /// Creates a validator that treats `year`/`month` as the current month.
    #[must_use]
    pub const fn at(year: u32, month: u32) -> Self {
        Self {
            reference: Some((year, month)),
        }
    }

    fn reference_month(&self) -> (u32, u32) {
        self.reference.unwrap_or_else(|| {
            let today = Utc::now().date_naive();
            (today.year().unsigned_abs(), today.month())
        })
    }
}

impl Validator<Card> for CardValidator {
    fn validate(&self, card: &Card) -> ValidationResult<()> {
        let mut violations = Vec::new();
        let mut reject = |field, reason| violations.push(FieldViolation { field, reason });

        let number = card.sanitized_number();
        let scheme = card.scheme();
        if number.is_empty() {
            reject(CardField::Number, ViolationReason::Empty);
        } else if !number.chars().all(|c| c.is_ascii_digit()) {
            reject(CardField::Number, ViolationReason::NonNumeric);
        } else if !scheme.accepts_number_length(number.len()) {
            reject(CardField::Number, ViolationReason::InvalidLength);
        } else if !luhn_valid(&number) {
            reject(CardField::Number, ViolationReason::ChecksumMismatch);
        }

        let month_valid = (1..=12).contains(&card.expiry_month);
        if !month_valid {
            reject(CardField::ExpiryMonth, ViolationReason::OutOfRange);
        }
        let year = card.normalized_expiry_year();
        if !(2000..=9999).contains(&year) {
            reject(CardField::ExpiryYear, ViolationReason::OutOfRange);
        } else if month_valid {
            let (current_year, current_month) = self.reference_month();
            if (year, card.expiry_month) < (current_year, current_month) {
                reject(CardField::ExpiryYear, ViolationReason::Expired);
            }
        }

        if card.cvv.is_empty() {
            reject(CardField::Cvv, ViolationReason::Empty);
        } else if !card.cvv.chars().all(|c| c.is_ascii_digit()) {
            reject(CardField::Cvv, ViolationReason::NonNumeric);
        } else if !scheme.accepts_cvv_length(card.cvv.len()) {
            reject(CardField::Cvv, ViolationReason::InvalidLength);
        }

        if card.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            reject(CardField::Name, ViolationReason::Empty);
        }

        if let Some(address) = &card.billing_address {
            let country = address.country.trim();
            if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
                reject(CardField::BillingCountry, ViolationReason::InvalidFormat);
            }
        }

        if let Some(phone) = &card.phone {
            let allowed = phone.number.chars().enumerate().all(|(i, c)| {
                c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')') || (i == 0 && c == '+')
            });
            let digits = phone.number.chars().filter(char::is_ascii_digit).count();
            if !allowed {
                reject(CardField::Phone, ViolationReason::InvalidFormat);
            } else if !(6..=25).contains(&digits) {
                reject(CardField::Phone, ViolationReason::InvalidLength);
            }
        }

        ValidationError::from_violations(violations).map_or(Ok(()), Err)
    }
}
