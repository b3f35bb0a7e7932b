//! Phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone cannot be empty")]
    Empty,
    /// The input contains characters other than digits and common separators.
    #[error("phone contains invalid characters")]
    InvalidCharacters,
    /// The number of digits is outside the accepted range.
    #[error("phone must have between {min} and {max} digits")]
    InvalidLength {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
    },
}

/// A customer or staff phone number, stored as digits only.
///
/// Separators (spaces, dashes, dots, parentheses) and a leading `+` are
/// accepted on input and stripped. Ten-digit numbers are treated as North
/// American and prefixed with country code `1`, which is the form the chat
/// provider expects.
///
/// ## Examples
///
/// ```
/// use panaderia_core::Phone;
///
/// let phone = Phone::parse("(555) 010-2030").unwrap();
/// assert_eq!(phone.as_str(), "15550102030");
///
/// assert!(Phone::parse("call me").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Minimum number of digits (national number without country code).
    pub const MIN_DIGITS: usize = 10;
    /// Maximum number of digits (E.164 limit).
    pub const MAX_DIGITS: usize = 15;

    /// Parse a `Phone` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains letters or other
    /// unexpected characters, or has too few / too many digits.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        let mut digits = String::with_capacity(s.len());
        for (i, c) in s.chars().enumerate() {
            match c {
                '0'..='9' => digits.push(c),
                '+' if i == 0 => {}
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(PhoneError::InvalidCharacters),
            }
        }

        if digits.len() == Self::MIN_DIGITS {
            digits.insert(0, '1');
        }

        if digits.len() < Self::MIN_DIGITS || digits.len() > Self::MAX_DIGITS {
            return Err(PhoneError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(digits))
    }

    /// Returns the digits as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", self.0)
    }
}

impl TryFrom<String> for Phone {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_us_number_gets_country_code() {
        assert_eq!(Phone::parse("555-010-2030").unwrap().as_str(), "15550102030");
        assert_eq!(Phone::parse("(555) 010 2030").unwrap().as_str(), "15550102030");
    }

    #[test]
    fn test_parse_international() {
        assert_eq!(Phone::parse("+52 55 1234 5678").unwrap().as_str(), "525512345678");
    }

    #[test]
    fn test_parse_rejects_letters() {
        assert_eq!(Phone::parse("555-CAKE"), Err(PhoneError::InvalidCharacters));
        assert_eq!(Phone::parse("55+5010203"), Err(PhoneError::InvalidCharacters));
    }

    #[test]
    fn test_parse_rejects_short_and_long() {
        assert!(matches!(
            Phone::parse("12345"),
            Err(PhoneError::InvalidLength { .. })
        ));
        assert!(matches!(
            Phone::parse("1234567890123456"),
            Err(PhoneError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Phone::parse("   "), Err(PhoneError::Empty));
    }

    #[test]
    fn test_display_has_plus() {
        assert_eq!(Phone::parse("5550102030").unwrap().to_string(), "+15550102030");
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<Phone, _> = serde_json::from_str("\"555 010 2030\"");
        assert!(ok.is_ok());
        let bad: Result<Phone, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
