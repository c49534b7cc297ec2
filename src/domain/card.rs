use std::fmt;
use std::str::FromStr;

use rand::Rng;
use thiserror::Error;

/// Issuer identification digits every card number starts with.
pub const ISSUER_PREFIX: &str = "400000";

/// Total length of a card number, check digit included.
pub const CARD_NUMBER_LEN: usize = 16;

/// Random digits between the issuer prefix and the check digit.
const ACCOUNT_DIGITS: usize = CARD_NUMBER_LEN - ISSUER_PREFIX.len() - 1;

/// Compute the Luhn-style check digit for the leading digits of a card number.
///
/// Digits at even zero-based positions are doubled (minus 9 when the result
/// exceeds 9) and everything is summed. The check digit is whatever brings
/// the sum up to a multiple of 10. Intended for the 15-digit body of a card
/// number; returns `None` if any character is not an ASCII digit.
pub fn check_digit(digits: &str) -> Option<u8> {
    let mut sum = 0u32;
    for (index, c) in digits.chars().enumerate() {
        let mut digit = c.to_digit(10)?;
        if index % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }

    let remainder = sum % 10;
    Some(if remainder == 0 { 0 } else { (10 - remainder) as u8 })
}

/// Returns true if `candidate` is 16 digits whose last digit is the check
/// digit of the first 15.
pub fn validate_format(candidate: &str) -> bool {
    CardNumber::parse(candidate).is_ok()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CardNumberError {
    #[error("card number must be 16 digits, got {0} characters")]
    WrongLength(usize),

    #[error("card number must contain only digits")]
    NonDigit,

    #[error("check digit mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: u8, found: u8 },
}

/// A card number that has passed the length and checksum validation.
///
/// The only ways to obtain one are [`CardNumber::parse`] and
/// [`CardNumber::generate`], so holding a `CardNumber` means the format
/// pre-check has already been done.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardNumber(String);

impl CardNumber {
    pub fn parse(input: &str) -> Result<Self, CardNumberError> {
        if input.chars().count() != CARD_NUMBER_LEN {
            return Err(CardNumberError::WrongLength(input.chars().count()));
        }
        if !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CardNumberError::NonDigit);
        }

        let (body, last) = input.split_at(CARD_NUMBER_LEN - 1);
        let expected = check_digit(body).ok_or(CardNumberError::NonDigit)?;
        let found = last.as_bytes()[0] - b'0';
        if expected != found {
            return Err(CardNumberError::ChecksumMismatch { expected, found });
        }

        Ok(Self(input.to_string()))
    }

    /// Issue a fresh card number: issuer prefix, random account digits and
    /// the matching check digit.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut number = String::with_capacity(CARD_NUMBER_LEN);
        number.push_str(ISSUER_PREFIX);
        for _ in 0..ACCOUNT_DIGITS {
            let digit: u8 = rng.gen_range(0..10);
            number.push(char::from(b'0' + digit));
        }

        // The body is built from digits only, so the check digit always exists.
        let check = check_digit(&number).unwrap_or_default();
        number.push(char::from(b'0' + check));
        Self(number)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CardNumber {
    type Err = CardNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for CardNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
