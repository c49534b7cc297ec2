use thiserror::Error;

/// Balances and amounts are whole currency units.
pub type Amount = i64;

/// Parse amount text typed by a user.
///
/// Only non-negative integer text is accepted: no sign, no decimal point,
/// no separators. Surrounding whitespace is ignored.
/// Example: "500" -> 500, "007" -> 7
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseAmountError::InvalidFormat);
    }

    input.parse().map_err(|_| ParseAmountError::TooLarge)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    #[error("amount must be a non-negative whole number")]
    InvalidFormat,

    #[error("amount is too large")]
    TooLarge,
}
