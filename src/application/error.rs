use thiserror::Error;

use crate::domain::{Amount, CardNumberError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid card number: {0}")]
    FormatInvalid(#[from] CardNumberError),

    #[error("Wrong card number or PIN")]
    InvalidCredentials,

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Amount, required: Amount },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Transfer was rolled back, no balance changed")]
    TransferRolledBack,

    #[error("Could not issue a unique card number after {0} attempts")]
    ExhaustedRetries(u32),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] anyhow::Error),
}
