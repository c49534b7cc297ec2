mod repository;

pub use repository::*;

/// SQL migration for the card account table
pub const MIGRATION_001_ACCOUNTS: &str = include_str!("migrations/001_accounts.sql");

/// SQL migration enforcing one account per card number
pub const MIGRATION_002_UNIQUE_CARD_NUMBER: &str =
    include_str!("migrations/002_unique_card_number.sql");

/// Plain lookup index used instead of 002 when a legacy database already
/// holds duplicate card numbers
pub const MIGRATION_002_CARD_NUMBER_FALLBACK: &str =
    include_str!("migrations/002_card_number_fallback.sql");
