use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::domain::{Amount, CardNumber, IssuedCard, Pin};
use crate::storage::{Repository, TRANSFER_LEGS};

use super::AppError;

/// Default upper bound on card numbers drawn for a single new account.
pub const MAX_ISSUE_ATTEMPTS: u32 = 1_000;

/// Application service providing the banking operations.
/// This is the only interface the text front end talks to.
///
/// The service holds no account state between calls; the random generator
/// used for card numbers and PINs is its only state and is injected so
/// callers can supply a seeded one.
pub struct BankService<R = StdRng> {
    repo: Repository,
    rng: Mutex<R>,
    max_issue_attempts: u32,
}

impl BankService<StdRng> {
    /// Initialize the database at the given path, creating the file and
    /// schema if needed, with an entropy-seeded generator.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        Self::init_with_rng(database_path, StdRng::from_entropy()).await
    }
}

impl<R: Rng> BankService<R> {
    pub fn new(repo: Repository, rng: R) -> Self {
        Self {
            repo,
            rng: Mutex::new(rng),
            max_issue_attempts: MAX_ISSUE_ATTEMPTS,
        }
    }

    /// Override how many card numbers `create_account` draws before giving up.
    pub fn with_max_issue_attempts(mut self, attempts: u32) -> Self {
        self.max_issue_attempts = attempts;
        self
    }

    /// Initialize the database at the given path using the supplied generator.
    pub async fn init_with_rng(database_path: &str, rng: R) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        debug!(database_path, "ledger store initialized");
        Ok(Self::new(repo, rng))
    }

    /// Number of accounts currently in the ledger.
    pub async fn account_count(&self) -> Result<i64, AppError> {
        Ok(self.repo.account_count().await?)
    }

    // ========================
    // Card issuance
    // ========================

    /// Issue a new card with a random PIN and a zero balance.
    pub async fn create_account(&self) -> Result<IssuedCard, AppError> {
        let pin = Pin::generate(&mut *self.rng.lock());

        for attempt in 1..=self.max_issue_attempts {
            let card_number = CardNumber::generate(&mut *self.rng.lock());

            if self.repo.card_number_exists(card_number.as_str()).await? {
                debug!(%card_number, attempt, "card number collision, drawing another");
                continue;
            }

            match self
                .repo
                .insert_account(card_number.as_str(), pin.as_str())
                .await?
            {
                Some(id) => {
                    info!(%card_number, id, "account created");
                    return Ok(IssuedCard {
                        id,
                        card_number,
                        pin,
                    });
                }
                None => {
                    debug!(%card_number, attempt, "card number taken during insert, drawing another");
                }
            }
        }

        Err(AppError::ExhaustedRetries(self.max_issue_attempts))
    }

    // ========================
    // Authentication
    // ========================

    /// Check a PIN against the stored one.
    ///
    /// The card number must already be format-checked, which the
    /// [`CardNumber`] type guarantees. Returns false for unknown cards.
    pub async fn validate_credentials(&self, card: &CardNumber, pin: &str) -> Result<bool, AppError> {
        Ok(self
            .repo
            .get_account(card.as_str())
            .await?
            .is_some_and(|account| account.pin_matches(pin)))
    }

    /// Format-check the typed card number, then verify the PIN.
    ///
    /// Malformed numbers, unknown cards and wrong PINs all fail with
    /// [`AppError::InvalidCredentials`] so they cannot be told apart.
    pub async fn login(&self, card_number: &str, pin: &str) -> Result<CardNumber, AppError> {
        let Ok(card) = CardNumber::parse(card_number) else {
            debug!("login rejected: malformed card number");
            return Err(AppError::InvalidCredentials);
        };

        if self.validate_credentials(&card, pin).await? {
            info!(%card, "login succeeded");
            Ok(card)
        } else {
            debug!(%card, "login rejected: credentials do not match");
            Err(AppError::InvalidCredentials)
        }
    }

    /// Whether an account with this card number exists.
    pub async fn account_exists(&self, card: &CardNumber) -> Result<bool, AppError> {
        Ok(self.repo.card_number_exists(card.as_str()).await?)
    }

    // ========================
    // Account operations
    // ========================

    /// Read the current balance straight from the ledger.
    pub async fn get_balance(&self, card: &CardNumber) -> Result<Amount, AppError> {
        self.repo
            .get_account(card.as_str())
            .await?
            .map(|account| account.balance)
            .ok_or_else(|| AppError::AccountNotFound(card.to_string()))
    }

    /// Add income to an account.
    pub async fn deposit(&self, card: &CardNumber, amount: Amount) -> Result<(), AppError> {
        if amount < 0 {
            return Err(AppError::InvalidAmount(
                "Deposit amount must not be negative".to_string(),
            ));
        }

        let balance = self.get_balance(card).await?;
        if balance.checked_add(amount).is_none() {
            return Err(AppError::InvalidAmount(format!(
                "Deposit of {amount} would overflow the balance"
            )));
        }

        match self.repo.adjust_balance(card.as_str(), amount).await? {
            0 => Err(AppError::AccountNotFound(card.to_string())),
            _ => {
                info!(%card, amount, "deposit recorded");
                Ok(())
            }
        }
    }

    /// Permanently delete an account. Returns true if an account was removed.
    pub async fn close_account(&self, card: &CardNumber) -> Result<bool, AppError> {
        let removed = self.repo.delete_account(card.as_str()).await? == 1;
        if removed {
            info!(%card, "account closed");
        }
        Ok(removed)
    }

    /// Transfer money to another card.
    ///
    /// The recipient is validated for format and existence and must be able to
    /// hold `amount` more; the sender's balance is read fresh and must cover
    /// `amount`. The balance checks and the transfer are separate operations;
    /// the transfer itself is atomic.
    pub async fn transfer_funds(
        &self,
        from: &CardNumber,
        to_card_number: &str,
        amount: Amount,
    ) -> Result<(), AppError> {
        if amount < 0 {
            return Err(AppError::InvalidAmount(
                "Transfer amount must not be negative".to_string(),
            ));
        }

        let to = CardNumber::parse(to_card_number)?;
        let recipient_balance = self.get_balance(&to).await?;
        if to != *from && recipient_balance.checked_add(amount).is_none() {
            return Err(AppError::InvalidAmount(format!(
                "Transfer of {amount} would overflow the recipient's balance"
            )));
        }

        let balance = self.get_balance(from).await?;
        if amount > balance {
            return Err(AppError::InsufficientFunds {
                balance,
                required: amount,
            });
        }

        match self.repo.transfer(from.as_str(), to.as_str(), amount).await? {
            TRANSFER_LEGS => {
                info!(%from, %to, amount, "transfer completed");
                Ok(())
            }
            _ => Err(AppError::TransferRolledBack),
        }
    }
}
