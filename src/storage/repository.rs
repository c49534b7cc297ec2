use anyhow::{Context, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::domain::{Account, AccountId, Amount};

use super::{
    MIGRATION_001_ACCOUNTS, MIGRATION_002_CARD_NUMBER_FALLBACK, MIGRATION_002_UNIQUE_CARD_NUMBER,
};

/// Balance mutations applied by a committed transfer: one withdrawal, one deposit.
pub const TRANSFER_LEGS: u64 = 2;

/// Repository for persisting and querying card accounts.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Create the account table and its indexes if they are missing.
    /// Safe to run against an already initialized database.
    ///
    /// Databases written before card numbers were unique may hold duplicates.
    /// Those still open, with a plain index in place of the unique one.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_ACCOUNTS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        let duplicates = self.duplicate_card_numbers().await?;
        if duplicates == 0 {
            sqlx::query(MIGRATION_002_UNIQUE_CARD_NUMBER)
                .execute(&self.pool)
                .await
                .context("Failed to run migration 002")?;
        } else {
            warn!(
                duplicates,
                "ledger holds duplicate card numbers, card number uniqueness is not enforced"
            );
            sqlx::query(MIGRATION_002_CARD_NUMBER_FALLBACK)
                .execute(&self.pool)
                .await
                .context("Failed to run fallback migration 002")?;
        }

        Ok(())
    }

    /// Number of card numbers held by more than one account.
    pub async fn duplicate_card_numbers(&self) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM (SELECT number FROM card GROUP BY number HAVING COUNT(*) > 1)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to check for duplicate card numbers")?;
        Ok(row.get("count"))
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Account operations
    // ========================

    /// Check whether a card number is already issued.
    pub async fn card_number_exists(&self, candidate: &str) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM card WHERE number = ?) AS found")
            .bind(candidate)
            .fetch_one(&self.pool)
            .await
            .context("Failed to look up card number")?;

        Ok(row.get::<i64, _>("found") != 0)
    }

    /// Insert a new account with a zero balance.
    ///
    /// Returns `None` if another account already holds `card_number`.
    pub async fn insert_account(&self, card_number: &str, pin: &str) -> Result<Option<AccountId>> {
        let result = sqlx::query("INSERT INTO card (number, pin) VALUES (?, ?)")
            .bind(card_number)
            .bind(pin)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(Some(done.last_insert_rowid())),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                debug!(card_number, "insert rejected by unique card number index");
                Ok(None)
            }
            Err(err) => Err(err).context("Failed to insert account"),
        }
    }

    /// Get an account by card number.
    pub async fn get_account(&self, card_number: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, number, pin, balance
            FROM card
            WHERE number = ?
            "#,
        )
        .bind(card_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Delete an account. Returns the number of rows removed (0 or 1).
    pub async fn delete_account(&self, card_number: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM card WHERE number = ?")
            .bind(card_number)
            .execute(&self.pool)
            .await
            .context("Failed to delete account")?;
        Ok(result.rows_affected())
    }

    /// Apply `balance += delta` to one account. No floor is enforced, so a
    /// negative delta may take the balance below zero.
    /// Returns the number of rows updated (0 or 1); 0 also when the result
    /// would not fit in an `i64`.
    pub async fn adjust_balance(&self, card_number: &str, delta: Amount) -> Result<u64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        Self::apply_delta(&mut conn, card_number, delta).await
    }

    /// Move `amount` from one account to another as a single transaction.
    ///
    /// Returns [`TRANSFER_LEGS`] when both the withdrawal and the deposit were
    /// applied and committed, or 0 when either leg matched no account (or
    /// would overflow its balance) and the transaction was rolled back.
    /// Statement failures also roll back and are returned as errors. A
    /// half-applied transfer is never committed.
    pub async fn transfer(&self, from_card: &str, to_card: &str, amount: Amount) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transfer transaction")?;

        match Self::apply_transfer_legs(&mut tx, from_card, to_card, amount).await {
            Ok(TRANSFER_LEGS) => {
                tx.commit()
                    .await
                    .context("Failed to commit transfer transaction")?;
                debug!(from_card, to_card, amount, "transfer committed");
                Ok(TRANSFER_LEGS)
            }
            Ok(applied) => {
                warn!(from_card, to_card, applied, "transfer leg updated no row, rolling back");
                tx.rollback()
                    .await
                    .context("Failed to roll back transfer transaction")?;
                Ok(0)
            }
            Err(err) => {
                warn!(from_card, to_card, error = %err, "transfer failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "explicit rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Number of stored accounts.
    pub async fn account_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM card")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count accounts")?;
        Ok(row.get("count"))
    }

    /// Run the withdrawal then the deposit, stopping at the first leg that
    /// matches no row. Returns how many legs were applied.
    async fn apply_transfer_legs(
        conn: &mut SqliteConnection,
        from_card: &str,
        to_card: &str,
        amount: Amount,
    ) -> Result<u64> {
        let withdrawn = Self::apply_delta(conn, from_card, -amount)
            .await
            .context("Failed to withdraw from sender")?;
        if withdrawn != 1 {
            return Ok(0);
        }

        let deposited = Self::apply_delta(conn, to_card, amount)
            .await
            .context("Failed to deposit to recipient")?;
        if deposited != 1 {
            return Ok(withdrawn);
        }

        Ok(withdrawn + deposited)
    }

    /// The balance range check keeps SQLite from promoting an overflowing
    /// sum to REAL; such an update matches no row instead.
    async fn apply_delta(conn: &mut SqliteConnection, card_number: &str, delta: Amount) -> Result<u64> {
        let (lowest, highest) = if delta >= 0 {
            (Amount::MIN, Amount::MAX - delta)
        } else {
            (Amount::MIN - delta, Amount::MAX)
        };

        let result = sqlx::query(
            "UPDATE card SET balance = balance + ? WHERE number = ? AND balance BETWEEN ? AND ?",
        )
        .bind(delta)
        .bind(card_number)
        .bind(lowest)
        .bind(highest)
        .execute(&mut *conn)
        .await
        .context("Failed to update balance")?;
        Ok(result.rows_affected())
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        Ok(Account {
            id: row.try_get("id").context("Invalid account id")?,
            card_number: row.try_get("number").context("Invalid card number column")?,
            pin: row.try_get("pin").context("Invalid PIN column")?,
            balance: row.try_get("balance").context("Invalid balance column")?,
        })
    }
}
