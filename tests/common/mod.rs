// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use cardbank::Repository;
use cardbank::application::BankService;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database and a seeded generator
pub async fn test_service() -> Result<(BankService, TempDir)> {
    test_service_with_seed(42).await
}

pub async fn test_service_with_seed(seed: u64) -> Result<(BankService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = open_service(&temp_dir, seed).await?;
    Ok((service, temp_dir))
}

/// Open another service on the ledger inside `dir`
pub async fn open_service(dir: &TempDir, seed: u64) -> Result<BankService> {
    Ok(BankService::init_with_rng(&database_path(dir), StdRng::seed_from_u64(seed)).await?)
}

/// Path of the ledger file inside `dir`
pub fn database_path(dir: &TempDir) -> String {
    dir.path().join("ledger.s3db").display().to_string()
}

/// SQLite URL for the ledger file inside `dir`
pub fn database_url(dir: &TempDir) -> String {
    format!("sqlite:{}?mode=rwc", database_path(dir))
}

/// Helper to create a bare ledger store on a temporary database
pub async fn test_repository() -> Result<(Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let repo = Repository::init(&database_url(&temp_dir)).await?;
    Ok((repo, temp_dir))
}

/// Open a second, raw connection pool on the same database file.
/// Used to inject faults the store itself would never produce.
pub async fn raw_pool(dir: &TempDir) -> Result<SqlitePool> {
    Ok(SqlitePool::connect(&database_url(dir)).await?)
}

/// Make every balance increase on `card_number` fail inside SQLite.
pub async fn fail_deposits_to(pool: &SqlitePool, card_number: &str) -> Result<()> {
    let sql = format!(
        r#"
        CREATE TRIGGER fail_deposit
        BEFORE UPDATE OF balance ON card
        WHEN NEW.number = '{card_number}' AND NEW.balance > OLD.balance
        BEGIN
            SELECT RAISE(ABORT, 'injected deposit failure');
        END
        "#
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}
