mod common;

use std::collections::HashSet;

use anyhow::Result;
use cardbank::application::{AppError, BankService};
use cardbank::domain::{CardNumber, validate_format};
use common::{database_path, open_service, test_service};
use rand::rngs::mock::StepRng;

#[tokio::test]
async fn test_create_account_issues_valid_card() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let card = service.create_account().await?;
    assert!(card.card_number.as_str().starts_with("400000"));
    assert!(validate_format(card.card_number.as_str()));
    assert_eq!(card.pin.as_str().len(), 4);
    assert!(card.pin.as_str().bytes().all(|b| b.is_ascii_digit()));

    assert_eq!(service.get_balance(&card.card_number).await?, 0);
    assert_eq!(service.account_count().await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_created_card_numbers_are_unique() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let mut seen = HashSet::new();
    for _ in 0..50 {
        let card = service.create_account().await?;
        assert!(
            seen.insert(card.card_number.clone()),
            "duplicate card number {}",
            card.card_number
        );
    }
    assert_eq!(service.account_count().await?, 50);

    Ok(())
}

#[tokio::test]
async fn test_create_account_draws_again_on_collision() -> Result<()> {
    let (first, temp) = test_service().await?;
    let taken = first.create_account().await?;

    // Same seed, same ledger: the first number drawn is already issued
    let second = open_service(&temp, 42).await?;
    let card = second.create_account().await?;

    assert_ne!(card.card_number, taken.card_number);
    assert!(validate_format(card.card_number.as_str()));
    assert_eq!(second.account_count().await?, 2);

    Ok(())
}

#[tokio::test]
async fn test_create_account_gives_up_after_max_attempts() -> Result<()> {
    let temp = tempfile::TempDir::new()?;
    // A generator that only ever yields zero draws the same card number each time
    let service = BankService::init_with_rng(&database_path(&temp), StepRng::new(0, 0))
        .await?
        .with_max_issue_attempts(3);

    let card = service.create_account().await?;
    assert_eq!(card.card_number.as_str(), "4000000000000002");

    let result = service.create_account().await;
    assert!(matches!(result, Err(AppError::ExhaustedRetries(3))));
    assert_eq!(service.account_count().await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_login_accepts_only_the_issued_pair() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let card = service.create_account().await?;
    let number = card.card_number.as_str();
    let pin = card.pin.as_str();

    let logged_in = service.login(number, pin).await?;
    assert_eq!(logged_in, card.card_number);
    assert!(service.validate_credentials(&card.card_number, pin).await?);

    // Any single-character change to the PIN fails
    for position in 0..pin.len() {
        let mut altered: Vec<u8> = pin.bytes().collect();
        altered[position] = if altered[position] == b'9' { b'0' } else { altered[position] + 1 };
        let altered = String::from_utf8(altered)?;

        assert!(!service.validate_credentials(&card.card_number, &altered).await?);
        assert!(matches!(
            service.login(number, &altered).await,
            Err(AppError::InvalidCredentials)
        ));
    }

    Ok(())
}

#[tokio::test]
async fn test_login_hides_why_it_failed() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let card = service.create_account().await?;

    // Malformed number
    assert!(matches!(
        service.login("4000001234567890", card.pin.as_str()).await,
        Err(AppError::InvalidCredentials)
    ));
    // Well-formed but never issued
    assert!(matches!(
        service.login("4000001234567899", card.pin.as_str()).await,
        Err(AppError::InvalidCredentials)
    ));
    // Issued but wrong PIN length
    assert!(matches!(
        service.login(card.card_number.as_str(), "12345").await,
        Err(AppError::InvalidCredentials)
    ));

    Ok(())
}

#[tokio::test]
async fn test_validate_credentials_for_unknown_card() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let unknown = CardNumber::parse("4000008449433403")?;

    assert!(!service.validate_credentials(&unknown, "0000").await?);

    Ok(())
}

#[tokio::test]
async fn test_deposit() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let card = service.create_account().await?;

    service.deposit(&card.card_number, 500).await?;
    service.deposit(&card.card_number, 0).await?;
    assert_eq!(service.get_balance(&card.card_number).await?, 500);

    let result = service.deposit(&card.card_number, -1).await;
    assert!(matches!(result, Err(AppError::InvalidAmount(_))));
    assert_eq!(service.get_balance(&card.card_number).await?, 500);

    Ok(())
}

#[tokio::test]
async fn test_deposit_cannot_overflow_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let card = service.create_account().await?;

    service.deposit(&card.card_number, i64::MAX).await?;
    let result = service.deposit(&card.card_number, 1).await;
    assert!(matches!(result, Err(AppError::InvalidAmount(_))));
    assert_eq!(service.get_balance(&card.card_number).await?, i64::MAX);

    Ok(())
}

#[tokio::test]
async fn test_deposit_to_missing_account() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let unknown = CardNumber::parse("4000008449433403")?;

    let result = service.deposit(&unknown, 100).await;
    assert!(matches!(result, Err(AppError::AccountNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_end_to_end_scenario() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = service.create_account().await?.card_number;
    assert_eq!(service.get_balance(&a).await?, 0);

    service.deposit(&a, 500).await?;
    assert_eq!(service.get_balance(&a).await?, 500);

    let b = service.create_account().await?.card_number;
    service.transfer_funds(&a, b.as_str(), 200).await?;
    assert_eq!(service.get_balance(&a).await?, 300);
    assert_eq!(service.get_balance(&b).await?, 200);

    let result = service.transfer_funds(&a, b.as_str(), 1000).await;
    assert!(matches!(
        result,
        Err(AppError::InsufficientFunds {
            balance: 300,
            required: 1000
        })
    ));
    assert_eq!(service.get_balance(&a).await?, 300);
    assert_eq!(service.get_balance(&b).await?, 200);

    assert!(service.close_account(&b).await?);
    assert!(matches!(
        service.get_balance(&b).await,
        Err(AppError::AccountNotFound(_))
    ));
    assert!(!service.account_exists(&b).await?);

    Ok(())
}

#[tokio::test]
async fn test_transfer_of_entire_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = service.create_account().await?.card_number;
    let b = service.create_account().await?.card_number;
    service.deposit(&a, 120).await?;

    service.transfer_funds(&a, b.as_str(), 120).await?;
    assert_eq!(service.get_balance(&a).await?, 0);
    assert_eq!(service.get_balance(&b).await?, 120);

    Ok(())
}

#[tokio::test]
async fn test_transfer_rejects_bad_recipient() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = service.create_account().await?.card_number;
    service.deposit(&a, 100).await?;

    let malformed = service.transfer_funds(&a, "4000001234567890", 10).await;
    assert!(matches!(malformed, Err(AppError::FormatInvalid(_))));

    let missing = service.transfer_funds(&a, "4000008449433403", 10).await;
    assert!(matches!(missing, Err(AppError::AccountNotFound(_))));

    assert_eq!(service.get_balance(&a).await?, 100);

    Ok(())
}

#[tokio::test]
async fn test_transfer_cannot_overflow_recipient() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = service.create_account().await?.card_number;
    let b = service.create_account().await?.card_number;
    service.deposit(&a, 100).await?;
    service.deposit(&b, i64::MAX).await?;

    let result = service.transfer_funds(&a, b.as_str(), 10).await;
    assert!(matches!(result, Err(AppError::InvalidAmount(_))));
    assert_eq!(service.get_balance(&a).await?, 100);
    assert_eq!(service.get_balance(&b).await?, i64::MAX);

    // A full account can still send money to itself
    service.transfer_funds(&b, b.as_str(), 10).await?;
    assert_eq!(service.get_balance(&b).await?, i64::MAX);

    Ok(())
}

#[tokio::test]
async fn test_transfer_rejects_negative_amount() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = service.create_account().await?.card_number;
    let b = service.create_account().await?.card_number;
    service.deposit(&b, 100).await?;

    let result = service.transfer_funds(&a, b.as_str(), -50).await;
    assert!(matches!(result, Err(AppError::InvalidAmount(_))));
    assert_eq!(service.get_balance(&a).await?, 0);
    assert_eq!(service.get_balance(&b).await?, 100);

    Ok(())
}

#[tokio::test]
async fn test_close_account_twice() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let card = service.create_account().await?;

    assert!(service.close_account(&card.card_number).await?);
    assert!(!service.close_account(&card.card_number).await?);
    assert!(matches!(
        service.login(card.card_number.as_str(), card.pin.as_str()).await,
        Err(AppError::InvalidCredentials)
    ));

    Ok(())
}

#[tokio::test]
async fn test_init_fails_for_unreachable_path() -> Result<()> {
    let temp = tempfile::TempDir::new()?;
    let path = temp.path().join("missing-dir").join("bank.s3db");

    let result: Result<BankService, AppError> = BankService::init(path.to_str().unwrap()).await;
    assert!(matches!(result, Err(AppError::StorageUnavailable(_))));

    Ok(())
}
