mod common;

use anyhow::Result;
use common::{ether, register_alice, test_service};
use userbank::application::AppError;
use userbank::domain::LedgerError;

#[tokio::test]
async fn test_withdraw_releases_payout() -> Result<()> {
    let (mut service, signers, _temp) = test_service().await?;
    register_alice(&mut service, &signers).await?;
    service.deposit(&signers.user1, ether("2.0")).await?;

    let result = service.withdraw(&signers.user1, ether("1.0")).await?;

    assert_eq!(result.balance, ether("1.0"));
    assert_eq!(result.payouts.len(), 1);
    assert_eq!(result.payouts[0].recipient, signers.user1);
    assert_eq!(result.payouts[0].amount, ether("1.0"));
    assert_eq!(service.get_balance(&signers.user1), ether("1.0"));

    let payouts = service.list_payouts(&signers.user1).await?;
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].id, result.payouts[0].id);

    Ok(())
}

#[tokio::test]
async fn test_withdraw_more_than_balance_is_rejected() -> Result<()> {
    let (mut service, signers, _temp) = test_service().await?;
    register_alice(&mut service, &signers).await?;
    service.deposit(&signers.user1, ether("2.0")).await?;

    let err = service
        .withdraw(&signers.user1, ether("3.0"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::InsufficientBalance { .. })
    ));
    assert!(err.to_string().starts_with("Insufficient balance"));
    assert_eq!(service.get_balance(&signers.user1), ether("2.0"));
    assert!(service.list_payouts(&signers.user1).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_withdraw_from_unregistered_user_is_rejected() -> Result<()> {
    let (mut service, signers, _temp) = test_service().await?;
    register_alice(&mut service, &signers).await?;
    service.deposit(&signers.user1, ether("2.0")).await?;

    let err = service
        .withdraw(&signers.user2, ether("1.0"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Ledger(LedgerError::NotRegistered)));

    Ok(())
}

#[tokio::test]
async fn test_unregistered_is_checked_before_balance() -> Result<()> {
    let (mut service, signers, _temp) = test_service().await?;

    // Zero balance and a non-zero amount would also be insufficient
    let err = service.withdraw(&signers.user2, 1).await.unwrap_err();

    assert!(matches!(err, AppError::Ledger(LedgerError::NotRegistered)));

    Ok(())
}

#[tokio::test]
async fn test_full_balance_withdrawal() -> Result<()> {
    let (mut service, signers, _temp) = test_service().await?;
    register_alice(&mut service, &signers).await?;
    service.deposit(&signers.user1, ether("2.0")).await?;

    let full_balance = service.get_balance(&signers.user1);
    service.withdraw(&signers.user1, full_balance).await?;

    assert_eq!(service.get_balance(&signers.user1), 0);

    Ok(())
}

#[tokio::test]
async fn test_zero_amount_withdrawal() -> Result<()> {
    let (mut service, signers, _temp) = test_service().await?;
    register_alice(&mut service, &signers).await?;
    service.deposit(&signers.user1, ether("1.0")).await?;

    service.withdraw(&signers.user1, 0).await?;

    assert_eq!(service.get_balance(&signers.user1), ether("1.0"));

    Ok(())
}

#[tokio::test]
async fn test_zero_amount_withdrawal_at_zero_balance() -> Result<()> {
    let (mut service, signers, _temp) = test_service().await?;
    register_alice(&mut service, &signers).await?;

    let result = service.withdraw(&signers.user1, 0).await?;

    assert_eq!(result.balance, 0);

    Ok(())
}

#[tokio::test]
async fn test_withdrawals_do_not_touch_history() -> Result<()> {
    let (mut service, signers, _temp) = test_service().await?;
    register_alice(&mut service, &signers).await?;
    service.deposit(&signers.user1, ether("2.0")).await?;

    service.withdraw(&signers.user1, ether("0.5")).await?;

    assert_eq!(
        service.get_deposit_history(&signers.user1),
        vec![ether("2.0")]
    );

    Ok(())
}

#[tokio::test]
async fn test_end_to_end_scenario() -> Result<()> {
    let (mut service, signers, _temp) = test_service().await?;
    let alice = &signers.user1;

    service.register(alice, "Alice".to_string(), 25).await?;
    service.deposit(alice, ether("1.0")).await?;
    service.deposit(alice, ether("2.0")).await?;
    service.deposit(alice, ether("0.5")).await?;

    assert_eq!(service.get_balance(alice), ether("3.5"));
    assert_eq!(
        service.get_deposit_history(alice),
        vec![ether("1.0"), ether("2.0"), ether("0.5")]
    );

    service.withdraw(alice, ether("3.0")).await?;
    assert_eq!(service.get_balance(alice), ether("0.5"));

    let err = service.withdraw(alice, ether("1.0")).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::InsufficientBalance { .. })
    ));
    assert_eq!(service.get_balance(alice), ether("0.5"));

    Ok(())
}
