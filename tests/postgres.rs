//! PostgreSQL store tests.
//!
//! These run against the database named by `DATABASE_URL` and are skipped
//! when it is unset. Each test creates its own accounts, so they can share a
//! database with other data.

use std::sync::Arc;

use approval_ledger::{
    db,
    error::AppError,
    models::{
        account::Account,
        api_key::{ApiKey, Principal, Role},
        transaction::{
            CreateTransactionRequest, NewTransaction, SettleRequest, TransactionStatus,
            TransactionType,
        },
    },
    services::{
        account_service, settlement_service, stats_service,
        transaction_service::{self, LedgerSettings, MAX_AMOUNT_CENTS},
    },
    store::{LedgerStore, PgStore},
};
use chrono::Utc;
use tokio::sync::Barrier;
use uuid::Uuid;

/// Connect, migrate and provision an admin (`processed_by` must be a real account).
async fn store() -> Option<(PgStore, Principal)> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
        return None;
    };
    let pool = db::create_pool(&url, 10).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let store = PgStore::new(pool);
    let admin = account_service::bootstrap_admin(&store, &format!("pg-admin-{}", Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(admin.role, Role::Admin);
    Some((store, admin))
}

async fn funded_account(store: &PgStore, balance_cents: i64) -> Uuid {
    let now = Utc::now();
    let account = store
        .insert_account(Account {
            id: Uuid::new_v4(),
            account_name: "pg test".to_string(),
            balance_cents,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    account.id
}

async fn balance(store: &PgStore, account_id: Uuid) -> i64 {
    store
        .get_account(account_id)
        .await
        .unwrap()
        .unwrap()
        .balance_cents
}

async fn transfer(store: &PgStore, from: Uuid, to: Uuid, amount_cents: i64) -> Uuid {
    transaction_service::create_transaction(
        store,
        &LedgerSettings::default(),
        Some(from),
        CreateTransactionRequest {
            to_account_id: to,
            amount_cents,
            transaction_type: TransactionType::Transfer,
            description: None,
            is_international: false,
        },
    )
    .await
    .unwrap()
    .id
}

fn approve() -> SettleRequest {
    SettleRequest {
        status: TransactionStatus::Approved,
        remarks: None,
    }
}

#[tokio::test]
async fn approval_commits_balances_and_status_together() {
    let Some((store, admin)) = store().await else { return };
    let a = funded_account(&store, 1000).await;
    let b = funded_account(&store, 0).await;
    let id = transfer(&store, a, b, 500).await;

    let settled = settlement_service::settle(&store, &admin, id, approve())
        .await
        .unwrap();
    assert_eq!(settled.status, TransactionStatus::Approved);
    assert!(settled.processed_at.is_some());

    assert_eq!(balance(&store, a).await, 490);
    assert_eq!(balance(&store, b).await, 500);

    let err = settlement_service::settle(&store, &admin, id, approve())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed));
}

#[tokio::test]
async fn insufficient_funds_rolls_back() {
    let Some((store, admin)) = store().await else { return };
    let a = funded_account(&store, 500).await;
    let b = funded_account(&store, 0).await;
    let id = transfer(&store, a, b, 500).await;

    let err = settlement_service::settle(&store, &admin, id, approve())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds));

    assert_eq!(balance(&store, a).await, 500);
    assert_eq!(balance(&store, b).await, 0);
    let tx = store.get_transaction(id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert!(tx.processed_by.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_settle_once() {
    let Some((store, admin)) = store().await else { return };
    let a = funded_account(&store, 1000).await;
    let b = funded_account(&store, 0).await;
    let id = transfer(&store, a, b, 500).await;

    let contenders = 8;
    let barrier = Arc::new(Barrier::new(contenders));
    let mut handles = Vec::new();
    for _ in 0..contenders {
        let store = store.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            settlement_service::settle(&store, &admin, id, approve()).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(AppError::AlreadyProcessed) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(balance(&store, a).await, 490);
    assert_eq!(balance(&store, b).await, 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settlements_share_a_source_without_overdraft() {
    let Some((store, admin)) = store().await else { return };
    let a = funded_account(&store, 1000).await;
    let b = funded_account(&store, 0).await;
    let c = funded_account(&store, 0).await;

    // alternate destinations so lock sets overlap in different shapes
    let mut ids = Vec::new();
    for i in 0..10 {
        let to = if i % 2 == 0 { b } else { c };
        ids.push(transfer(&store, a, to, 200).await);
    }

    let barrier = Arc::new(Barrier::new(ids.len()));
    let mut handles = Vec::new();
    for id in ids {
        let store = store.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            settlement_service::settle(&store, &admin, id, approve()).await
        }));
    }

    let mut settled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => settled += 1,
            Err(AppError::InsufficientFunds) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(settled, 4);
    assert_eq!(balance(&store, a).await, 1000 - 4 * 204);
    assert_eq!(balance(&store, b).await + balance(&store, c).await, 800);
}

#[tokio::test]
async fn largest_deposits_settle_and_sum_in_stats() {
    let Some((store, admin)) = store().await else { return };
    let a = funded_account(&store, 0).await;

    for _ in 0..3 {
        let tx = transaction_service::create_transaction(
            &store,
            &LedgerSettings::default(),
            Some(a),
            CreateTransactionRequest {
                to_account_id: a,
                amount_cents: MAX_AMOUNT_CENTS,
                transaction_type: TransactionType::Deposit,
                description: None,
                is_international: true,
            },
        )
        .await
        .unwrap();
        settlement_service::settle(&store, &admin, tx.id, approve())
            .await
            .unwrap();
    }
    assert_eq!(balance(&store, a).await, 3 * MAX_AMOUNT_CENTS);

    let stats = stats_service::transaction_stats(&store, &admin, Some(a))
        .await
        .unwrap();
    assert_eq!(stats[&TransactionStatus::Approved].count, 3);
    assert_eq!(
        stats[&TransactionStatus::Approved].total_amount_cents,
        3 * i128::from(MAX_AMOUNT_CENTS)
    );
}

#[tokio::test]
async fn stats_sum_past_bigint() {
    let Some((store, admin)) = store().await else { return };
    let a = funded_account(&store, 0).await;

    for _ in 0..3 {
        store
            .insert_transaction(NewTransaction {
                id: Uuid::new_v4(),
                from_account_id: None,
                to_account_id: a,
                amount_cents: i64::MAX,
                transaction_type: TransactionType::Deposit,
                is_international: false,
                commission_cents: 0,
                description: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let stats = stats_service::transaction_stats(&store, &admin, Some(a))
        .await
        .unwrap();
    assert_eq!(stats[&TransactionStatus::Pending].count, 3);
    assert_eq!(
        stats[&TransactionStatus::Pending].total_amount_cents,
        3 * i128::from(i64::MAX)
    );
}

#[tokio::test]
async fn balance_adjustment_past_bigint_is_invalid_amount() {
    let Some((store, _)) = store().await else { return };
    let a = funded_account(&store, i64::MAX - 5).await;

    let err = store.adjust_balance(a, 10).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount));
    assert_eq!(balance(&store, a).await, i64::MAX - 5);

    let err = store.adjust_balance(a, i64::MIN).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds));
}

#[tokio::test]
async fn duplicate_key_rolls_back_the_account() {
    let Some((store, _)) = store().await else { return };
    let key_hash = format!("hash-{}", Uuid::new_v4());
    let now = Utc::now();
    let account = |name: &str| Account {
        id: Uuid::new_v4(),
        account_name: name.to_string(),
        balance_cents: 0,
        created_at: now,
        updated_at: now,
    };

    let first = account("first");
    store
        .insert_account_with_key(first.clone(), ApiKey::new(first.id, key_hash.clone(), Role::User))
        .await
        .unwrap();

    let second = account("second");
    let err = store
        .insert_account_with_key(second.clone(), ApiKey::new(second.id, key_hash.clone(), Role::User))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    assert!(store.get_account(second.id).await.unwrap().is_none());
    let principal = store.find_principal(&key_hash).await.unwrap().unwrap();
    assert_eq!(principal.account_id, first.id);
}
