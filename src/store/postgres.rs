//! PostgreSQL store.
//!
//! # Atomicity Guarantees
//!
//! Settlement runs inside one PostgreSQL transaction:
//! 1. `SELECT ... FOR UPDATE` on the transaction row
//! 2. `SELECT ... ORDER BY id FOR UPDATE` on the referenced accounts
//! 3. balance updates, then the status update
//! 4. commit (or rollback on any error)
//!
//! Every settlement takes its locks in that fixed order (transaction row first,
//! then accounts by ascending id), so two settlements sharing an account queue
//! up instead of deadlocking, and the loser of a race on the same transaction
//! sees the committed terminal status.

use std::collections::HashMap;

use sqlx::{PgConnection, PgExecutor, Row};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        account::Account,
        api_key::{ApiKey, Principal},
        stats::StatusTotals,
        transaction::{NewTransaction, Transaction, TransactionFilter},
    },
    services::settlement_service::{
        SettlementRequest, apply_movements, plan_movements, referenced_accounts, settled,
    },
    store::LedgerStore,
};

/// SQLSTATE for an arithmetic result outside the column type.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl LedgerStore for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_account(&self, account: Account) -> Result<Account, AppError> {
        insert_account_row(&self.pool, &account).await
    }

    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    async fn adjust_balance(&self, account_id: Uuid, delta_cents: i64) -> Result<Account, AppError> {
        // Single statement: the guard and the write see the same row version
        let updated = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + $1,
                updated_at = NOW()
            WHERE id = $2 AND ($1 >= 0 OR balance_cents::NUMERIC + $1 >= 0)
            RETURNING *
            "#,
        )
        .bind(delta_cents)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| match err {
            // the new balance does not fit BIGINT
            sqlx::Error::Database(db)
                if db.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) =>
            {
                AppError::InvalidAmount
            }
            err => err.into(),
        })?;

        match updated {
            Some(account) => Ok(account),
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)")
                        .bind(account_id)
                        .fetch_one(&self.pool)
                        .await?;
                if exists {
                    Err(AppError::InsufficientFunds)
                } else {
                    Err(AppError::NotFound("Account"))
                }
            }
        }
    }

    async fn insert_account_with_key(
        &self,
        account: Account,
        api_key: ApiKey,
    ) -> Result<Account, AppError> {
        // Dropping `tx` on an early return rolls back the account insert
        let mut tx = self.pool.begin().await?;

        let account = insert_account_row(&mut *tx, &account).await?;

        sqlx::query(
            r#"
            INSERT INTO api_keys (id, account_id, key_hash, role, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(api_key.id)
        .bind(account.id)
        .bind(&api_key.key_hash)
        .bind(api_key.role)
        .bind(api_key.is_active)
        .bind(api_key.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::InvalidRequest("API key is already registered".to_string())
            }
            err => err.into(),
        })?;

        tx.commit().await?;
        Ok(account)
    }

    async fn find_principal(&self, key_hash: &str) -> Result<Option<Principal>, AppError> {
        let api_key = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE key_hash = $1 AND is_active = true",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(api_key.map(|key| key.principal()))
    }

    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, AppError> {
        let result = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                id,
                from_account_id,
                to_account_id,
                amount_cents,
                transaction_type,
                status,
                is_international,
                commission_cents,
                description,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.from_account_id)
        .bind(transaction.to_account_id)
        .bind(transaction.amount_cents)
        .bind(transaction.transaction_type)
        .bind(transaction.is_international)
        .bind(transaction.commission_cents)
        .bind(&transaction.description)
        .bind(transaction.created_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(transaction) => Ok(transaction),
            // foreign key to accounts
            Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => {
                Err(AppError::AccountNotFound)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_transaction(&self, transaction_id: Uuid) -> Result<Option<Transaction>, AppError> {
        let transaction =
            sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(transaction)
    }

    async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        let transactions = match filter {
            TransactionFilter::All => {
                sqlx::query_as::<_, Transaction>(
                    "SELECT * FROM transactions ORDER BY created_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
            TransactionFilter::Pending => {
                sqlx::query_as::<_, Transaction>(
                    "SELECT * FROM transactions WHERE status = 'pending' ORDER BY created_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
            TransactionFilter::Account(account_id) => {
                sqlx::query_as::<_, Transaction>(
                    r#"
                    SELECT * FROM transactions
                    WHERE from_account_id = $1 OR to_account_id = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(account_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(transactions)
    }

    async fn settle(&self, request: &SettlementRequest) -> Result<Transaction, AppError> {
        let mut tx = self.pool.begin().await?;

        match settle_locked(&mut *tx, request).await {
            Ok(transaction) => {
                // Commit ALL changes atomically
                tx.commit().await?;
                Ok(transaction)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "settlement rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn status_totals(&self, account_id: Option<Uuid>) -> Result<Vec<StatusTotals>, AppError> {
        let totals = sqlx::query_as::<_, StatusTotals>(
            r#"
            SELECT status,
                   COUNT(*) AS count,
                   COALESCE(SUM(amount_cents), 0) AS total_amount_cents
            FROM transactions
            WHERE $1::uuid IS NULL OR from_account_id = $1 OR to_account_id = $1
            GROUP BY status
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }
}

async fn insert_account_row<'e, E: PgExecutor<'e>>(
    executor: E,
    account: &Account,
) -> Result<Account, AppError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (id, account_name, balance_cents, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(account.id)
    .bind(&account.account_name)
    .bind(account.balance_cents)
    .bind(account.created_at)
    .bind(account.updated_at)
    .fetch_one(executor)
    .await?;

    Ok(account)
}

/// Body of a settlement, run on a connection that already has a transaction open.
async fn settle_locked(
    conn: &mut PgConnection,
    request: &SettlementRequest,
) -> Result<Transaction, AppError> {
    // Lock the transaction row; a concurrent settler blocks here until we finish
    let live = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
    )
    .bind(request.transaction_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Transaction"))?;

    let movements = plan_movements(&live, request)?;

    if !movements.is_empty() {
        let ids = referenced_accounts(&live);
        let rows = sqlx::query(
            "SELECT id, balance_cents FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        if rows.len() != ids.len() {
            return Err(AppError::AccountNotFound);
        }

        let mut balances = HashMap::with_capacity(rows.len());
        for row in rows {
            balances.insert(row.try_get::<Uuid, _>("id")?, row.try_get::<i64, _>("balance_cents")?);
        }

        apply_movements(&mut balances, &movements)?;

        for movement in &movements {
            sqlx::query("UPDATE accounts SET balance_cents = $1, updated_at = $2 WHERE id = $3")
                .bind(balances[&movement.account_id])
                .bind(request.requested_at)
                .bind(movement.account_id)
                .execute(&mut *conn)
                .await?;
        }
    }

    let expected = settled(live, request);

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = $1,
            processed_by = $2,
            processed_at = $3,
            remarks = $4,
            updated_at = $3
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(expected.status)
    .bind(expected.processed_by)
    .bind(expected.processed_at)
    .bind(&expected.remarks)
    .bind(expected.id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(transaction)
}
