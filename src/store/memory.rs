//! In-memory store.
//!
//! All state lives behind a single mutex, so every operation (settlement
//! included) is one critical section. Nothing inside holds the lock across an
//! `.await`.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::Account,
        api_key::{ApiKey, Principal},
        stats::StatusTotals,
        transaction::{NewTransaction, Transaction, TransactionFilter},
    },
    services::settlement_service::{
        SettlementRequest, apply_delta, apply_movements, plan_movements, referenced_accounts,
        settled,
    },
    store::LedgerStore,
};

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    api_keys: HashMap<String, ApiKey>,
    transactions: HashMap<Uuid, Transaction>,
    /// Transaction ids in insertion order, used as the tie-breaker for equal timestamps.
    insertion_order: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave a half-applied
        // settlement behind: writes only happen after every check passed.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryState {
    fn settle(&mut self, request: &SettlementRequest) -> Result<Transaction, AppError> {
        let live = self
            .transactions
            .get(&request.transaction_id)
            .cloned()
            .ok_or(AppError::NotFound("Transaction"))?;

        let movements = plan_movements(&live, request)?;

        let mut staged = HashMap::new();
        if !movements.is_empty() {
            for id in referenced_accounts(&live) {
                let account = self.accounts.get(&id).ok_or(AppError::AccountNotFound)?;
                staged.insert(id, account.balance_cents);
            }
            apply_movements(&mut staged, &movements)?;
        }

        // Every check passed; commit staged balances and the status together
        for (id, balance_cents) in staged {
            if let Some(account) = self.accounts.get_mut(&id) {
                account.balance_cents = balance_cents;
                account.updated_at = request.requested_at;
            }
        }

        let transaction = settled(live, request);
        self.transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }
}

impl LedgerStore for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_account(&self, account: Account) -> Result<Account, AppError> {
        let mut state = self.state();
        if state.accounts.contains_key(&account.id) {
            return Err(AppError::InvalidRequest(format!(
                "Account {} already exists",
                account.id
            )));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.state().accounts.get(&account_id).cloned())
    }

    async fn adjust_balance(&self, account_id: Uuid, delta_cents: i64) -> Result<Account, AppError> {
        let mut state = self.state();
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or(AppError::NotFound("Account"))?;

        account.balance_cents = apply_delta(account.balance_cents, delta_cents)?;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn insert_account_with_key(
        &self,
        account: Account,
        api_key: ApiKey,
    ) -> Result<Account, AppError> {
        let mut state = self.state();
        if state.accounts.contains_key(&account.id) {
            return Err(AppError::InvalidRequest(format!(
                "Account {} already exists",
                account.id
            )));
        }
        if state.api_keys.contains_key(&api_key.key_hash) {
            return Err(AppError::InvalidRequest(
                "API key is already registered".to_string(),
            ));
        }

        let api_key = ApiKey {
            account_id: account.id,
            ..api_key
        };
        state.api_keys.insert(api_key.key_hash.clone(), api_key);
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_principal(&self, key_hash: &str) -> Result<Option<Principal>, AppError> {
        Ok(self
            .state()
            .api_keys
            .get(key_hash)
            .filter(|key| key.is_active)
            .map(ApiKey::principal))
    }

    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, AppError> {
        let mut state = self.state();

        let referenced = transaction
            .from_account_id
            .into_iter()
            .chain(std::iter::once(transaction.to_account_id));
        for id in referenced {
            if !state.accounts.contains_key(&id) {
                return Err(AppError::AccountNotFound);
            }
        }

        let transaction = transaction.into_pending();
        state.insertion_order.push(transaction.id);
        state
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn get_transaction(&self, transaction_id: Uuid) -> Result<Option<Transaction>, AppError> {
        Ok(self.state().transactions.get(&transaction_id).cloned())
    }

    async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        let state = self.state();
        let mut transactions: Vec<Transaction> = state
            .insertion_order
            .iter()
            .rev()
            .filter_map(|id| state.transactions.get(id))
            .filter(|transaction| filter.matches(transaction))
            .cloned()
            .collect();

        // stable: equal timestamps keep newest-inserted first
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    async fn settle(&self, request: &SettlementRequest) -> Result<Transaction, AppError> {
        self.state().settle(request)
    }

    async fn status_totals(&self, account_id: Option<Uuid>) -> Result<Vec<StatusTotals>, AppError> {
        let state = self.state();
        let mut grouped = BTreeMap::new();

        for transaction in state.transactions.values() {
            if account_id.is_some_and(|id| !transaction.involves(id)) {
                continue;
            }
            let (count, total) = grouped
                .entry(transaction.status)
                .or_insert((0i64, Decimal::ZERO));
            *count += 1;
            *total = total
                .checked_add(Decimal::from(transaction.amount_cents))
                .ok_or(AppError::InvalidAmount)?;
        }

        Ok(grouped
            .into_iter()
            .map(|(status, (count, total_amount_cents))| StatusTotals {
                status,
                count,
                total_amount_cents,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        api_key::Role,
        transaction::{TransactionStatus, TransactionType},
    };

    fn account(balance_cents: i64) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            account_name: "test".to_string(),
            balance_cents,
            created_at: now,
            updated_at: now,
        }
    }

    fn transfer(from: Uuid, to: Uuid, amount_cents: i64, commission_cents: i64) -> NewTransaction {
        NewTransaction {
            id: Uuid::new_v4(),
            from_account_id: Some(from),
            to_account_id: to,
            amount_cents,
            transaction_type: TransactionType::Transfer,
            is_international: false,
            commission_cents,
            description: None,
            created_at: Utc::now(),
        }
    }

    fn approve(transaction_id: Uuid) -> SettlementRequest {
        SettlementRequest {
            transaction_id,
            target: TransactionStatus::Approved,
            approver_id: Uuid::new_v4(),
            remarks: None,
            requested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn adjust_balance_refuses_to_go_negative() {
        let store = MemoryStore::new();
        let acc = store.insert_account(account(100)).await.unwrap();

        let err = store.adjust_balance(acc.id, -101).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds));
        assert_eq!(store.get_account(acc.id).await.unwrap().unwrap().balance_cents, 100);

        let updated = store.adjust_balance(acc.id, -100).await.unwrap();
        assert_eq!(updated.balance_cents, 0);

        let err = store.adjust_balance(Uuid::new_v4(), 5).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Account")));
    }

    #[tokio::test]
    async fn duplicate_key_leaves_no_account_behind() {
        let store = MemoryStore::new();
        let first = account(0);
        store
            .insert_account_with_key(first.clone(), ApiKey::new(first.id, "hash".to_string(), Role::User))
            .await
            .unwrap();

        let second = account(0);
        let err = store
            .insert_account_with_key(second.clone(), ApiKey::new(second.id, "hash".to_string(), Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));

        assert!(store.get_account(second.id).await.unwrap().is_none());
        let principal = store.find_principal("hash").await.unwrap().unwrap();
        assert_eq!(principal.account_id, first.id);
        assert_eq!(principal.role, Role::User);
    }

    #[tokio::test]
    async fn status_totals_do_not_overflow() {
        let store = MemoryStore::new();
        let a = store.insert_account(account(0)).await.unwrap();
        let b = store.insert_account(account(0)).await.unwrap();
        for _ in 0..3 {
            store
                .insert_transaction(transfer(a.id, b.id, i64::MAX, 0))
                .await
                .unwrap();
        }

        let totals = store.status_totals(None).await.unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].count, 3);
        assert_eq!(totals[0].total_amount_cents, Decimal::from(i64::MAX) * Decimal::from(3));
    }

    #[tokio::test]
    async fn failed_settlement_writes_nothing() {
        let store = MemoryStore::new();
        let a = store.insert_account(account(100)).await.unwrap();
        let b = store.insert_account(account(0)).await.unwrap();
        let tx = store
            .insert_transaction(transfer(a.id, b.id, 100, 2))
            .await
            .unwrap();

        let err = store.settle(&approve(tx.id)).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds));

        assert_eq!(store.get_account(a.id).await.unwrap().unwrap(), a);
        assert_eq!(store.get_account(b.id).await.unwrap().unwrap(), b);
        assert_eq!(store.get_transaction(tx.id).await.unwrap().unwrap(), tx);
    }

    #[tokio::test]
    async fn insert_transaction_requires_existing_accounts() {
        let store = MemoryStore::new();
        let a = store.insert_account(account(100)).await.unwrap();

        let err = store
            .insert_transaction(transfer(a.id, Uuid::new_v4(), 10, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccountNotFound));
        assert!(store.list_transactions(TransactionFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_is_newest_first() {
        let store = MemoryStore::new();
        let a = store.insert_account(account(100)).await.unwrap();
        let b = store.insert_account(account(0)).await.unwrap();

        let first = store.insert_transaction(transfer(a.id, b.id, 1, 0)).await.unwrap();
        let second = store.insert_transaction(transfer(b.id, a.id, 2, 0)).await.unwrap();

        let listed = store.list_transactions(TransactionFilter::All).await.unwrap();
        assert_eq!(
            listed.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
    }

    #[tokio::test]
    async fn status_totals_group_by_status() {
        let store = MemoryStore::new();
        let a = store.insert_account(account(1000)).await.unwrap();
        let b = store.insert_account(account(0)).await.unwrap();
        let c = store.insert_account(account(0)).await.unwrap();

        let approved = store.insert_transaction(transfer(a.id, b.id, 100, 2)).await.unwrap();
        store.insert_transaction(transfer(a.id, b.id, 50, 1)).await.unwrap();
        store.insert_transaction(transfer(a.id, c.id, 30, 1)).await.unwrap();
        store.settle(&approve(approved.id)).await.unwrap();

        let all = store.status_totals(None).await.unwrap();
        assert_eq!(
            all,
            vec![
                StatusTotals {
                    status: TransactionStatus::Pending,
                    count: 2,
                    total_amount_cents: Decimal::from(80),
                },
                StatusTotals {
                    status: TransactionStatus::Approved,
                    count: 1,
                    total_amount_cents: Decimal::from(100),
                },
            ]
        );

        let for_c = store.status_totals(Some(c.id)).await.unwrap();
        assert_eq!(
            for_c,
            vec![StatusTotals {
                status: TransactionStatus::Pending,
                count: 1,
                total_amount_cents: Decimal::from(30),
            }]
        );
    }
}
