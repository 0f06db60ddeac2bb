//! Account provisioning and reads.
//!
//! Accounts start at a zero balance. Each one is issued an API key that acts
//! for it; only the key's SHA-256 hash is stored.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{Account, OpenAccountRequest, OpenAccountResponse},
        api_key::{ApiKey, Principal, Role, hash_api_key},
    },
    store::LedgerStore,
};

/// Open an account with a fresh API key. Admin only.
///
/// # Process
///
/// 1. Validate the account name
/// 2. Insert the account with balance 0
/// 3. Generate a random key and store its hash with the requested role
/// 4. Return the plaintext key (only time it's shown)
pub async fn open_account<S: LedgerStore>(
    store: &S,
    caller: &Principal,
    request: OpenAccountRequest,
) -> Result<OpenAccountResponse, AppError> {
    if !caller.is_admin() {
        return Err(AppError::Unauthorized);
    }

    let api_key = generate_api_key();
    let (account, role) = provision(store, &request.account_name, request.role, &api_key).await?;

    tracing::info!(account_id = %account.id, ?role, "account opened");

    Ok(OpenAccountResponse {
        account,
        role,
        api_key,
    })
}

/// Make sure an admin principal exists for `api_key`.
///
/// Safe to call on every startup: a key that is already registered is left alone.
pub async fn bootstrap_admin<S: LedgerStore>(
    store: &S,
    api_key: &str,
) -> Result<Principal, AppError> {
    if let Some(principal) = store.find_principal(&hash_api_key(api_key)).await? {
        return Ok(principal);
    }

    match provision(store, "administrator", Role::Admin, api_key).await {
        Ok((account, role)) => {
            tracing::info!(account_id = %account.id, "admin principal provisioned");
            Ok(Principal {
                account_id: account.id,
                role,
            })
        }
        // Another instance registered the same key first
        Err(err) => store
            .find_principal(&hash_api_key(api_key))
            .await?
            .ok_or(err),
    }
}

/// Get an account the caller may see (own account, or any for admins).
pub async fn get_account<S: LedgerStore>(
    store: &S,
    caller: &Principal,
    account_id: Uuid,
) -> Result<Account, AppError> {
    if !caller.can_access(account_id) {
        return Err(AppError::Unauthorized);
    }

    store
        .get_account(account_id)
        .await?
        .ok_or(AppError::NotFound("Account"))
}

async fn provision<S: LedgerStore>(
    store: &S,
    account_name: &str,
    role: Role,
    api_key: &str,
) -> Result<(Account, Role), AppError> {
    let account_name = account_name.trim();
    if account_name.is_empty() {
        return Err(AppError::InvalidRequest(
            "Account name is required".to_string(),
        ));
    }

    let now = Utc::now();
    let account_id = Uuid::new_v4();
    let account = store
        .insert_account_with_key(
            Account {
                id: account_id,
                account_name: account_name.to_string(),
                balance_cents: 0,
                created_at: now,
                updated_at: now,
            },
            ApiKey::new(account_id, hash_api_key(api_key), role),
        )
        .await?;

    Ok((account, role))
}

/// Generate a cryptographically secure API key.
///
/// # Output
///
/// 64 hex characters (32 random bytes)
fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}
