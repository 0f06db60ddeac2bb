//! API Key model for authentication.
//!
//! API keys identify the principal making a request. They are stored as SHA-256
//! hashes; the plaintext key is shown once when the account is opened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Privilege level of a principal. Only `Admin` may settle transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "account_role", rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `account_id`: Account the key acts for
/// - `key_hash`: SHA-256 hash of the actual API key
/// - `role`: Privilege granted to requests bearing this key
/// - `is_active`: Whether the key is currently valid
/// - `created_at`: When the key was created
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    pub account_id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    pub key_hash: String,

    pub role: Role,

    /// Inactive keys are rejected during authentication.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    #[must_use]
    pub fn new(account_id: Uuid, key_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            key_hash,
            role,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            account_id: self.account_id,
            role: self.role,
        }
    }
}

/// Authenticated caller, attached to every request by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub account_id: Uuid,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may read every account; users only their own.
    #[must_use]
    pub fn can_access(&self, account_id: Uuid) -> bool {
        self.is_admin() || self.account_id == account_id
    }
}

/// Hash an API key into the hex form stored in `api_keys.key_hash`.
#[must_use]
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}
