//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables.

/// Balance-holding account model
pub mod account;
/// API key authentication model and the resolved principal
pub mod api_key;
/// Per-status report rows
pub mod stats;
/// Ledger transaction model and lifecycle enums
pub mod transaction;
