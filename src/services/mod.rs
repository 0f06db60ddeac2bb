//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They are generic over [`crate::store::LedgerStore`], validate input, enforce
//! roles, and leave atomicity to the store.

pub mod account_service;
pub mod commission;
pub mod settlement_service;
pub mod stats_service;
pub mod transaction_service;
