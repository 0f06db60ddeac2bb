//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, the caller's principal)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON, status code)

/// Account endpoints
pub mod accounts;
/// Health check endpoint
pub mod health;
/// Transaction request, listing, stats and settlement endpoints
pub mod transactions;
