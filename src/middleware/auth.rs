//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and resolve it to a principal through the store
//! 3. Inject the `Principal` into the request
//! 4. Reject unauthenticated requests with HTTP 401

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError, models::api_key::hash_api_key, state::AppState, store::LedgerStore,
};

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Look up an active credential with that hash
/// 4. If found: inject `Principal` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
///
/// Route handlers read the caller with `Extension<Principal>`.
pub async fn auth_middleware<S: LedgerStore>(
    State(state): State<AppState<S>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key_hash = {
        let auth_header = request
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::InvalidApiKey)?;

        // Expected format: "Bearer <api_key>"
        let api_key = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::InvalidApiKey)?;

        hash_api_key(api_key)
    };

    let principal = state
        .store
        .find_principal(&key_hash)
        .await?
        .ok_or(AppError::InvalidApiKey)?;

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
