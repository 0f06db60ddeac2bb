//! Shared application state handed to every handler.

use crate::{services::transaction_service::LedgerSettings, store::LedgerStore};

#[derive(Debug, Clone)]
pub struct AppState<S> {
    pub store: S,
    pub settings: LedgerSettings,
}

impl<S: LedgerStore> AppState<S> {
    pub fn new(store: S, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }
}
