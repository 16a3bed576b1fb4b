//! Shared handler state.

use std::sync::Arc;

use cloudgate_gateway::{AccountService, Gateway};

/// Cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    pub fn new(gateway: Gateway, accounts: AccountService) -> Self {
        Self {
            gateway: Arc::new(gateway),
            accounts: Arc::new(accounts),
        }
    }
}
