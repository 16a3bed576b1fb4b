//! Gateway core for CloudGate.
//!
//! This crate owns everything between the HTTP surface and the storage
//! adapters: user accounts and bearer tokens, the credential store, and the
//! per-request resolution of a user's backend.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod gateway;
pub mod store;

pub use accounts::{AccountService, Signup};
pub use auth::{hash_password, verify_password, IssuedToken, TokenIssuer};
pub use config::{GatewayConfig, StoreConfig, TokenConfig};
pub use gateway::Gateway;
pub use store::{CredentialStore, MemoryStore, SqliteStore, UserRecord, UserStore};
