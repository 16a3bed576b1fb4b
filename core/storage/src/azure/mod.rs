//! Azure Blob storage backend.
//!
//! Requests are authenticated with the account's Shared Key taken from the
//! connection string; temporary links are blob service SAS tokens signed
//! with the same key.

mod client;
mod connection;
mod provider;
mod signing;

pub use connection::AzureConnection;
pub use provider::AzureBackend;
