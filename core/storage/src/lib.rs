//! Storage provider abstraction for CloudGate.
//!
//! This crate provides a trait-based interface over heterogeneous cloud
//! object stores (S3-compatible, Azure Blob, Cloud Storage), the registry
//! that builds a backend from a per-user credential record, and the service
//! session that guarantees a backend is initialized before use.
//!
//! # Design Principles
//! - Closed set of backends dispatched by explicit provider tag
//! - One fresh backend per request, never shared across users
//! - Backend failures are translated into the shared error taxonomy at the
//!   adapter boundary

pub mod azure;
mod bucket;
pub mod credentials;
mod error;
pub mod gcs;
pub mod memory;
#[cfg(test)]
mod mock_cloud;
pub mod provider;
pub mod registry;
pub mod s3;
pub mod session;
mod xml;

pub use azure::AzureBackend;
pub use credentials::CredentialRecord;
pub use gcs::GcsBackend;
pub use memory::{memory_registry, MemoryBackend, MemoryCloud};
pub use provider::{checked_object_name, object_name_for, ObjectUpload, StorageProvider};
pub use registry::{create_default_registry, BackendFactory, ProviderRegistry};
pub use s3::S3Backend;
pub use session::{ServiceSession, SessionHandle};
