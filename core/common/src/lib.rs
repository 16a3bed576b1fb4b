//! Common types shared across the CloudGate crates.
//!
//! This module provides the error taxonomy every layer reports in, plus the
//! small identifier and value types that cross crate boundaries.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{BlobDescriptor, ProviderTag, Secret, UserId};
