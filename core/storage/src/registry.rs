//! Provider registry: tag-dispatched backend construction.

use std::collections::HashMap;

use cloudgate_common::{Error, ProviderTag, Result};

use crate::credentials::CredentialRecord;
use crate::provider::StorageProvider;

/// Factory function type for creating unauthenticated backends.
pub type BackendFactory =
    Box<dyn Fn(&CredentialRecord) -> Result<Box<dyn StorageProvider>> + Send + Sync>;

/// Registry of backend factories keyed by provider tag.
///
/// The set of tags is closed, so resolution is a map lookup on the tag the
/// caller asked for, never an inspection of the record's runtime shape.
pub struct ProviderRegistry {
    pub(crate) factories: HashMap<ProviderTag, BackendFactory>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory.
    ///
    /// # Preconditions
    /// - `tag` must not already be registered
    ///
    /// # Errors
    /// - `AlreadyExists` if the tag is already registered
    pub fn register(&mut self, tag: ProviderTag, factory: BackendFactory) -> Result<()> {
        if self.factories.contains_key(&tag) {
            return Err(Error::AlreadyExists(format!(
                "Provider '{}' is already registered",
                tag
            )));
        }
        self.factories.insert(tag, factory);
        Ok(())
    }

    /// Construct a fresh, unauthenticated backend for `tag` from `record`.
    ///
    /// # Preconditions
    /// - `record.provider` must equal `tag`
    /// - Every field required by `tag` must be present
    ///
    /// # Postconditions
    /// - Returns a new instance; nothing is cached between calls
    ///
    /// # Errors
    /// - `Config` on tag mismatch or missing fields (the factory is not invoked)
    /// - `NotFound` if no factory is registered for `tag`
    pub fn build(&self, tag: ProviderTag, record: &CredentialRecord) -> Result<Box<dyn StorageProvider>> {
        if record.provider != tag {
            return Err(Error::Config(format!(
                "Credential record is for '{}', not '{}'",
                record.provider, tag
            )));
        }
        record.validate()?;

        let factory = self
            .factories
            .get(&tag)
            .ok_or_else(|| Error::NotFound(format!("Provider '{}' is not registered", tag)))?;
        factory(record)
    }

    /// Get list of registered tags.
    pub fn providers(&self) -> Vec<ProviderTag> {
        let mut tags: Vec<_> = self.factories.keys().copied().collect();
        tags.sort();
        tags
    }

    /// Check if a tag is registered.
    pub fn has_provider(&self, tag: ProviderTag) -> bool {
        self.factories.contains_key(&tag)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with the S3, Azure and GCS backends.
pub fn create_default_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    registry.factories.insert(ProviderTag::S3, Box::new(build_s3));
    registry.factories.insert(ProviderTag::Azure, Box::new(build_azure));
    registry.factories.insert(ProviderTag::Gcs, Box::new(build_gcs));

    registry
}

fn build_s3(record: &CredentialRecord) -> Result<Box<dyn StorageProvider>> {
    Ok(Box::new(crate::s3::S3Backend::from_record(record)?))
}

fn build_azure(record: &CredentialRecord) -> Result<Box<dyn StorageProvider>> {
    Ok(Box::new(crate::azure::AzureBackend::from_record(record)?))
}

fn build_gcs(record: &CredentialRecord) -> Result<Box<dyn StorageProvider>> {
    Ok(Box::new(crate::gcs::GcsBackend::from_record(record)?))
}
