//! In-memory storage backend for testing and local development.
//!
//! A [`MemoryCloud`] plays the part of the remote service: it holds every
//! bucket, shared by all backends created from it. Buckets are namespaced by
//! the account identity in the credential record, so two users with the
//! same tag but different credentials never see each other's objects.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::debug;

use cloudgate_common::{BlobDescriptor, Error, ProviderTag, Result};

use crate::credentials::CredentialRecord;
use crate::provider::{checked_object_name, visibility_label, ObjectUpload, StorageProvider};
use crate::registry::ProviderRegistry;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    visibility: &'static str,
}

type BucketKey = (ProviderTag, String, String);

/// Shared in-memory object store standing in for the remote clouds.
#[derive(Clone, Default)]
pub struct MemoryCloud {
    buckets: Arc<RwLock<HashMap<BucketKey, BTreeMap<String, StoredObject>>>>,
    revoked: Arc<RwLock<HashSet<String>>>,
}

impl MemoryCloud {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future handshake that presents `secret`.
    ///
    /// Simulates a rotated or invalid key: backends using it fail
    /// `initialize_client` with `Connection`.
    pub fn revoke_secret(&self, secret: impl Into<String>) {
        if let Ok(mut revoked) = self.revoked.write() {
            revoked.insert(secret.into());
        }
    }

    /// Whether a bucket exists for the given account identity.
    pub fn bucket_exists(&self, tag: ProviderTag, identity: &str, bucket: &str) -> bool {
        self.buckets
            .read()
            .map(|b| b.contains_key(&(tag, identity.to_string(), bucket.to_string())))
            .unwrap_or(false)
    }

    /// Number of objects in a bucket.
    pub fn object_count(&self, tag: ProviderTag, identity: &str, bucket: &str) -> usize {
        self.buckets
            .read()
            .ok()
            .and_then(|b| {
                b.get(&(tag, identity.to_string(), bucket.to_string()))
                    .map(BTreeMap::len)
            })
            .unwrap_or(0)
    }

    fn is_revoked(&self, secret: &str) -> Result<bool> {
        let revoked = self
            .revoked
            .read()
            .map_err(|_| Error::Storage("Memory cloud lock poisoned".to_string()))?;
        Ok(revoked.contains(secret))
    }

    fn with_buckets<T>(
        &self,
        f: impl FnOnce(&mut HashMap<BucketKey, BTreeMap<String, StoredObject>>) -> T,
    ) -> Result<T> {
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| Error::Storage("Memory cloud lock poisoned".to_string()))?;
        Ok(f(&mut buckets))
    }
}

/// Backend storing objects in a [`MemoryCloud`].
pub struct MemoryBackend {
    cloud: MemoryCloud,
    tag: ProviderTag,
    identity: String,
    secret: String,
    bucket: String,
    initialized: bool,
}

impl MemoryBackend {
    /// Create a backend from a credential record.
    ///
    /// # Errors
    /// - `Config` if the record is incomplete for its tag
    pub fn new(cloud: MemoryCloud, record: CredentialRecord) -> Result<Self> {
        record.validate()?;

        let (identity, secret) = match record.provider {
            ProviderTag::S3 => (
                record.access_key()?.to_string(),
                record.secret_key()?.expose().to_string(),
            ),
            ProviderTag::Azure => {
                let conn = record.connection()?.expose().to_string();
                (conn.clone(), conn)
            }
            ProviderTag::Gcs => {
                let key = record.service_account()?.expose().to_string();
                (key.clone(), key)
            }
        };

        Ok(Self {
            cloud,
            tag: record.provider,
            identity,
            secret,
            bucket: record.bucket()?.to_string(),
            initialized: false,
        })
    }

    fn key(&self) -> BucketKey {
        (self.tag, self.identity.clone(), self.bucket.clone())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::Connection("Client not initialized".to_string()))
        }
    }
}

impl Drop for MemoryBackend {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.secret.zeroize();
    }
}

#[async_trait]
impl StorageProvider for MemoryBackend {
    fn tag(&self) -> ProviderTag {
        self.tag
    }

    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    async fn initialize_client(&mut self) -> Result<()> {
        if self.cloud.is_revoked(&self.secret)? {
            return Err(Error::Connection(format!(
                "Credentials rejected for bucket '{}'",
                self.bucket
            )));
        }

        let key = self.key();
        self.cloud.with_buckets(|buckets| {
            buckets.entry(key).or_default();
        })?;
        self.initialized = true;
        Ok(())
    }

    async fn upload_object(&self, upload: ObjectUpload, is_public: bool) -> Result<BlobDescriptor> {
        self.ensure_initialized()?;
        let name = upload.object_name();
        let key = self.key();

        self.cloud
            .with_buckets(|buckets| {
                buckets.entry(key).or_default().insert(
                    name.clone(),
                    StoredObject {
                        data: upload.data,
                        visibility: visibility_label(is_public),
                    },
                );
            })
            .map_err(|e| Error::Upload(e.to_string()))?;

        debug!(bucket = %self.bucket, name = %name, "Stored object in memory");
        Ok(BlobDescriptor::new(name, self.bucket.clone()))
    }

    async fn download_object(&self, name: &str) -> Result<Bytes> {
        self.ensure_initialized()?;
        let name = checked_object_name(name)?;
        let key = self.key();

        self.cloud
            .with_buckets(|buckets| {
                buckets
                    .get(&key)
                    .and_then(|objects| objects.get(name))
                    .map(|object| object.data.clone())
            })
            .map_err(|e| Error::Download(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("Object '{}' not found", name)))
    }

    async fn list_objects(&self) -> Result<Vec<BlobDescriptor>> {
        self.ensure_initialized()?;
        let key = self.key();

        let names = self.cloud.with_buckets(|buckets| {
            buckets
                .get(&key)
                .map(|objects| objects.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        })?;

        Ok(names
            .into_iter()
            .map(|name| BlobDescriptor::new(name, self.bucket.clone()))
            .collect())
    }

    async fn delete_object(&self, name: &str) -> Result<bool> {
        self.ensure_initialized()?;
        let name = checked_object_name(name)?;
        let key = self.key();

        self.cloud
            .with_buckets(|buckets| {
                buckets
                    .get_mut(&key)
                    .and_then(|objects| objects.remove(name))
                    .is_some()
            })
            .map_err(|e| Error::Delete(e.to_string()))
    }

    async fn generate_temporary_link(&self, name: &str) -> Result<String> {
        self.ensure_initialized()?;
        let name = checked_object_name(name)?;
        let expires = Utc::now().timestamp() + self.tag.link_ttl().as_secs() as i64;
        Ok(format!(
            "memory://{}/{}/{}?expires={}",
            self.tag, self.bucket, name, expires
        ))
    }
}

/// Registry that builds [`MemoryBackend`]s for every tag.
pub fn memory_registry(cloud: MemoryCloud) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for tag in ProviderTag::ALL {
        let cloud = cloud.clone();
        registry.factories.insert(
            tag,
            Box::new(move |record: &CredentialRecord| {
                let backend = MemoryBackend::new(cloud.clone(), record.clone())?;
                Ok(Box::new(backend) as Box<dyn StorageProvider>)
            }),
        );
    }
    registry
}
