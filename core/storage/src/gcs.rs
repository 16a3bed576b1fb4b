//! Google Cloud Storage backend.
//!
//! Built on `object_store`'s Cloud Storage client, authenticated by a
//! service account key. Temporary links are V4 signed URLs produced locally
//! with the key's private key.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use serde::Deserialize;

use cloudgate_common::{BlobDescriptor, Error, ProviderTag, Result, Secret};

use crate::bucket::{client_options, retry_config, BucketStore};
use crate::credentials::CredentialRecord;
use crate::provider::{ObjectUpload, StorageProvider};

/// Fields of the service account key this backend looks at itself.
///
/// `gcs_base_url` is set by storage emulators to redirect the client.
#[derive(Deserialize)]
struct KeyEndpoint {
    #[serde(default)]
    gcs_base_url: Option<String>,
}

/// Storage backend for a Cloud Storage bucket.
pub struct GcsBackend {
    service_account_key: Secret,
    bucket: String,
    store: Option<BucketStore<GoogleCloudStorage>>,
}

impl GcsBackend {
    /// Create an unauthenticated GCS backend from a credential record.
    ///
    /// The key itself is only parsed by
    /// [`initialize_client`](StorageProvider::initialize_client), so a
    /// malformed key surfaces as a `Connection` failure of the handshake.
    ///
    /// # Errors
    /// - `Config` if the key or bucket is missing
    pub fn from_record(record: &CredentialRecord) -> Result<Self> {
        Ok(Self {
            service_account_key: record.service_account()?.clone(),
            bucket: record.bucket()?.to_string(),
            store: None,
        })
    }

    fn build_store(&self) -> Result<GoogleCloudStorage> {
        let key = self.service_account_key.expose();
        let endpoint: KeyEndpoint = serde_json::from_str(key)
            .map_err(|e| Error::Connection(format!("Malformed service account key: {}", e)))?;
        let allow_http = endpoint
            .gcs_base_url
            .as_deref()
            .is_some_and(|url| url.starts_with("http://"));

        GoogleCloudStorageBuilder::new()
            .with_client_options(client_options(allow_http))
            .with_retry(retry_config())
            .with_bucket_name(&self.bucket)
            .with_service_account_key(key)
            .build()
            .map_err(|e| Error::Connection(format!("Failed to create Cloud Storage client: {}", e)))
    }

    fn store(&self) -> Result<&BucketStore<GoogleCloudStorage>> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::Connection("Client not initialized".to_string()))
    }
}

#[async_trait]
impl StorageProvider for GcsBackend {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Gcs
    }

    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    async fn initialize_client(&mut self) -> Result<()> {
        let store = BucketStore::new(self.build_store()?, ProviderTag::Gcs, self.bucket.clone(), false);
        store.handshake().await?;
        self.store = Some(store);
        Ok(())
    }

    async fn upload_object(&self, upload: ObjectUpload, is_public: bool) -> Result<BlobDescriptor> {
        self.store()?.upload(upload, is_public).await
    }

    async fn download_object(&self, name: &str) -> Result<Bytes> {
        self.store()?.download(name).await
    }

    async fn list_objects(&self) -> Result<Vec<BlobDescriptor>> {
        self.store()?.list().await
    }

    async fn delete_object(&self, name: &str) -> Result<bool> {
        self.store()?.delete(name).await
    }

    async fn generate_temporary_link(&self, name: &str) -> Result<String> {
        self.store()?.link(name).await
    }
}
