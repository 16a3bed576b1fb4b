//! Azure Blob storage provider implementation.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use cloudgate_common::{BlobDescriptor, Error, ProviderTag, Result, Secret};

use crate::credentials::CredentialRecord;
use crate::error::BackendError;
use crate::provider::{checked_object_name, visibility_label, ObjectUpload, StorageProvider};

use super::client::BlobClient;
use super::connection::AzureConnection;

/// Storage backend for one Azure Blob container.
///
/// The connection string is only parsed during
/// [`initialize_client`](StorageProvider::initialize_client), so a malformed
/// string surfaces as a `Connection` failure of the handshake.
pub struct AzureBackend {
    connection_string: Secret,
    container: String,
    client: Option<BlobClient>,
}

impl AzureBackend {
    /// Create an unauthenticated Azure backend from a credential record.
    ///
    /// # Errors
    /// - `Config` if the connection string or container is missing
    pub fn from_record(record: &CredentialRecord) -> Result<Self> {
        Ok(Self {
            connection_string: record.connection()?.clone(),
            container: record.bucket()?.to_string(),
            client: None,
        })
    }

    fn client(&self) -> Result<&BlobClient> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Connection("Client not initialized".to_string()))
    }

    fn log_failure(&self, operation: &str, e: &BackendError) {
        error!(container = %self.container, operation, error = %e, "Azure request failed");
    }
}

#[async_trait]
impl StorageProvider for AzureBackend {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Azure
    }

    fn bucket_name(&self) -> &str {
        &self.container
    }

    async fn initialize_client(&mut self) -> Result<()> {
        let connection = AzureConnection::parse(self.connection_string.expose())?;
        let http = Client::builder()
            .user_agent(concat!("CloudGate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Connection(format!("Failed to create HTTP client: {}", e)))?;
        let client = BlobClient::new(http, connection, self.container.clone());

        let exists = client.container_exists().await.map_err(|e| {
            self.log_failure("handshake", &e);
            Error::Connection(format!(
                "Could not access container '{}': {}",
                self.container, e
            ))
        })?;

        if !exists {
            if let Err(e) = client.create_container().await {
                warn!(container = %self.container, error = %e, "Container creation failed");
            }
        }

        info!(account = client.account(), container = %self.container, "Storage client ready");
        self.client = Some(client);
        Ok(())
    }

    async fn upload_object(&self, upload: ObjectUpload, is_public: bool) -> Result<BlobDescriptor> {
        let client = self.client()?;
        let name = upload.object_name();

        client
            .put_blob(&name, upload.data, visibility_label(is_public))
            .await
            .map_err(|e| {
                self.log_failure("upload", &e);
                e.into_error(Error::Upload)
            })?;

        debug!(container = %self.container, name = %name, "Uploaded blob");
        Ok(BlobDescriptor::new(name, self.container.clone()))
    }

    async fn download_object(&self, name: &str) -> Result<Bytes> {
        let client = self.client()?;
        let name = checked_object_name(name)?;
        let map = |e: BackendError| {
            self.log_failure("download", &e);
            e.into_error(Error::Download)
        };

        // A HEAD reports missing blobs before the read.
        if !client.blob_exists(name).await.map_err(map)? {
            return Err(Error::NotFound(format!(
                "Blob '{}' not found in container '{}'",
                name, self.container
            )));
        }
        client.get_blob(name).await.map_err(map)
    }

    async fn list_objects(&self) -> Result<Vec<BlobDescriptor>> {
        let names = self.client()?.list_blobs().await.map_err(|e| {
            self.log_failure("list", &e);
            if e.is_connection_failure() {
                e.into_error(Error::Connection)
            } else {
                e.into_error(Error::Storage)
            }
        })?;

        Ok(names
            .into_iter()
            .map(|name| BlobDescriptor::new(name, self.container.clone()))
            .collect())
    }

    async fn delete_object(&self, name: &str) -> Result<bool> {
        let client = self.client()?;
        client.delete_blob(checked_object_name(name)?).await.map_err(|e| {
            self.log_failure("delete", &e);
            e.into_error(Error::Delete)
        })
    }

    async fn generate_temporary_link(&self, name: &str) -> Result<String> {
        let client = self.client()?;
        let url = client
            .sas_url(checked_object_name(name)?, ProviderTag::Azure.link_ttl())
            .map_err(|e| e.into_error(Error::Storage))?;
        Ok(url.to_string())
    }
}
