//! Service sessions.
//!
//! A session owns exactly one initialized backend for the lifetime of one
//! logical request. The only way to obtain one is [`ServiceSession::open`],
//! which runs the backend handshake first, so no capability call can reach
//! an uninitialized client.

use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use cloudgate_common::{BlobDescriptor, ProviderTag, Result};

use crate::provider::{ObjectUpload, StorageProvider};

/// Session handle for tracking active sessions in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Generate a new unique session handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Initialized backend bound to one request.
pub struct ServiceSession {
    handle: SessionHandle,
    backend: Box<dyn StorageProvider>,
}

impl ServiceSession {
    /// Initialize `backend` and wrap it in a session.
    ///
    /// # Postconditions
    /// - The backend's client is live and its credentials were accepted
    ///
    /// # Errors
    /// - `Config` / `Connection` from the backend handshake, unchanged
    pub async fn open(mut backend: Box<dyn StorageProvider>) -> Result<Self> {
        let handle = SessionHandle::new();
        debug!(
            session = %handle,
            provider = %backend.tag(),
            bucket = backend.bucket_name(),
            "Initializing storage client"
        );
        backend.initialize_client().await?;
        Ok(Self { handle, backend })
    }

    /// Get the session handle.
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Backend tag.
    pub fn tag(&self) -> ProviderTag {
        self.backend.tag()
    }

    /// Bucket or container the session is bound to.
    pub fn bucket_name(&self) -> &str {
        self.backend.bucket_name()
    }

    pub async fn upload_object(&self, upload: ObjectUpload, is_public: bool) -> Result<BlobDescriptor> {
        self.backend.upload_object(upload, is_public).await
    }

    pub async fn download_object(&self, name: &str) -> Result<Bytes> {
        self.backend.download_object(name).await
    }

    pub async fn list_objects(&self) -> Result<Vec<BlobDescriptor>> {
        self.backend.list_objects().await
    }

    pub async fn delete_object(&self, name: &str) -> Result<bool> {
        self.backend.delete_object(name).await
    }

    pub async fn generate_temporary_link(&self, name: &str) -> Result<String> {
        self.backend.generate_temporary_link(name).await
    }
}

impl Drop for ServiceSession {
    fn drop(&mut self) {
        debug!(session = %self.handle, "Storage session closed");
    }
}
