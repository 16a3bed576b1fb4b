//! Storage provider trait definition.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use cloudgate_common::{BlobDescriptor, Error, ProviderTag, Result};

/// Object handed to [`StorageProvider::upload_object`].
#[derive(Debug, Clone)]
pub struct ObjectUpload {
    /// Name the caller gave the file. Only its extension is kept.
    pub original_filename: String,
    /// Complete object content.
    pub data: Bytes,
}

impl ObjectUpload {
    pub fn new(original_filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            original_filename: original_filename.into(),
            data: data.into(),
        }
    }

    /// Generate the storage name for this upload.
    ///
    /// A random UUID followed by the original extension, if the original name
    /// has one. The caller-supplied name itself is never reused.
    pub fn object_name(&self) -> String {
        object_name_for(&self.original_filename)
    }
}

/// Generate a fresh object name preserving the extension of `original`.
pub fn object_name_for(original: &str) -> String {
    let id = uuid::Uuid::new_v4();
    match Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
    {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

/// Check a caller-supplied object name before it is turned into a request.
///
/// Names are relative to the bound bucket/container: empty names, a leading
/// `/`, and empty, `.` or `..` segments are rejected so a request can never
/// address another bucket.
///
/// # Errors
/// - `InvalidInput` describing the offending name
pub fn checked_object_name(name: &str) -> Result<&str> {
    let invalid = |reason: &str| {
        Err(Error::InvalidInput(format!(
            "Invalid object name '{}': {}",
            name, reason
        )))
    };

    if name.is_empty() {
        return invalid("empty");
    }
    if name.starts_with('/') {
        return invalid("must not start with '/'");
    }
    if name.chars().any(|c| c.is_control()) {
        return invalid("contains control characters");
    }
    if name.split('/').any(|segment| matches!(segment, "" | "." | "..")) {
        return invalid("contains an empty, '.' or '..' segment");
    }
    Ok(name)
}

/// Visibility marker recorded as object metadata on upload.
pub fn visibility_label(is_public: bool) -> &'static str {
    if is_public {
        "public"
    } else {
        "private"
    }
}

/// Storage capability contract shared by every backend.
///
/// A provider instance is bound to one credential record and one
/// bucket/container. Instances are created unauthenticated by the registry;
/// [`initialize_client`](StorageProvider::initialize_client) must succeed
/// before any other operation is used, which
/// [`ServiceSession`](crate::ServiceSession) enforces.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Backend variant this provider implements.
    fn tag(&self) -> ProviderTag;

    /// Bucket or container the provider is bound to.
    fn bucket_name(&self) -> &str;

    /// Build the live client and validate the credentials against the backend.
    ///
    /// # Postconditions
    /// - Client handle is ready; bucket/container exists (created best-effort)
    ///
    /// # Errors
    /// - `Config` when required credential fields are missing
    /// - `Connection` when the backend rejects the credentials or is unreachable
    async fn initialize_client(&mut self) -> Result<()>;

    /// Store an object under a freshly generated name.
    ///
    /// # Postconditions
    /// - Object is visible to subsequent `list_objects` calls
    /// - Returned descriptor carries the generated name
    ///
    /// # Errors
    /// - `Upload` on backend rejection (quota, permission, I/O)
    async fn upload_object(&self, upload: ObjectUpload, is_public: bool)
        -> Result<BlobDescriptor>;

    /// Fetch the complete content of an object.
    ///
    /// # Errors
    /// - `NotFound` if the object does not exist, whatever the backend's
    ///   native missing-object behaviour
    /// - `Download` on transfer or backend failure
    async fn download_object(&self, name: &str) -> Result<Bytes>;

    /// List every object in the bound bucket/container, in backend order.
    ///
    /// An empty container yields an empty vector.
    async fn list_objects(&self) -> Result<Vec<BlobDescriptor>>;

    /// Delete an object.
    ///
    /// # Returns
    /// - `Ok(true)` if the object existed and was removed
    /// - `Ok(false)` if there was nothing to remove
    ///
    /// # Errors
    /// - `Delete` only on genuine backend failure
    async fn delete_object(&self, name: &str) -> Result<bool>;

    /// Produce a signed, time-limited read URL for an object.
    ///
    /// The window is fixed per backend (see [`ProviderTag::link_ttl`]).
    async fn generate_temporary_link(&self, name: &str) -> Result<String>;
}
