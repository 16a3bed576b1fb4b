//! Bucket operations shared by the S3 and Cloud Storage backends.
//!
//! Both services are driven through `object_store`; this module holds the
//! parts of the storage contract they have in common and the translation of
//! `object_store` failures into the shared taxonomy.

use bytes::Bytes;
use futures::stream::StreamExt;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    RetryConfig,
};
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, error, info};

use cloudgate_common::{BlobDescriptor, Error, ProviderTag, Result};

use crate::provider::{checked_object_name, visibility_label, ObjectUpload};

/// Metadata key carrying the visibility label of an upload.
pub(crate) const VISIBILITY_METADATA: &str = "visibility";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: usize = 3;
const RETRY_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client options for a backend. Plain HTTP is only allowed for
/// explicitly configured local endpoints.
pub(crate) fn client_options(allow_http: bool) -> ClientOptions {
    ClientOptions::default()
        .with_allow_http(allow_http)
        .with_timeout(REQUEST_TIMEOUT)
        .with_connect_timeout(CONNECT_TIMEOUT)
}

/// A request blocks one HTTP call, so retries are bounded well below the
/// `object_store` defaults.
pub(crate) fn retry_config() -> RetryConfig {
    RetryConfig {
        backoff: Default::default(),
        max_retries: MAX_RETRIES,
        retry_timeout: RETRY_TIMEOUT,
    }
}

/// An `object_store` client bound to one bucket.
pub(crate) struct BucketStore<S> {
    store: S,
    tag: ProviderTag,
    bucket: String,
    /// The service answers DELETE of a missing key with success, so
    /// deletes are preceded by a HEAD.
    head_before_delete: bool,
}

impl<S> BucketStore<S>
where
    S: ObjectStore + Signer,
{
    pub fn new(store: S, tag: ProviderTag, bucket: impl Into<String>, head_before_delete: bool) -> Self {
        Self {
            store,
            tag,
            bucket: bucket.into(),
            head_before_delete,
        }
    }

    fn path(&self, name: &str) -> Result<Path> {
        let name = checked_object_name(name)?;
        Path::parse(name)
            .map_err(|e| Error::InvalidInput(format!("Invalid object name '{}': {}", name, e)))
    }

    fn not_found(&self, name: &str) -> Error {
        Error::NotFound(format!(
            "Object '{}' not found in bucket '{}'",
            name, self.bucket
        ))
    }

    fn failure(&self, operation: &str, e: &object_store::Error) {
        error!(provider = %self.tag, bucket = %self.bucket, operation, error = %e, "Storage request failed");
    }

    /// Read the first listing page to prove the credentials reach the bucket.
    pub async fn handshake(&self) -> Result<()> {
        let mut objects = self.store.list(None);
        if let Some(Err(e)) = objects.next().await {
            self.failure("handshake", &e);
            return Err(Error::Connection(format!(
                "Could not access bucket '{}': {}",
                self.bucket, e
            )));
        }

        info!(provider = %self.tag, bucket = %self.bucket, "Storage client ready");
        Ok(())
    }

    pub async fn upload(&self, upload: ObjectUpload, is_public: bool) -> Result<BlobDescriptor> {
        let name = upload.object_name();

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::Metadata(VISIBILITY_METADATA.into()),
            visibility_label(is_public).into(),
        );
        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };

        self.store
            .put_opts(&Path::from(name.as_str()), PutPayload::from(upload.data), options)
            .await
            .map_err(|e| {
                self.failure("upload", &e);
                Error::Upload(e.to_string())
            })?;

        debug!(bucket = %self.bucket, object = %name, "Uploaded object");
        Ok(BlobDescriptor::new(name, self.bucket.clone()))
    }

    pub async fn download(&self, name: &str) -> Result<Bytes> {
        let path = self.path(name)?;
        let read = match self.store.get(&path).await {
            Ok(result) => result.bytes().await,
            Err(e) => Err(e),
        };

        match read {
            Ok(data) => Ok(data),
            Err(object_store::Error::NotFound { .. }) => Err(self.not_found(name)),
            Err(e) => {
                self.failure("download", &e);
                Err(Error::Download(e.to_string()))
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<BlobDescriptor>> {
        let mut blobs = Vec::new();
        let mut stream = self.store.list(None);

        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(|e| {
                self.failure("list", &e);
                Error::Storage(e.to_string())
            })?;
            blobs.push(BlobDescriptor::new(meta.location.to_string(), self.bucket.clone()));
        }

        Ok(blobs)
    }

    pub async fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path(name)?;
        let failed = |e: object_store::Error| {
            self.failure("delete", &e);
            Error::Delete(e.to_string())
        };

        if self.head_before_delete {
            match self.store.head(&path).await {
                Ok(_) => {}
                Err(object_store::Error::NotFound { .. }) => return Ok(false),
                Err(e) => return Err(failed(e)),
            }
        }

        match self.store.delete(&path).await {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(failed(e)),
        }
    }

    /// Presigned GET URL valid for the tag's link window.
    pub async fn link(&self, name: &str) -> Result<String> {
        let path = self.path(name)?;
        let url = self
            .store
            .signed_url(Method::GET, &path, self.tag.link_ttl())
            .await
            .map_err(|e| {
                self.failure("link", &e);
                Error::Storage(e.to_string())
            })?;
        Ok(url.to_string())
    }
}
