//! S3-compatible storage backend.
//!
//! Built on `object_store`'s Amazon S3 client. Without an endpoint the
//! bucket lives on AWS; a custom endpoint (MinIO, Ceph, ...) is addressed
//! path style.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use url::Url;

use cloudgate_common::{BlobDescriptor, Error, ProviderTag, Result, Secret};

use crate::bucket::{client_options, retry_config, BucketStore};
use crate::credentials::CredentialRecord;
use crate::provider::{ObjectUpload, StorageProvider};

/// Storage backend for one S3 bucket.
pub struct S3Backend {
    access_key: String,
    secret_key: Secret,
    bucket: String,
    region: String,
    endpoint: Option<Url>,
    store: Option<BucketStore<AmazonS3>>,
}

impl S3Backend {
    /// Create an unauthenticated S3 backend from a credential record.
    ///
    /// # Errors
    /// - `Config` if required fields are missing or the endpoint is not an
    ///   HTTP(S) URL
    pub fn from_record(record: &CredentialRecord) -> Result<Self> {
        let endpoint = record
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(parse_endpoint)
            .transpose()?;

        Ok(Self {
            access_key: record.access_key()?.to_string(),
            secret_key: record.secret_key()?.clone(),
            bucket: record.bucket()?.to_string(),
            region: record.region_or_default().to_string(),
            endpoint,
            store: None,
        })
    }

    fn build_store(&self) -> Result<AmazonS3> {
        let allow_http = self.endpoint.as_ref().is_some_and(|e| e.scheme() == "http");
        let mut builder = AmazonS3Builder::new()
            .with_client_options(client_options(allow_http))
            .with_retry(retry_config())
            .with_bucket_name(&self.bucket)
            .with_region(&self.region)
            .with_access_key_id(&self.access_key)
            .with_secret_access_key(self.secret_key.expose());

        if let Some(endpoint) = &self.endpoint {
            builder = builder
                .with_endpoint(endpoint.as_str().trim_end_matches('/'))
                .with_virtual_hosted_style_request(false);
        }

        builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create S3 client: {}", e)))
    }

    fn store(&self) -> Result<&BucketStore<AmazonS3>> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::Connection("Client not initialized".to_string()))
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint)
        .map_err(|e| Error::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::Config(format!(
            "Invalid endpoint '{}': unsupported scheme '{}'",
            endpoint, scheme
        ))),
    }
}

#[async_trait]
impl StorageProvider for S3Backend {
    fn tag(&self) -> ProviderTag {
        ProviderTag::S3
    }

    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    async fn initialize_client(&mut self) -> Result<()> {
        let store = BucketStore::new(self.build_store()?, ProviderTag::S3, self.bucket.clone(), true);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_cloud::{Dialect, MockCloud};

    async fn open(cloud: &MockCloud, bucket: &str) -> S3Backend {
        let record = CredentialRecord::s3("AKIA", "secret", bucket).with_endpoint(cloud.url());
        let mut backend = S3Backend::from_record(&record).unwrap();
        backend.initialize_client().await.unwrap();
        cloud.clear_requests();
        backend
    }

    #[test]
    fn test_from_record() {
        let record = CredentialRecord::s3("AKIA", "secret", "media").with_region("eu-west-1");
        let backend = S3Backend::from_record(&record).unwrap();
        assert_eq!(backend.tag(), ProviderTag::S3);
        assert_eq!(backend.bucket_name(), "media");
        assert_eq!(backend.region, "eu-west-1");
        assert!(backend.endpoint.is_none());
        assert!(backend.build_store().is_ok());
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        for endpoint in ["not a url", "ftp://files.example.com"] {
            let record = CredentialRecord::s3("a", "b", "c").with_endpoint(endpoint);
            assert!(matches!(S3Backend::from_record(&record), Err(Error::Config(_))), "{endpoint}");
        }
    }

    #[tokio::test]
    async fn test_operations_before_initialize_fail() {
        let backend = S3Backend::from_record(&CredentialRecord::s3("a", "b", "c")).unwrap();
        assert!(matches!(backend.list_objects().await, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn test_rejected_credentials_fail_handshake() {
        let cloud = MockCloud::start(Dialect::S3).await;
        cloud.reject_all();

        let record = CredentialRecord::s3("AKIA", "wrong", "media").with_endpoint(cloud.url());
        let mut backend = S3Backend::from_record(&record).unwrap();

        assert!(matches!(backend.initialize_client().await, Err(Error::Connection(_))));
        assert_eq!(cloud.requests(), vec!["LIST media"]);
    }

    #[tokio::test]
    async fn test_upload_list_download() {
        let cloud = MockCloud::start(Dialect::S3).await;
        let backend = open(&cloud, "media").await;

        let blob = backend
            .upload_object(ObjectUpload::new("cat.png", "meow"), true)
            .await
            .unwrap();
        assert!(blob.filename.ends_with(".png"));
        assert_eq!(blob.bucket_name, "media");
        assert_eq!(cloud.visibility("media", &blob.filename).as_deref(), Some("public"));

        assert_eq!(backend.list_objects().await.unwrap(), vec![blob.clone()]);
        assert_eq!(&backend.download_object(&blob.filename).await.unwrap()[..], b"meow");
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let cloud = MockCloud::start(Dialect::S3).await;
        let backend = open(&cloud, "media").await;

        let result = backend.download_object("ghost.txt").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(cloud.requests(), vec!["GET media/ghost.txt"]);
    }

    #[tokio::test]
    async fn test_delete_checks_existence_first() {
        let cloud = MockCloud::start(Dialect::S3).await;
        let backend = open(&cloud, "media").await;

        // S3 answers DELETE of a missing key with 204; only the HEAD sees it.
        assert!(!backend.delete_object("ghost.txt").await.unwrap());
        assert_eq!(cloud.requests(), vec!["HEAD media/ghost.txt"]);

        cloud.insert("media", "a.txt", b"x");
        cloud.clear_requests();
        assert!(backend.delete_object("a.txt").await.unwrap());
        assert_eq!(cloud.requests(), vec!["HEAD media/a.txt", "DELETE media/a.txt"]);
        assert!(!cloud.contains("media", "a.txt"));
    }

    #[tokio::test]
    async fn test_listing_follows_continuation_tokens() {
        let cloud = MockCloud::start(Dialect::S3).await;
        cloud.set_page_size(2);
        for name in ["a.txt", "b.txt", "c.txt"] {
            cloud.insert("media", name, b"x");
        }
        cloud.insert("other", "d.txt", b"x");
        let backend = open(&cloud, "media").await;

        let names: Vec<String> = backend
            .list_objects()
            .await
            .unwrap()
            .into_iter()
            .map(|blob| blob.filename)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(cloud.requests(), vec!["LIST media", "LIST media"]);
    }

    #[tokio::test]
    async fn test_names_cannot_leave_bucket() {
        let cloud = MockCloud::start(Dialect::S3).await;
        cloud.insert("other-bucket", "secret.txt", b"x");
        let backend = open(&cloud, "media").await;

        let name = "../other-bucket/secret.txt";
        assert!(matches!(backend.download_object(name).await, Err(Error::InvalidInput(_))));
        assert!(matches!(backend.delete_object(name).await, Err(Error::InvalidInput(_))));
        assert!(matches!(
            backend.generate_temporary_link(name).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(cloud.requests().is_empty());
        assert!(cloud.contains("other-bucket", "secret.txt"));
    }

    #[tokio::test]
    async fn test_presigned_link_window() {
        let cloud = MockCloud::start(Dialect::S3).await;
        let backend = open(&cloud, "media").await;

        let link = backend.generate_temporary_link("a.txt").await.unwrap();
        let url = Url::parse(&link).unwrap();
        assert_eq!(url.path(), "/media/a.txt");

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let param = |key: &str| query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        assert_eq!(param("X-Amz-Algorithm"), Some("AWS4-HMAC-SHA256"));
        assert_eq!(param("X-Amz-Expires"), Some("300"));
        assert!(param("X-Amz-Signature").is_some());
        assert!(cloud.requests().is_empty());
    }
}
