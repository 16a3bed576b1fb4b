//! Per-request resolution of a user's backend.
//!
//! Every operation looks up the caller's registered providers, fetches the
//! matching credential record, builds an adapter through the registry and
//! opens a fresh [`ServiceSession`] on it. Nothing is cached between calls.

use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{field, info, info_span, warn, Instrument, Span};

use cloudgate_common::{BlobDescriptor, Error, ProviderTag, Result, UserId};
use cloudgate_storage::{CredentialRecord, ObjectUpload, ProviderRegistry, ServiceSession};

use crate::store::CredentialStore;

/// Resolves users to backends and runs storage operations on them.
pub struct Gateway {
    credentials: Arc<dyn CredentialStore>,
    registry: ProviderRegistry,
}

fn operation_span(op: &'static str, user: Option<&UserId>, provider: &str) -> Span {
    info_span!(
        "gateway",
        op,
        user = user.map(|u| u.as_str()).unwrap_or("anonymous"),
        provider,
        session = field::Empty
    )
}

impl Gateway {
    pub fn new(credentials: Arc<dyn CredentialStore>, registry: ProviderRegistry) -> Self {
        Self {
            credentials,
            registry,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Providers the user has registered credentials for.
    pub fn configured_providers(&self, user: &UserId) -> Result<Vec<ProviderTag>> {
        self.credentials.providers(user)
    }

    /// Store credentials for one of the user's providers.
    ///
    /// Replaces any record previously registered for the same provider.
    ///
    /// # Errors
    /// - `Config` if the provider is unsupported or a required field is missing
    pub fn register_credentials(
        &self,
        user: &UserId,
        provider: &str,
        fields: &HashMap<String, String>,
    ) -> Result<ProviderTag> {
        let tag: ProviderTag = provider.parse()?;
        let record = CredentialRecord::from_fields(tag, fields);
        record.validate()?;

        self.credentials.upsert(user, &record)?;
        info!(user = %user, provider = %tag, "Credentials registered");
        Ok(tag)
    }

    async fn resolve(&self, user: &UserId, provider: &str) -> Result<ServiceSession> {
        let registered = self.credentials.providers(user)?;
        if registered.is_empty() {
            return Err(Error::NoProviderConfigured(
                "No cloud provider configured".to_string(),
            ));
        }

        let tag = provider
            .parse::<ProviderTag>()
            .ok()
            .filter(|tag| registered.contains(tag))
            .ok_or_else(|| {
                Error::NoProviderConfigured(format!("Cloud provider '{}' not configured", provider))
            })?;

        let record = self.credentials.get(user, tag)?.ok_or_else(|| {
            Error::NoProviderConfigured(format!("Cloud provider '{}' not configured", tag))
        })?;

        self.open(tag, &record).await
    }

    async fn open(&self, tag: ProviderTag, record: &CredentialRecord) -> Result<ServiceSession> {
        let backend = self.registry.build(tag, record)?;
        let session = ServiceSession::open(backend).await?;
        Span::current().record("session", field::display(session.handle()));
        Ok(session)
    }

    async fn with_session<T, F, Fut>(
        &self,
        op: &'static str,
        user: &UserId,
        provider: &str,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(ServiceSession) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = operation_span(op, Some(user), provider);
        async move {
            let session = self.resolve(user, provider).await?;
            f(session).await
        }
        .instrument(span)
        .await
    }

    /// Upload an object to the user's backend under a generated name.
    pub async fn upload(
        &self,
        user: &UserId,
        provider: &str,
        upload: ObjectUpload,
        is_public: bool,
    ) -> Result<BlobDescriptor> {
        self.with_session("upload", user, provider, |session| async move {
            let blob = session.upload_object(upload, is_public).await?;
            info!(object = %blob.filename, bucket = %blob.bucket_name, "Object uploaded");
            Ok(blob)
        })
        .await
    }

    /// Fetch an object's content.
    pub async fn download(&self, user: &UserId, provider: &str, name: &str) -> Result<Bytes> {
        self.with_session("download", user, provider, |session| async move {
            session.download_object(name).await
        })
        .await
    }

    /// List the objects in the user's bucket.
    pub async fn list(&self, user: &UserId, provider: &str) -> Result<Vec<BlobDescriptor>> {
        self.with_session("list", user, provider, |session| async move {
            session.list_objects().await
        })
        .await
    }

    /// Delete an object; `false` if nothing was deleted.
    pub async fn delete(&self, user: &UserId, provider: &str, name: &str) -> Result<bool> {
        self.with_session("delete", user, provider, |session| async move {
            let deleted = session.delete_object(name).await?;
            info!(object = name, deleted, "Delete finished");
            Ok(deleted)
        })
        .await
    }

    /// Time-limited read URL for an object.
    pub async fn temporary_link(&self, user: &UserId, provider: &str, name: &str) -> Result<String> {
        self.with_session("link", user, provider, |session| async move {
            session.generate_temporary_link(name).await
        })
        .await
    }

    /// Open a session from caller-supplied credentials, bypassing the store.
    ///
    /// This is the lower-trust path: the caller is not authenticated and
    /// nothing is persisted.
    async fn open_anonymous(
        &self,
        provider: &str,
        fields: &HashMap<String, String>,
    ) -> Result<ServiceSession> {
        let tag: ProviderTag = provider.parse()?;
        warn!(provider = %tag, "Anonymous request with caller-supplied credentials");
        let record = CredentialRecord::from_fields(tag, fields);
        self.open(tag, &record).await
    }

    /// Upload with credentials supplied in the request.
    ///
    /// # Errors
    /// - `Config` if the provider is unsupported or the fields are incomplete
    /// - `Connection` if the backend rejects the credentials
    pub async fn anonymous_upload(
        &self,
        provider: &str,
        fields: &HashMap<String, String>,
        upload: ObjectUpload,
        is_public: bool,
    ) -> Result<BlobDescriptor> {
        async move {
            let session = self.open_anonymous(provider, fields).await?;
            session.upload_object(upload, is_public).await
        }
        .instrument(operation_span("upload-public", None, provider))
        .await
    }

    /// Temporary link with credentials supplied in the request.
    pub async fn anonymous_link(
        &self,
        provider: &str,
        fields: &HashMap<String, String>,
        name: &str,
    ) -> Result<String> {
        async move {
            let session = self.open_anonymous(provider, fields).await?;
            session.generate_temporary_link(name).await
        }
        .instrument(operation_span("view-public", None, provider))
        .await
    }
}
