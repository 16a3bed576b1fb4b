//! Azure Blob REST API client.

use bytes::Bytes;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Method, Response, StatusCode};
use std::time::Duration;
use url::Url;

use crate::error::{BackendError, BackendResult};
use crate::xml;

use super::connection::AzureConnection;
use super::signing::{rfc1123, shared_key_authorization, BlobSas, SignableRequest, AZURE_API_VERSION};

/// Blob names keep `/` unencoded.
const AZURE_BLOB_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Content type sent with every blob upload.
const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// One page of a container listing.
#[derive(Debug, Default)]
pub(crate) struct BlobPage {
    pub names: Vec<String>,
    pub next_marker: Option<String>,
}

impl BlobPage {
    /// Parse an `EnumerationResults` body.
    pub fn parse(body: &str) -> Self {
        let names = xml::blocks(body, "Blob")
            .into_iter()
            .filter_map(|block| xml::first_tag(block, "Name"))
            .collect();
        let next_marker = xml::first_tag(body, "NextMarker").filter(|m| !m.is_empty());
        Self { names, next_marker }
    }
}

/// Shared Key authenticated client bound to one container.
pub struct BlobClient {
    http: Client,
    connection: AzureConnection,
    container: String,
}

impl BlobClient {
    pub fn new(http: Client, connection: AzureConnection, container: impl Into<String>) -> Self {
        Self {
            http,
            connection,
            container: container.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.connection.account
    }

    fn container_url(&self) -> BackendResult<Url> {
        let base = self.connection.blob_endpoint.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!(
            "{}/{}?restype=container",
            base,
            utf8_percent_encode(&self.container, AZURE_BLOB_ENCODE_SET)
        ))?)
    }

    pub(crate) fn blob_url(&self, name: &str) -> BackendResult<Url> {
        let base = self.connection.blob_endpoint.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!(
            "{}/{}/{}",
            base,
            utf8_percent_encode(&self.container, AZURE_BLOB_ENCODE_SET),
            utf8_percent_encode(name, AZURE_BLOB_ENCODE_SET)
        ))?)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        mut ms_headers: Vec<(String, String)>,
        body: Bytes,
    ) -> BackendResult<Response> {
        ms_headers.push(("x-ms-date".to_string(), rfc1123(&Utc::now())));
        ms_headers.push(("x-ms-version".to_string(), AZURE_API_VERSION.to_string()));

        let content_type = if body.is_empty() { "" } else { UPLOAD_CONTENT_TYPE };
        let authorization = shared_key_authorization(
            &self.connection.account,
            &self.connection.key,
            &SignableRequest {
                method: method.as_str(),
                url: &url,
                content_length: body.len(),
                content_type,
                ms_headers: &ms_headers,
            },
        )?;

        // PUT must declare a length even when empty.
        let send_body = !body.is_empty() || method == Method::PUT;
        let mut request = self
            .http
            .request(method, url)
            .header("authorization", authorization);
        for (name, value) in &ms_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !content_type.is_empty() {
            request = request.header("content-type", content_type);
        }
        if send_body {
            request = request.body(body);
        }

        Ok(request.send().await?)
    }

    async fn expect_success(response: Response) -> BackendResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(BackendError::from_response(response).await)
        }
    }

    /// Whether the container exists and the key may access it.
    pub async fn container_exists(&self) -> BackendResult<bool> {
        let response = self
            .send(Method::HEAD, self.container_url()?, Vec::new(), Bytes::new())
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success(response).await.map(|_| true)
    }

    pub async fn create_container(&self) -> BackendResult<()> {
        let response = self
            .send(
                Method::PUT,
                self.container_url()?,
                Vec::new(),
                Bytes::new(),
            )
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        Self::expect_success(response).await.map(|_| ())
    }

    /// Put a block blob with a visibility metadata entry.
    pub async fn put_blob(&self, name: &str, data: Bytes, visibility: &str) -> BackendResult<()> {
        let headers = vec![
            ("x-ms-blob-type".to_string(), "BlockBlob".to_string()),
            ("x-ms-meta-visibility".to_string(), visibility.to_string()),
        ];
        let response = self
            .send(Method::PUT, self.blob_url(name)?, headers, data)
            .await?;
        Self::expect_success(response).await.map(|_| ())
    }

    pub async fn blob_exists(&self, name: &str) -> BackendResult<bool> {
        let response = self
            .send(Method::HEAD, self.blob_url(name)?, Vec::new(), Bytes::new())
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success(response).await.map(|_| true)
    }

    pub async fn get_blob(&self, name: &str) -> BackendResult<Bytes> {
        let response = self
            .send(Method::GET, self.blob_url(name)?, Vec::new(), Bytes::new())
            .await?;
        Ok(Self::expect_success(response).await?.bytes().await?)
    }

    /// Delete a blob; `false` if it did not exist.
    pub async fn delete_blob(&self, name: &str) -> BackendResult<bool> {
        let response = self
            .send(Method::DELETE, self.blob_url(name)?, Vec::new(), Bytes::new())
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success(response).await.map(|_| true)
    }

    /// Names of every blob in the container, following markers.
    pub async fn list_blobs(&self) -> BackendResult<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = self.container_url()?;
            url.query_pairs_mut().append_pair("comp", "list");
            if let Some(ref m) = marker {
                url.query_pairs_mut().append_pair("marker", m);
            }

            let response = self.send(Method::GET, url, Vec::new(), Bytes::new()).await?;
            let body = Self::expect_success(response).await?.text().await?;
            let page = BlobPage::parse(&body);
            names.extend(page.names);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(names)
    }

    /// Blob URL carrying a read-only SAS.
    pub fn sas_url(&self, name: &str, ttl: Duration) -> BackendResult<Url> {
        let sas = BlobSas::new(&self.connection.account, &self.container, name, ttl, Utc::now());
        let mut url = self.blob_url(name)?;
        url.set_query(Some(&sas.token(&self.connection.key)?));
        Ok(url)
    }
}
