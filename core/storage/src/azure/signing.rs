//! Shared Key request signing and service SAS generation.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::error::{BackendError, BackendResult};

type HmacSha256 = Hmac<Sha256>;

/// REST API version sent with every request.
pub(crate) const AZURE_API_VERSION: &str = "2023-11-03";

/// Signed version used for SAS tokens.
pub(crate) const SAS_VERSION: &str = "2022-11-02";

/// RFC 1123 timestamp for the `x-ms-date` header.
pub(crate) fn rfc1123(now: &DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn sign(key: &[u8], string_to_sign: &str) -> BackendResult<String> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| BackendError::Signing(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// Request fields covered by a Shared Key signature.
pub(crate) struct SignableRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub content_length: usize,
    pub content_type: &'a str,
    /// Every `x-ms-*` header sent with the request.
    pub ms_headers: &'a [(String, String)],
}

/// Shared Key string-to-sign for a blob service request.
pub(crate) fn shared_key_string(account: &str, request: &SignableRequest<'_>) -> String {
    let content_length = match request.content_length {
        0 => String::new(),
        n => n.to_string(),
    };

    let mut headers: Vec<(String, &str)> = request
        .ms_headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in request.url.query_pairs() {
        params
            .entry(k.to_ascii_lowercase())
            .or_default()
            .push(v.into_owned());
    }
    let mut resource = format!("/{}{}", account, request.url.path());
    for (k, mut values) in params {
        values.sort();
        resource.push_str(&format!("\n{}:{}", k, values.join(",")));
    }

    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        request.method, content_length, request.content_type, canonical_headers, resource
    )
}

/// `Authorization` header value for a request.
pub(crate) fn shared_key_authorization(
    account: &str,
    key: &[u8],
    request: &SignableRequest<'_>,
) -> BackendResult<String> {
    let signature = sign(key, &shared_key_string(account, request))?;
    Ok(format!("SharedKey {}:{}", account, signature))
}

/// Read-only service SAS for a single blob.
pub(crate) struct BlobSas<'a> {
    pub account: &'a str,
    pub container: &'a str,
    pub blob: &'a str,
    pub expiry: DateTime<Utc>,
}

impl<'a> BlobSas<'a> {
    pub fn new(
        account: &'a str,
        container: &'a str,
        blob: &'a str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let expiry = now + chrono::Duration::seconds(ttl.as_secs() as i64);
        Self {
            account,
            container,
            blob,
            expiry,
        }
    }

    fn expiry_str(&self) -> String {
        self.expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    pub(crate) fn string_to_sign(&self) -> String {
        let resource = format!("/blob/{}/{}/{}", self.account, self.container, self.blob);
        let expiry = self.expiry_str();
        [
            "r",              // permissions
            "",               // start
            expiry.as_str(),  // expiry
            resource.as_str(),
            "",               // identifier
            "",               // ip
            "",               // protocol
            SAS_VERSION,
            "b",              // resource type
            "",               // snapshot time
            "",               // encryption scope
            "",               // rscc
            "",               // rscd
            "",               // rsce
            "",               // rscl
            "",               // rsct
        ]
        .join("\n")
    }

    /// Query string granting read access until the expiry.
    pub fn token(&self, key: &[u8]) -> BackendResult<String> {
        let signature = sign(key, &self.string_to_sign())?;
        Ok(format!(
            "sv={}&sr=b&sp=r&se={}&sig={}",
            SAS_VERSION,
            utf8_percent_encode(&self.expiry_str(), NON_ALPHANUMERIC),
            utf8_percent_encode(&signature, NON_ALPHANUMERIC)
        ))
    }
}
