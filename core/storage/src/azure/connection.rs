//! Azure storage connection strings.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use std::collections::HashMap;
use std::fmt;
use url::Url;
use zeroize::Zeroizing;

use cloudgate_common::{Error, Result};

/// Account name used by the local storage emulator.
const EMULATOR_ACCOUNT: &str = "devstoreaccount1";
/// Published account key of the local storage emulator.
const EMULATOR_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const EMULATOR_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Parsed account credentials and blob service endpoint.
pub struct AzureConnection {
    pub account: String,
    pub key: Zeroizing<Vec<u8>>,
    pub blob_endpoint: Url,
}

impl fmt::Debug for AzureConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConnection")
            .field("account", &self.account)
            .field("key", &"[REDACTED]")
            .field("blob_endpoint", &self.blob_endpoint.as_str())
            .finish()
    }
}

impl AzureConnection {
    /// Parse a `Key=Value;Key=Value` connection string.
    ///
    /// Supports `AccountName`, `AccountKey`, `DefaultEndpointsProtocol`,
    /// `EndpointSuffix`, `BlobEndpoint` and `UseDevelopmentStorage=true`.
    ///
    /// # Errors
    /// - `Connection` if the string is malformed or lacks account credentials
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut parts: HashMap<String, String> = HashMap::new();
        for segment in connection_string.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                Error::Connection("Malformed connection string segment".to_string())
            })?;
            parts.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let dev_storage = parts
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let (account, encoded_key) = if dev_storage {
            (EMULATOR_ACCOUNT.to_string(), EMULATOR_KEY.to_string())
        } else {
            let account = parts
                .get("accountname")
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Connection("Connection string has no AccountName".to_string()))?;
            let key = parts
                .get("accountkey")
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Connection("Connection string has no AccountKey".to_string()))?;
            (account.clone(), key.clone())
        };

        let key = BASE64_STANDARD
            .decode(encoded_key.as_bytes())
            .map_err(|_| Error::Connection("AccountKey is not valid base64".to_string()))?;

        let endpoint = match parts.get("blobendpoint") {
            Some(endpoint) => endpoint.clone(),
            None if dev_storage => EMULATOR_BLOB_ENDPOINT.to_string(),
            None => {
                let protocol = parts
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = parts
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                format!("{}://{}.blob.{}", protocol, account, suffix)
            }
        };
        let blob_endpoint = Url::parse(&endpoint)
            .map_err(|e| Error::Connection(format!("Invalid blob endpoint '{}': {}", endpoint, e)))?;

        Ok(Self {
            account,
            key: Zeroizing::new(key),
            blob_endpoint,
        })
    }
}
