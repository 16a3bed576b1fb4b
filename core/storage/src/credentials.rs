//! Per-user credential records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use cloudgate_common::{Error, ProviderTag, Result, Secret};

/// Default S3 region when the record does not name one.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Stored credentials for one (user, provider) pair.
///
/// Fields are optional because records arrive from forms and storage in
/// whatever shape the caller supplied. A record only becomes a live provider
/// after [`CredentialRecord::validate`] accepts it for its tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Backend this record belongs to.
    pub provider: ProviderTag,
    /// S3 access key id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    /// S3 secret access key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<Secret>,
    /// Azure storage connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<Secret>,
    /// GCS service account key, as the JSON document Google issues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_key: Option<Secret>,
    /// Bucket (S3, GCS) or container (Azure) name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    /// S3 region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl CredentialRecord {
    /// Create an empty record for a provider.
    pub fn empty(provider: ProviderTag) -> Self {
        Self {
            provider,
            access_key: None,
            secret_access_key: None,
            connection_string: None,
            service_account_key: None,
            bucket_name: None,
            region: None,
            endpoint: None,
        }
    }

    /// Record for an S3-compatible backend.
    pub fn s3(
        access_key: impl Into<String>,
        secret_access_key: impl Into<String>,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            access_key: Some(access_key.into()),
            secret_access_key: Some(Secret::new(secret_access_key)),
            bucket_name: Some(bucket_name.into()),
            ..Self::empty(ProviderTag::S3)
        }
    }

    /// Record for an Azure Blob backend.
    pub fn azure(connection_string: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            connection_string: Some(Secret::new(connection_string)),
            bucket_name: Some(container.into()),
            ..Self::empty(ProviderTag::Azure)
        }
    }

    /// Record for a GCS backend authenticated by a service account key.
    pub fn gcs(service_account_key: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            service_account_key: Some(Secret::new(service_account_key)),
            bucket_name: Some(bucket_name.into()),
            ..Self::empty(ProviderTag::Gcs)
        }
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set a custom endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Build a record from submitted form fields.
    ///
    /// Recognised keys: `access_key`, `secret_access_key`, `connection_string`,
    /// `service_account_key`, `bucket_name`, `region`, `endpoint`. Blank values are treated as absent.
    /// The result is not validated.
    pub fn from_fields(provider: ProviderTag, fields: &HashMap<String, String>) -> Self {
        let field = |key: &str| {
            fields
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            provider,
            access_key: field("access_key"),
            secret_access_key: field("secret_access_key").map(Secret::new),
            connection_string: field("connection_string").map(Secret::new),
            service_account_key: field("service_account_key").map(Secret::new),
            bucket_name: field("bucket_name"),
            region: field("region"),
            endpoint: field("endpoint"),
        }
    }

    /// Names of the fields a record must carry for `tag`.
    pub fn required_fields(tag: ProviderTag) -> &'static [&'static str] {
        match tag {
            ProviderTag::S3 => &["access_key", "secret_access_key", "bucket_name"],
            ProviderTag::Azure => &["connection_string", "bucket_name"],
            ProviderTag::Gcs => &["service_account_key", "bucket_name"],
        }
    }

    /// Names of required fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        Self::required_fields(self.provider)
            .iter()
            .copied()
            .filter(|name| !self.has_field(name))
            .collect()
    }

    fn has_field(&self, name: &str) -> bool {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }
        fn present_secret(value: &Option<Secret>) -> bool {
            value.as_ref().is_some_and(|v| !v.is_blank())
        }

        match name {
            "access_key" => present(&self.access_key),
            "secret_access_key" => present_secret(&self.secret_access_key),
            "connection_string" => present_secret(&self.connection_string),
            "service_account_key" => present_secret(&self.service_account_key),
            "bucket_name" => present(&self.bucket_name),
            "region" => present(&self.region),
            "endpoint" => present(&self.endpoint),
            _ => false,
        }
    }

    /// Check that every field required by the record's tag is present.
    ///
    /// # Errors
    /// - `Config` naming the missing fields
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Required parameter missing for '{}': {}",
                self.provider,
                missing.join(", ")
            )))
        }
    }

    /// Validated bucket/container name.
    pub fn bucket(&self) -> Result<&str> {
        required(self.bucket_name.as_deref(), "bucket_name")
    }

    /// Validated access key.
    pub fn access_key(&self) -> Result<&str> {
        required(self.access_key.as_deref(), "access_key")
    }

    /// Validated secret key.
    pub fn secret_key(&self) -> Result<&Secret> {
        self.secret_access_key
            .as_ref()
            .filter(|s| !s.is_blank())
            .ok_or_else(|| Error::Config("Required parameter missing: secret_access_key".to_string()))
    }

    /// Validated connection string.
    pub fn connection(&self) -> Result<&Secret> {
        self.connection_string
            .as_ref()
            .filter(|s| !s.is_blank())
            .ok_or_else(|| Error::Config("Required parameter missing: connection_string".to_string()))
    }

    /// Validated service account key.
    pub fn service_account(&self) -> Result<&Secret> {
        self.service_account_key
            .as_ref()
            .filter(|s| !s.is_blank())
            .ok_or_else(|| Error::Config("Required parameter missing: service_account_key".to_string()))
    }

    /// Region, falling back to the S3 default.
    pub fn region_or_default(&self) -> &str {
        self.region
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_S3_REGION)
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("Required parameter missing: {}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_complete_records_validate() {
        assert!(CredentialRecord::s3("AKIA", "secret", "bucket").validate().is_ok());
        assert!(CredentialRecord::gcs(r#"{"client_email":"a@b"}"#, "bucket").validate().is_ok());
        assert!(CredentialRecord::azure("AccountName=a;AccountKey=b", "container")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_missing_fields_per_tag() {
        for tag in ProviderTag::ALL {
            for &missing in CredentialRecord::required_fields(tag) {
                let pairs: Vec<(&str, &str)> = CredentialRecord::required_fields(tag)
                    .iter()
                    .filter(|&&f| f != missing)
                    .map(|&f| (f, "value"))
                    .collect();
                let record = CredentialRecord::from_fields(tag, &fields(&pairs));

                let err = record.validate().unwrap_err();
                assert!(matches!(err, Error::Config(_)), "{tag}: {missing}");
                assert!(err.to_string().contains(missing));
            }
        }
    }

    #[test]
    fn test_blank_values_are_missing() {
        let record = CredentialRecord::from_fields(
            ProviderTag::S3,
            &fields(&[
                ("access_key", "AKIA"),
                ("secret_access_key", "   "),
                ("bucket_name", "bucket"),
            ]),
        );
        assert_eq!(record.missing_fields(), vec!["secret_access_key"]);
    }

    #[test]
    fn test_from_fields_ignores_unrelated_keys() {
        let record = CredentialRecord::from_fields(
            ProviderTag::Azure,
            &fields(&[
                ("connection_string", "AccountName=a;AccountKey=b"),
                ("bucket_name", "docs"),
                ("provider", "az"),
            ]),
        );
        assert_eq!(record.bucket().unwrap(), "docs");
        assert!(record.access_key.is_none());
    }

    #[test]
    fn test_gcs_needs_service_account_key() {
        let record = CredentialRecord::from_fields(
            ProviderTag::Gcs,
            &fields(&[
                ("access_key", "GOOG1"),
                ("secret_access_key", "hmac"),
                ("bucket_name", "assets"),
            ]),
        );
        assert_eq!(record.missing_fields(), vec!["service_account_key"]);
        assert!(matches!(record.service_account(), Err(Error::Config(_))));
    }

    #[test]
    fn test_region_default() {
        let record = CredentialRecord::s3("a", "b", "c");
        assert_eq!(record.region_or_default(), DEFAULT_S3_REGION);
        let record = record.with_region("eu-west-1");
        assert_eq!(record.region_or_default(), "eu-west-1");
    }

    #[test]
    fn test_serialization_skips_absent_fields() {
        let record = CredentialRecord::s3("AKIA", "secret", "bucket");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["provider"], "aws");
        assert_eq!(json["secret_access_key"], "secret");
        assert!(json.get("connection_string").is_none());

        let restored: CredentialRecord = serde_json::from_value(json).unwrap();
        assert_eq!(restored, record);
    }
}
