//! Common types used throughout CloudGate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroize;

/// Public identifier of a gateway user.
///
/// This is the identifier carried in bearer tokens and used as the first half
/// of every credential-store key. It is never the user's email.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a UserId from an existing string.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "UserId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Generate a fresh random public identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of supported storage backends.
///
/// The wire names (`aws`, `az`, `gcp`) are the values callers send in the
/// `provider` / `cloud_provider` form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderTag {
    /// S3-compatible object storage.
    #[serde(rename = "aws")]
    S3,
    /// Azure Blob Storage.
    #[serde(rename = "az")]
    Azure,
    /// Google Cloud Storage (service account key).
    #[serde(rename = "gcp")]
    Gcs,
}

impl ProviderTag {
    /// All supported tags.
    pub const ALL: [ProviderTag; 3] = [ProviderTag::S3, ProviderTag::Azure, ProviderTag::Gcs];

    /// Wire name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::S3 => "aws",
            ProviderTag::Azure => "az",
            ProviderTag::Gcs => "gcp",
        }
    }

    /// Lifetime of temporary links generated for this backend.
    pub fn link_ttl(&self) -> Duration {
        match self {
            ProviderTag::S3 | ProviderTag::Gcs => Duration::from_secs(300),
            ProviderTag::Azure => Duration::from_secs(600),
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderTag {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" | "s3" => Ok(ProviderTag::S3),
            "az" | "azure" => Ok(ProviderTag::Azure),
            "gcp" | "gcs" => Ok(ProviderTag::Gcs),
            other => Err(crate::Error::Config(format!(
                "Unsupported cloud provider '{}'",
                other
            ))),
        }
    }
}

/// Backend-independent description of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    /// Object name inside the bucket/container.
    pub filename: String,
    /// Bucket or container holding the object.
    pub bucket_name: String,
}

impl BlobDescriptor {
    pub fn new(filename: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            bucket_name: bucket_name.into(),
        }
    }
}

/// Secret string that zeroizes on drop and never prints its value.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, Serialize, Deserialize)]
#[zeroize(drop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty (whitespace counts as empty).
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED; {} chars])", self.0.len())
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_user_id_creation() {
        let id = UserId::new("5f0c").unwrap();
        assert_eq!(id.as_str(), "5f0c");
    }

    #[test]
    fn test_user_id_empty_fails() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
    }

    #[test]
    fn test_user_id_generate_unique() {
        assert_ne!(UserId::generate(), UserId::generate());
    }

    #[test]
    fn test_provider_tag_parse() {
        assert_eq!("aws".parse::<ProviderTag>().unwrap(), ProviderTag::S3);
        assert_eq!("AZ".parse::<ProviderTag>().unwrap(), ProviderTag::Azure);
        assert_eq!("gcp".parse::<ProviderTag>().unwrap(), ProviderTag::Gcs);
        assert!(matches!(
            "dropbox".parse::<ProviderTag>(),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_provider_tag_serde_uses_wire_names() {
        let json = serde_json::to_string(&ProviderTag::Azure).unwrap();
        assert_eq!(json, "\"az\"");
        let tag: ProviderTag = serde_json::from_str("\"gcp\"").unwrap();
        assert_eq!(tag, ProviderTag::Gcs);
    }

    #[test]
    fn test_link_ttl() {
        assert_eq!(ProviderTag::S3.link_ttl(), Duration::from_secs(300));
        assert_eq!(ProviderTag::Azure.link_ttl(), Duration::from_secs(600));
        assert_eq!(ProviderTag::Gcs.link_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_blob_descriptor_serialization() {
        let blob = BlobDescriptor::new("a.txt", "bucket");
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json, serde_json::json!({"filename": "a.txt", "bucket_name": "bucket"}));
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("wJalrXUtnFEMI");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("wJalr"));
        assert!(debug.contains("REDACTED"));
    }

    proptest! {
        #[test]
        fn prop_provider_tag_roundtrips_through_wire_name(idx in 0usize..3) {
            let tag = ProviderTag::ALL[idx];
            prop_assert_eq!(tag.as_str().parse::<ProviderTag>().unwrap(), tag);
        }
    }
}
