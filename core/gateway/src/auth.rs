//! Password hashing and bearer tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Tokens are compact
//! HS256-signed JWTs whose claims carry the user's public id and an expiry.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use cloudgate_common::{Error, Result, Secret, UserId};

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

const SALT_LEN: usize = 16;

/// Hash a password into an Argon2id PHC string.
///
/// # Errors
/// - `InvalidInput` if the password is empty
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }

    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| Error::InvalidInput(format!("Salt encoding failed: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::InvalidInput(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored PHC string.
///
/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub public_id: String,
    /// Expiry as unix seconds.
    pub exp: i64,
}

/// A freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies bearer tokens with a shared secret.
pub struct TokenIssuer {
    secret: Secret,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer.
    ///
    /// # Errors
    /// - `Config` if the secret is blank or the lifetime is not positive
    pub fn new(secret: Secret, ttl: Duration) -> Result<Self> {
        if secret.is_blank() {
            return Err(Error::Config("Token secret cannot be empty".to_string()));
        }
        if ttl <= Duration::zero() {
            return Err(Error::Config("Token lifetime must be positive".to_string()));
        }
        Ok(Self { secret, ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.expose().as_bytes())
            .map_err(|e| Error::Config(format!("Invalid token secret: {}", e)))
    }

    /// Issue a token for a user.
    pub fn issue(&self, user: &UserId) -> Result<IssuedToken> {
        self.issue_at(user, Utc::now())
    }

    pub(crate) fn issue_at(&self, user: &UserId, now: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            public_id: user.as_str().to_string(),
            exp: expires_at.timestamp(),
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(IssuedToken {
            token: format!("{}.{}", signing_input, signature),
            expires_at,
        })
    }

    /// Verify a token and return the user it names.
    ///
    /// # Errors
    /// - `Authentication` if the token is malformed, forged, or expired
    pub fn verify(&self, token: &str) -> Result<UserId> {
        self.verify_at(token, Utc::now())
    }

    pub(crate) fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserId> {
        let invalid = || Error::Authentication("Token is invalid".to_string());

        let mut parts = token.trim().split('.');
        let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(invalid()),
        };

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let header = URL_SAFE_NO_PAD.decode(header).map_err(|_| invalid())?;
        let header: serde_json::Value = serde_json::from_slice(&header).map_err(|_| invalid())?;
        if header.get("alg").and_then(|a| a.as_str()) != Some("HS256") {
            return Err(invalid());
        }

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;

        let expiry = Utc.timestamp_opt(claims.exp, 0).single().ok_or_else(invalid)?;
        if expiry <= now {
            return Err(Error::Authentication("Token has expired".to_string()));
        }

        UserId::new(claims.public_id).map_err(|_| invalid())
    }
}
