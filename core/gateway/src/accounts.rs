//! Gateway account signup, login, and token authentication.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use cloudgate_common::{Error, ProviderTag, Result, UserId};

use crate::auth::{hash_password, verify_password, IssuedToken, TokenIssuer};
use crate::store::{normalize_email, UserRecord, UserStore};

/// Fields submitted at signup.
#[derive(Debug, Clone)]
pub struct Signup {
    pub name: String,
    pub email: String,
    pub password: String,
    pub provider: String,
}

/// Account operations over a user store.
pub struct AccountService {
    users: Arc<dyn UserStore>,
    tokens: TokenIssuer,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenIssuer) -> Self {
        Self { users, tokens }
    }

    /// Create an account.
    ///
    /// # Errors
    /// - `InvalidInput` if a field is blank
    /// - `Config` if the provider is not supported
    /// - `AlreadyExists` if the email is already registered
    pub fn signup(&self, signup: &Signup) -> Result<UserRecord> {
        let email = normalize_email(&signup.email);
        if signup.name.trim().is_empty() || email.is_empty() || signup.password.is_empty() {
            return Err(Error::InvalidInput(
                "Name, email and password are required".to_string(),
            ));
        }
        let provider: ProviderTag = signup.provider.parse()?;

        if self.users.find_by_email(&email)?.is_some() {
            return Err(Error::AlreadyExists(format!("User '{}' already exists", email)));
        }

        let user = UserRecord {
            public_id: UserId::generate(),
            name: signup.name.trim().to_string(),
            email,
            password_hash: hash_password(&signup.password)?,
            provider,
            created_at: Utc::now(),
        };
        self.users.create_user(&user)?;

        info!(user = %user.public_id, provider = %provider, "Account created");
        Ok(user)
    }

    /// Exchange email and password for a bearer token.
    ///
    /// # Errors
    /// - `InvalidInput` if email or password is blank
    /// - `Authentication` if no account has this email
    /// - `NotPermitted` if the password is wrong
    pub fn login(&self, email: &str, password: &str) -> Result<IssuedToken> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(Error::InvalidInput(
                "Email and password are required".to_string(),
            ));
        }

        let user = self
            .users
            .find_by_email(email)?
            .ok_or_else(|| Error::Authentication("User does not exist".to_string()))?;

        if !verify_password(password, &user.password_hash) {
            warn!(user = %user.public_id, "Login rejected");
            return Err(Error::NotPermitted("Wrong password".to_string()));
        }

        self.tokens.issue(&user.public_id)
    }

    /// Resolve a bearer token to its account.
    ///
    /// # Errors
    /// - `Authentication` if the token is invalid or its user no longer exists
    pub fn authenticate(&self, token: &str) -> Result<UserRecord> {
        let id = self.tokens.verify(token)?;
        self.users
            .find_by_public_id(&id)?
            .ok_or_else(|| Error::Authentication("Token is invalid".to_string()))
    }
}
