//! User and credential persistence.
//!
//! Two seams: [`CredentialStore`] maps (user, provider) to a credential
//! record, [`UserStore`] holds gateway accounts. Both are implemented by an
//! in-memory map and by SQLite.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};
use tracing::{debug, info};

use cloudgate_common::{Error, ProviderTag, Result, UserId};
use cloudgate_storage::CredentialRecord;

/// A gateway account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub public_id: UserId,
    pub name: String,
    /// Normalized (trimmed, lowercase) email.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Provider chosen at signup.
    pub provider: ProviderTag,
    pub created_at: DateTime<Utc>,
}

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Per-user credential lookup.
pub trait CredentialStore: Send + Sync {
    /// Record for (user, provider), if registered.
    fn get(&self, user: &UserId, provider: ProviderTag) -> Result<Option<CredentialRecord>>;

    /// Providers the user has registered credentials for.
    fn providers(&self, user: &UserId) -> Result<Vec<ProviderTag>>;

    /// Insert or replace the record for (user, record.provider).
    fn upsert(&self, user: &UserId, record: &CredentialRecord) -> Result<()>;
}

/// Account storage.
pub trait UserStore: Send + Sync {
    /// Create an account.
    ///
    /// # Errors
    /// - `AlreadyExists` if the email is taken
    fn create_user(&self, user: &UserRecord) -> Result<()>;

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    fn find_by_public_id(&self, id: &UserId) -> Result<Option<UserRecord>>;
}

fn poisoned() -> Error {
    Error::Database("Store lock poisoned".to_string())
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    credentials: RwLock<HashMap<(UserId, ProviderTag), CredentialRecord>>,
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, user: &UserId, provider: ProviderTag) -> Result<Option<CredentialRecord>> {
        let credentials = self.credentials.read().map_err(|_| poisoned())?;
        Ok(credentials.get(&(user.clone(), provider)).cloned())
    }

    fn providers(&self, user: &UserId) -> Result<Vec<ProviderTag>> {
        let credentials = self.credentials.read().map_err(|_| poisoned())?;
        let mut tags: Vec<_> = credentials
            .keys()
            .filter(|(owner, _)| owner == user)
            .map(|(_, tag)| *tag)
            .collect();
        tags.sort();
        Ok(tags)
    }

    fn upsert(&self, user: &UserId, record: &CredentialRecord) -> Result<()> {
        let mut credentials = self.credentials.write().map_err(|_| poisoned())?;
        credentials.insert((user.clone(), record.provider), record.clone());
        Ok(())
    }
}

impl UserStore for MemoryStore {
    fn create_user(&self, user: &UserRecord) -> Result<()> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users.values().any(|u| u.email == user.email) {
            return Err(Error::AlreadyExists(format!(
                "User '{}' already exists",
                user.email
            )));
        }
        users.insert(user.public_id.clone(), user.clone());
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = normalize_email(email);
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    fn find_by_public_id(&self, id: &UserId) -> Result<Option<UserRecord>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(id).cloned())
    }
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

impl SqliteStore {
    /// Create or open a store database.
    ///
    /// # Errors
    /// - Database creation or migration failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).map_err(db_err)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                public_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                provider TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS credentials (
                public_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                record TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (public_id, provider)
            );
            "#,
        )
        .map_err(db_err)?;

        info!(path = %db_path.as_ref().display(), "Store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        f(&conn).map_err(db_err)
    }
}

fn parse_tag(value: String) -> rusqlite::Result<ProviderTag> {
    value.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let public_id: String = row.get(0)?;
    let created_at: i64 = row.get(5)?;
    Ok(UserRecord {
        public_id: UserId::new(public_id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        provider: parse_tag(row.get(4)?)?,
        created_at: Utc.timestamp_opt(created_at, 0).single().unwrap_or_default(),
    })
}

const USER_COLUMNS: &str = "public_id, name, email, password_hash, provider, created_at";

impl CredentialStore for SqliteStore {
    fn get(&self, user: &UserId, provider: ProviderTag) -> Result<Option<CredentialRecord>> {
        let json: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT record FROM credentials WHERE public_id = ?1 AND provider = ?2",
                params![user.as_str(), provider.as_str()],
                |row| row.get(0),
            )
            .optional()
        })?;

        json.map(|j| serde_json::from_str(&j).map_err(Error::from))
            .transpose()
    }

    fn providers(&self, user: &UserId) -> Result<Vec<ProviderTag>> {
        let names: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT provider FROM credentials WHERE public_id = ?1 ORDER BY provider")?;
            let rows = stmt.query_map([user.as_str()], |row| row.get(0))?;
            rows.collect()
        })?;

        let mut tags = names
            .into_iter()
            .map(|n| n.parse())
            .collect::<Result<Vec<ProviderTag>>>()?;
        tags.sort();
        Ok(tags)
    }

    fn upsert(&self, user: &UserId, record: &CredentialRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        debug!(user = %user, provider = %record.provider, "Upserting credentials");
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO credentials (public_id, provider, record, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (public_id, provider)
                DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at
                "#,
                params![
                    user.as_str(),
                    record.provider.as_str(),
                    json,
                    Utc::now().timestamp()
                ],
            )
            .map(|_| ())
        })
    }
}

impl UserStore for SqliteStore {
    fn create_user(&self, user: &UserRecord) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;

        let taken: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                [&user.email],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        if taken {
            return Err(Error::AlreadyExists(format!(
                "User '{}' already exists",
                user.email
            )));
        }

        conn.execute(
            &format!("INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)", USER_COLUMNS),
            params![
                user.public_id.as_str(),
                user.name,
                user.email,
                user.password_hash,
                user.provider.as_str(),
                user.created_at.timestamp()
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = normalize_email(email);
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                [&email],
                user_from_row,
            )
            .optional()
        })
    }

    fn find_by_public_id(&self, id: &UserId) -> Result<Option<UserRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE public_id = ?1", USER_COLUMNS),
                [id.as_str()],
                user_from_row,
            )
            .optional()
        })
    }
}
