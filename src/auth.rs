//! Accounts and sessions.
//!
//! Passwords are kept only as Argon2id PHC strings. Session tokens are random
//! UUIDs handed to the caller once; the store keeps only their SHA-256 digest.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{ServiceError, is_unique_violation};
use crate::models::Identity;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// A freshly issued session. `token` is not recoverable from the store.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub identity: Identity,
}

impl Registration {
    fn validated(self) -> Result<Self, ServiceError> {
        let full_name = self.full_name.trim().to_string();
        let email = self.email.trim().to_string();
        if full_name.is_empty() {
            return Err(ServiceError::Validation("full name must not be empty".to_string()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::Validation("email must be a valid address".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(Self {
            full_name,
            email,
            password: self.password,
        })
    }
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Fatal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

impl Database {
    /// Create an account and sign it in
    pub fn register(
        &mut self,
        registration: Registration,
        session_ttl: Duration,
    ) -> Result<AuthSession, ServiceError> {
        let registration = registration.validated()?;
        let password_hash = hash_password(&registration.password)?;
        let now = Utc::now();

        let session = self.write(|tx| {
            let identity = insert_account(tx, &registration, &password_hash, now)?;
            issue_session(tx, identity, now, session_ttl)
        })?;

        tracing::info!(user_id = session.identity.user_id, "user registered");
        Ok(session)
    }

    /// Create an account without signing it in
    pub(crate) fn create_account(&mut self, registration: Registration) -> Result<Identity, ServiceError> {
        let registration = registration.validated()?;
        let password_hash = hash_password(&registration.password)?;
        let now = Utc::now();

        let identity = self.write(|tx| insert_account(tx, &registration, &password_hash, now))?;
        tracing::info!(user_id = identity.user_id, "account created");
        Ok(identity)
    }

    /// Exchange credentials for a session token.
    ///
    /// Unknown email and wrong password are reported identically. The password
    /// is checked before the write lock is taken.
    pub fn authenticate(
        &mut self,
        credentials: Credentials,
        session_ttl: Duration,
    ) -> Result<AuthSession, ServiceError> {
        const REJECTED: &str = "invalid email or password";
        let email = credentials.email.trim();

        let account: Option<(i64, String, String)> = self
            .conn()
            .query_row(
                "SELECT id, full_name, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((user_id, full_name, password_hash)) = account else {
            return Err(ServiceError::Unauthenticated(REJECTED));
        };
        if !verify_password(&credentials.password, &password_hash) {
            tracing::debug!(user_id, "password rejected");
            return Err(ServiceError::Unauthenticated(REJECTED));
        }

        let identity = Identity {
            user_id,
            email: email.to_string(),
            full_name,
        };
        let now = Utc::now();
        let session = self.write(|tx| issue_session(tx, identity, now, session_ttl))?;

        tracing::info!(user_id = session.identity.user_id, "user signed in");
        Ok(session)
    }

    /// Resolve a bearer token to the identity it was issued for
    pub fn resolve_identity(&self, token: &str) -> Result<Identity, ServiceError> {
        const REJECTED: &str = "invalid or expired token";

        let found: Option<(Identity, DateTime<Utc>)> = self
            .conn()
            .query_row(
                "SELECT u.id, u.email, u.full_name, s.expires_at
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1",
                params![token_digest(token.trim())],
                |row| {
                    Ok((
                        Identity {
                            user_id: row.get(0)?,
                            email: row.get(1)?,
                            full_name: row.get(2)?,
                        },
                        row.get(3)?,
                    ))
                },
            )
            .optional()?;

        match found {
            Some((identity, expires_at)) if expires_at > Utc::now() => Ok(identity),
            Some((identity, _)) => {
                tracing::debug!(user_id = identity.user_id, "session expired");
                Err(ServiceError::Unauthenticated(REJECTED))
            }
            None => Err(ServiceError::Unauthenticated(REJECTED)),
        }
    }

    /// Revoke a session token. Unknown tokens are ignored.
    pub fn logout(&mut self, token: &str) -> Result<(), ServiceError> {
        let digest = token_digest(token.trim());
        self.write(|tx| {
            tx.execute("DELETE FROM sessions WHERE token_hash = ?1", params![digest])?;
            prune_expired_sessions(tx, Utc::now())
        })
    }

    /// Whether an account with this email exists
    pub fn user_exists(&self, email: &str) -> Result<bool, ServiceError> {
        let exists = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![email.trim()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

fn insert_account(
    tx: &rusqlite::Transaction<'_>,
    registration: &Registration,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<Identity, ServiceError> {
    let taken: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        params![registration.email],
        |row| row.get(0),
    )?;
    if taken {
        return Err(ServiceError::Conflict("email already exists".to_string()));
    }

    tx.execute(
        "INSERT INTO users (full_name, email, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![registration.full_name, registration.email, password_hash, now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            ServiceError::Conflict("email already exists".to_string())
        } else {
            e.into()
        }
    })?;

    Ok(Identity {
        user_id: tx.last_insert_rowid(),
        email: registration.email.clone(),
        full_name: registration.full_name.clone(),
    })
}

fn prune_expired_sessions(tx: &rusqlite::Transaction<'_>, now: DateTime<Utc>) -> Result<(), ServiceError> {
    let pruned = tx.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
    if pruned > 0 {
        tracing::debug!(pruned, "expired sessions removed");
    }
    Ok(())
}

fn issue_session(
    tx: &rusqlite::Transaction<'_>,
    identity: Identity,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<AuthSession, ServiceError> {
    prune_expired_sessions(tx, now)?;

    let token = Uuid::new_v4().simple().to_string();
    let expires_at = now + ttl;
    tx.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token_digest(&token), identity.user_id, now, expires_at],
    )?;
    Ok(AuthSession {
        token,
        expires_at,
        identity,
    })
}
