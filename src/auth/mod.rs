//! Credential checks, session tokens, and identity resolution.
//!
//! Passwords are stored as bcrypt hashes; plaintext never touches the
//! database. Sessions are opaque hex tokens resolved on every request.

mod token;

pub use token::generate_session_token;

use anyhow::Context;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{AdminBootstrap, AuthSettings};
use crate::db::Database;
use crate::error::ApiError;
use crate::rewards::streaks::current_day_bucket;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Identity resolved from a bearer token.
#[derive(Debug, Clone, Copy)]
pub struct SessionUser {
    pub user_id: i64,
    pub is_admin: bool,
}

/// Public view of a user account.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub xp: i64,
    pub level: i64,
    pub streak: i64,
    pub total_words_learned: i64,
    pub total_quizzes_taken: i64,
    pub perfect_scores: i64,
}

/// A freshly issued session plus the profile it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct AuthOutcome {
    pub access_token: String,
    pub user: UserProfile,
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(db: Database, settings: AuthSettings) -> Self {
        Self { db, settings }
    }

    /// Register a new account. Creates the user, its virtual pet, and a
    /// session in one transaction.
    pub fn register(
        &self,
        username: &str,
        password: Option<&str>,
        email: Option<&str>,
    ) -> Result<AuthOutcome, ApiError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ApiError::bad_request("Username is required"));
        }

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT id FROM users WHERE username = ?1", [username], |r| r.get(0))
            .optional()?;
        if exists.is_some() {
            return Err(ApiError::bad_request("Username already exists"));
        }

        let user_id = self.create_user(&tx, username, password, email.unwrap_or(""), false)?;
        let access_token = self.issue_session(&tx, user_id)?;
        let user = profile_row(&tx, user_id)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        tx.commit()?;
        info!("Registered user '{}' (id {})", username, user_id);

        Ok(AuthOutcome { access_token, user })
    }

    /// Log in with username and password, issuing a fresh session.
    ///
    /// Unknown usernames are auto-provisioned when the config allows it;
    /// that path is logged loudly because it is demo behavior, not auth.
    pub fn login(&self, username: &str, password: Option<&str>) -> Result<AuthOutcome, ApiError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ApiError::bad_request("Username is required"));
        }

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let row: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, password_hash FROM users WHERE username = ?1",
                [username],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let user_id = match row {
            Some((id, hash)) => {
                let presented = password.unwrap_or(&self.settings.default_password);
                let ok = bcrypt::verify(presented, &hash)
                    .context("Failed to verify password hash")?;
                if !ok {
                    return Err(ApiError::unauthorized("Invalid credentials"));
                }
                id
            }
            None if self.settings.auto_provision => {
                warn!("Auto-provisioning account for unknown username '{}'", username);
                self.create_user(&tx, username, password, "", false)?
            }
            None => return Err(ApiError::unauthorized("Invalid credentials")),
        };

        tx.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            rusqlite::params![Utc::now().timestamp_millis(), user_id],
        )?;

        let access_token = self.issue_session(&tx, user_id)?;
        let user = profile_row(&tx, user_id)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        tx.commit()?;
        Ok(AuthOutcome { access_token, user })
    }

    /// Drop the presented session. Unknown tokens are a no-op.
    pub fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.db
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", [token])?;
        Ok(())
    }

    /// Resolve a bearer token to an identity. Expired sessions are deleted
    /// on sight and resolve to `None`.
    pub fn resolve(&self, token: &str) -> Result<Option<SessionUser>, ApiError> {
        let conn = self.db.conn();

        let row: Option<(i64, bool, Option<i64>)> = conn
            .query_row(
                r#"SELECT s.user_id, u.is_admin, s.expires_at
                   FROM sessions s JOIN users u ON u.id = s.user_id
                   WHERE s.token = ?1"#,
                [token],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        let Some((user_id, is_admin, expires_at)) = row else {
            return Ok(None);
        };

        if let Some(expires_at) = expires_at {
            if expires_at < Utc::now().timestamp_millis() {
                conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
                return Ok(None);
            }
        }

        Ok(Some(SessionUser { user_id, is_admin }))
    }

    /// Fetch the public profile for a user id.
    pub fn profile(&self, user_id: i64) -> Result<Option<UserProfile>, ApiError> {
        profile_row(&self.db.conn(), user_id)
    }

    /// Create or promote the configured admin account at startup.
    ///
    /// An existing account keeps its password; only the role flag is set.
    pub fn ensure_admin(&self, bootstrap: &AdminBootstrap) -> Result<(), ApiError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                [bootstrap.username.as_str()],
                |r| r.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                tx.execute("UPDATE users SET is_admin = 1 WHERE id = ?1", [id])?;
            }
            None => {
                let id = self.create_user(
                    &tx,
                    &bootstrap.username,
                    Some(&bootstrap.password),
                    &bootstrap.email,
                    true,
                )?;
                info!("Bootstrapped admin '{}' (id {})", bootstrap.username, id);
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Insert a user row and its virtual pet. Caller owns the transaction.
    fn create_user(
        &self,
        conn: &Connection,
        username: &str,
        password: Option<&str>,
        email: &str,
        is_admin: bool,
    ) -> Result<i64, ApiError> {
        let password = password.unwrap_or(&self.settings.default_password);
        let hash = bcrypt::hash(password, self.settings.bcrypt_cost)
            .context("Failed to hash password")?;

        let now = Utc::now().timestamp_millis();
        conn.execute(
            r#"INSERT INTO users (username, email, password_hash, is_admin, created_at, day_bucket)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            rusqlite::params![username, email, hash, is_admin, now, current_day_bucket()],
        )?;
        let user_id = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO virtual_pets (user_id, last_fed) VALUES (?1, ?2)",
            rusqlite::params![user_id, now],
        )?;

        Ok(user_id)
    }

    /// Insert a session row for the user. Caller owns the transaction.
    fn issue_session(&self, conn: &Connection, user_id: i64) -> Result<String, ApiError> {
        let token = generate_session_token();
        let now = Utc::now().timestamp_millis();
        let expires_at = if self.settings.token_ttl_days > 0 {
            Some(now + self.settings.token_ttl_days * MS_PER_DAY)
        } else {
            None
        };

        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![token, user_id, now, expires_at],
        )?;
        Ok(token)
    }
}

fn profile_row(conn: &Connection, user_id: i64) -> Result<Option<UserProfile>, ApiError> {
    let profile = conn
        .query_row(
            r#"SELECT id, username, email, is_admin, xp, level,
                      COALESCE(streak, 0), total_words_learned,
                      total_quizzes_taken, perfect_scores
               FROM users WHERE id = ?1"#,
            [user_id],
            |r| {
                Ok(UserProfile {
                    id: r.get(0)?,
                    username: r.get(1)?,
                    email: r.get(2)?,
                    is_admin: r.get(3)?,
                    xp: r.get(4)?,
                    level: r.get(5)?,
                    streak: r.get(6)?,
                    total_words_learned: r.get(7)?,
                    total_quizzes_taken: r.get(8)?,
                    perfect_scores: r.get(9)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthSettings;
    use tempfile::tempdir;

    fn service(auto_provision: bool) -> (AuthService, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        let settings = AuthSettings {
            // Low cost keeps the tests fast; production uses the default.
            bcrypt_cost: 4,
            auto_provision,
            ..AuthSettings::default()
        };
        (AuthService::new(db, settings), dir)
    }

    #[test]
    fn test_register_then_login_resolves_same_identity() {
        let (auth, _dir) = service(false);

        let registered = auth.register("amy", Some("hunter2"), None).unwrap();
        let logged_in = auth.login("amy", Some("hunter2")).unwrap();
        assert_eq!(registered.user.id, logged_in.user.id);

        let session = auth.resolve(&logged_in.access_token).unwrap().unwrap();
        assert_eq!(session.user_id, registered.user.id);
        assert!(!session.is_admin);
    }

    #[test]
    fn test_duplicate_register_creates_no_row() {
        let (auth, _dir) = service(false);
        auth.register("amy", None, None).unwrap();

        let err = auth.register("amy", None, None).unwrap_err();
        assert_eq!(err.status(), 400);

        let count: i64 = auth
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM users WHERE username = 'amy'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_wrong_password_rejected() {
        let (auth, _dir) = service(false);
        auth.register("amy", Some("hunter2"), None).unwrap();

        let err = auth.login("amy", Some("wrong")).unwrap_err();
        assert_eq!(err.status(), 401);
    }

    #[test]
    fn test_unknown_user_rejected_without_auto_provision() {
        let (auth, _dir) = service(false);
        let err = auth.login("ghost", Some("whatever")).unwrap_err();
        assert_eq!(err.status(), 401);
    }

    #[test]
    fn test_unknown_user_provisioned_when_enabled() {
        let (auth, _dir) = service(true);
        let outcome = auth.login("newcomer", None).unwrap();
        assert_eq!(outcome.user.username, "newcomer");

        // The provisioned account has a pet, same as a registered one.
        let pets: i64 = auth
            .db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM virtual_pets WHERE user_id = ?1",
                [outcome.user.id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(pets, 1);
    }

    #[test]
    fn test_logout_invalidates_session() {
        let (auth, _dir) = service(false);
        let outcome = auth.register("amy", None, None).unwrap();

        auth.logout(&outcome.access_token).unwrap();
        assert!(auth.resolve(&outcome.access_token).unwrap().is_none());
    }

    #[test]
    fn test_expired_session_rejected_and_reaped() {
        let (auth, _dir) = service(false);
        let outcome = auth.register("amy", None, None).unwrap();

        // Backdate the expiry.
        auth.db
            .conn()
            .execute(
                "UPDATE sessions SET expires_at = 1 WHERE token = ?1",
                [outcome.access_token.as_str()],
            )
            .unwrap();

        assert!(auth.resolve(&outcome.access_token).unwrap().is_none());
        let remaining: i64 = auth
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
