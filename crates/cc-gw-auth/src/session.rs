use std::time::Duration as StdDuration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use base64::Engine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;

pub const SESSION_TTL: chrono::Duration = chrono::Duration::hours(12);
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, serde::Serialize)]
pub struct AdminSession {
    #[serde(skip)]
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

fn generate_token() -> String {
    let mut raw = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut raw);
    B64URL.encode(raw)
}

/// In-memory admin session table, keyed by a 256-bit base64url token with
/// a 12-hour sliding TTL. A purge pass runs on every access (spec §4.5).
/// Grounded on `SessionManager`'s single-guarded-table shape, generalized
/// from a persisted SQLite table to an in-memory `DashMap` since admin
/// sessions are explicitly not durable.
pub struct AdminSessionStore {
    sessions: DashMap<String, AdminSession>,
}

impl Default for AdminSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminSessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Mint a new session for `username` and return its token + record.
    pub fn create(&self, username: &str) -> AdminSession {
        self.purge();
        let token = generate_token();
        let session = AdminSession {
            token: token.clone(),
            username: username.to_string(),
            expires_at: Utc::now() + SESSION_TTL,
        };
        self.sessions.insert(token, session.clone());
        session
    }

    /// Validate `token`, sliding its expiry forward on success. Returns
    /// `None` if absent or expired (and evicts it in that case).
    pub fn validate(&self, token: &str) -> Option<AdminSession> {
        self.purge();
        let mut entry = self.sessions.get_mut(token)?;
        if entry.expires_at < Utc::now() {
            drop(entry);
            self.sessions.remove(token);
            return None;
        }
        entry.expires_at = Utc::now() + SESSION_TTL;
        Some(entry.clone())
    }

    /// Revoke the exact token.
    pub fn logout(&self, token: &str) {
        self.sessions.remove(token);
    }

    fn purge(&self) {
        let now = Utc::now();
        self.sessions.retain(|_, s| s.expires_at >= now);
    }
}

/// Build the `Set-Cookie` header value for an admin session token:
/// HttpOnly + SameSite=Strict + Path=/, matching spec §4.5 exactly.
pub fn session_cookie(token: &str) -> axum_extra::extract::cookie::Cookie<'static> {
    axum_extra::extract::cookie::Cookie::build(("cc_gw_session", token.to_string()))
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Strict)
        .path("/")
        .max_age(cookie_max_age())
        .build()
}

fn cookie_max_age() -> time::Duration {
    time::Duration::try_from(StdDuration::from_secs(12 * 60 * 60))
        .expect("12h fits in a time::Duration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_validate_succeeds() {
        let store = AdminSessionStore::new();
        let session = store.create("admin");
        let validated = store.validate(&session.token).unwrap();
        assert_eq!(validated.username, "admin");
    }

    #[test]
    fn logout_revokes_exact_token() {
        let store = AdminSessionStore::new();
        let session = store.create("admin");
        store.logout(&session.token);
        assert!(store.validate(&session.token).is_none());
    }

    #[test]
    fn expired_session_rejected() {
        let store = AdminSessionStore::new();
        let token = generate_token();
        store.sessions.insert(
            token.clone(),
            AdminSession {
                token: token.clone(),
                username: "admin".to_string(),
                expires_at: Utc::now() - chrono::Duration::seconds(1),
            },
        );
        assert!(store.validate(&token).is_none());
    }

    #[test]
    fn validate_slides_expiry_forward() {
        let store = AdminSessionStore::new();
        let session = store.create("admin");
        let first_expiry = session.expires_at;
        std::thread::sleep(std::time::Duration::from_millis(10));
        let validated = store.validate(&session.token).unwrap();
        assert!(validated.expires_at > first_expiry);
    }
}
