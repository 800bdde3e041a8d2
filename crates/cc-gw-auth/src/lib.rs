pub mod error;
pub mod password;
pub mod session;

use cc_gw_core::config::ConfigStore;
use error::{AuthError, Result};
use session::{AdminSession, AdminSessionStore};

/// Facade combining config-stored credentials with the in-memory session
/// table. `login`/`logout` are the only two operations the HTTP surface
/// needs beyond `validate` (exposed via `sessions()` for middleware use).
pub struct WebAuth {
    config: std::sync::Arc<ConfigStore>,
    sessions: AdminSessionStore,
}

impl WebAuth {
    pub fn new(config: std::sync::Arc<ConfigStore>) -> Self {
        Self {
            config,
            sessions: AdminSessionStore::new(),
        }
    }

    pub fn sessions(&self) -> &AdminSessionStore {
        &self.sessions
    }

    pub fn login(&self, username: &str, password: &str) -> Result<AdminSession> {
        let doc = self.config.get();
        let auth = &doc.admin_auth;

        let (Some(expected_user), Some(hash), Some(salt)) =
            (&auth.username, &auth.password_hash, &auth.password_salt)
        else {
            return Err(AuthError::InvalidCredentials);
        };

        // Compare the username too, but don't short-circuit before hashing
        // the password — avoids leaking username validity via timing.
        let user_matches = username == expected_user;
        let pw_matches = password::verify_password(password, hash, salt)?;

        if user_matches && pw_matches {
            Ok(self.sessions.create(username))
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    pub fn logout(&self, token: &str) {
        self.sessions.logout(token);
    }

    pub fn validate(&self, token: &str) -> Option<AdminSession> {
        self.sessions.validate(token)
    }
}
