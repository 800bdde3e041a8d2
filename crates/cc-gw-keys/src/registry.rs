use std::sync::Arc;

use cc_gw_core::secret::SecretVault;
use cc_gw_store::keys::ApiKeyRow;
use cc_gw_store::GatewayDb;
use sha2::{Digest, Sha256};

use crate::error::{KeysError, Result};

const SECRET_PREFIX: &str = "sk-gw-";
const SECRET_BYTES: usize = 32;

/// A freshly minted key. `plaintext` is shown exactly once — to the caller
/// of `create`, in this struct's own response body.
pub struct NewApiKey {
    pub id: String,
    pub plaintext: String,
}

/// Masked view returned by `list()` — never the plaintext or ciphertext.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MaskedKeyView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub is_wildcard: bool,
    pub enabled: bool,
    pub allowed_endpoints: Option<Vec<String>>,
    pub usage_count: i64,
    pub last_used_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ApiKeyRow> for MaskedKeyView {
    fn from(r: ApiKeyRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            prefix: r.prefix,
            suffix: r.suffix,
            is_wildcard: r.is_wildcard,
            enabled: r.enabled,
            allowed_endpoints: r.allowed_endpoints,
            usage_count: r.usage_count,
            last_used_at: r.last_used_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Mint/lookup/revoke gateway API keys. Holds a shared handle to the
/// same `gateway.db` connection the Event/Log Store writes to (spec §5:
/// "one connection with an internal write serializer").
pub struct KeyRegistry {
    db: Arc<GatewayDb>,
    vault: &'static SecretVault,
}

impl KeyRegistry {
    pub fn new(db: Arc<GatewayDb>) -> Self {
        Self {
            db,
            vault: cc_gw_core::secret::global(),
        }
    }

    /// Generate a new 256-bit secret, store its SHA-256 hash and an
    /// encrypted copy (for masked display), and audit the creation.
    pub fn create(
        &self,
        name: &str,
        description: Option<&str>,
        endpoint_scopes: Option<Vec<String>>,
    ) -> Result<NewApiKey> {
        let mut raw = [0u8; SECRET_BYTES];
        use rand::RngCore;
        rand::rng().fill_bytes(&mut raw);
        let plaintext = format!("{SECRET_PREFIX}{}", hex::encode(raw));

        let hash = hash_secret(&plaintext);
        let ciphertext = self.vault.encrypt(plaintext.as_bytes());
        let id = uuid::Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let suffix = plaintext.chars().rev().take(4).collect::<String>();
        let suffix: String = suffix.chars().rev().collect();

        let row = ApiKeyRow {
            id: id.clone(),
            name: name.to_string(),
            description: description.map(str::to_string),
            secret_hash: hash,
            secret_ciphertext: Some(ciphertext),
            prefix: Some(SECRET_PREFIX.to_string()),
            suffix: Some(suffix),
            is_wildcard: false,
            enabled: true,
            allowed_endpoints: endpoint_scopes,
            usage_count: 0,
            last_used_at: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.db.insert_key(&row)?;
        self.db.insert_key_audit_log(Some(&id), "create", None)?;

        Ok(NewApiKey { id, plaintext })
    }

    /// Verify a presented bearer secret for `endpoint_family`. Exact-hash
    /// matches win over the wildcard row; a named-but-disabled key is
    /// `Denied`, never silently falls through to the wildcard (spec §9).
    pub fn verify(&self, presented_secret: &str, endpoint_family: &str) -> Result<ApiKeyRow> {
        let hash = hash_secret(presented_secret);

        if let Some(row) = self.db.find_key_by_hash(&hash)? {
            if !row.enabled {
                return Err(KeysError::Denied);
            }
            if let Some(ref allowed) = row.allowed_endpoints {
                if !allowed.iter().any(|e| e == endpoint_family) {
                    return Err(KeysError::Denied);
                }
            }
            let _ = self.db.record_key_usage(&row.id);
            return Ok(row);
        }

        let wildcard = self
            .db
            .find_key_by_hash("*")?
            .ok_or(KeysError::Denied)?;
        if !wildcard.enabled {
            return Err(KeysError::Denied);
        }
        let _ = self.db.record_key_usage(&wildcard.id);
        Ok(wildcard)
    }

    pub fn revoke(&self, id: &str) -> Result<()> {
        if self.db.find_key_by_id(id)?.is_none() {
            return Err(KeysError::NotFound(id.to_string()));
        }
        self.db.delete_key(id)?;
        self.db.insert_key_audit_log(Some(id), "revoke", None)?;
        Ok(())
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        if self.db.find_key_by_id(id)?.is_none() {
            return Err(KeysError::NotFound(id.to_string()));
        }
        self.db.set_key_enabled(id, enabled)?;
        let action = if enabled { "enable" } else { "disable" };
        self.db.insert_key_audit_log(Some(id), action, None)?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<MaskedKeyView>> {
        Ok(self
            .db
            .list_keys()?
            .into_iter()
            .map(MaskedKeyView::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> KeyRegistry {
        let db = Arc::new(GatewayDb::open_in_memory().unwrap());
        KeyRegistry::new(db)
    }

    #[test]
    fn create_then_verify_succeeds() {
        let reg = registry();
        let created = reg.create("test", None, None).unwrap();
        assert!(created.plaintext.starts_with(SECRET_PREFIX));

        let row = reg.verify(&created.plaintext, "anthropic").unwrap();
        assert_eq!(row.id, created.id);
    }

    #[test]
    fn unknown_secret_falls_back_to_wildcard() {
        let reg = registry();
        let row = reg.verify("sk-gw-does-not-exist", "anthropic").unwrap();
        assert!(row.is_wildcard);
    }

    #[test]
    fn disabled_named_key_denied_not_wildcard() {
        let reg = registry();
        let created = reg.create("test", None, None).unwrap();
        reg.set_enabled(&created.id, false).unwrap();

        let result = reg.verify(&created.plaintext, "anthropic");
        assert!(matches!(result, Err(KeysError::Denied)));
    }

    #[test]
    fn scoped_key_denied_outside_allowed_endpoints() {
        let reg = registry();
        let created = reg
            .create("scoped", None, Some(vec!["anthropic".to_string()]))
            .unwrap();

        assert!(reg.verify(&created.plaintext, "anthropic").is_ok());
        assert!(matches!(
            reg.verify(&created.plaintext, "openai-chat"),
            Err(KeysError::Denied)
        ));
    }

    #[test]
    fn list_never_exposes_plaintext_or_ciphertext() {
        let reg = registry();
        reg.create("test", None, None).unwrap();
        let views = reg.list().unwrap();
        assert!(!views.is_empty());
        // MaskedKeyView has no field capable of holding plaintext/ciphertext,
        // so this is enforced at compile time too.
    }

    #[test]
    fn revoke_removes_key() {
        let reg = registry();
        let created = reg.create("test", None, None).unwrap();
        reg.revoke(&created.id).unwrap();
        assert!(matches!(
            reg.verify(&created.plaintext, "anthropic").unwrap(),
            row if row.is_wildcard
        ));
    }
}
