use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use figment::providers::{Env, Format, Json};
use figment::Figment;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{GatewayError, Result};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_LONG_CONTEXT_THRESHOLD: u64 = 60_000;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Top-level configuration document — the single source of truth for routing,
/// providers, and admin auth. Owned exclusively by [`ConfigStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default = "ListenConfig::default")]
    pub listen: ListenConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Per-endpoint-family routing (keyed by endpoint family id, e.g. "anthropic").
    #[serde(default)]
    pub endpoint_routing: HashMap<String, EndpointRouting>,
    #[serde(default)]
    pub custom_endpoints: Vec<CustomEndpoint>,
    #[serde(default)]
    pub admin_auth: AdminAuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub payload_persistence: PayloadPersistenceConfig,
    #[serde(default = "default_body_limit")]
    pub max_body_bytes: usize,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            providers: Vec::new(),
            endpoint_routing: HashMap::new(),
            custom_endpoints: Vec::new(),
            admin_auth: AdminAuthConfig::default(),
            logging: LoggingConfig::default(),
            payload_persistence: PayloadPersistenceConfig::default(),
            max_body_bytes: default_body_limit(),
        }
    }
}

fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_bind")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub tls: Option<TlsConfig>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_bind(),
            port: default_port(),
            tls: None,
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

/// TLS certificate/key file paths. The gateway never parses certificate
/// material itself — paths are handed to the HTTP listener as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WireFamily {
    Openai,
    Anthropic,
    Deepseek,
    Kimi,
    Huawei,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CredentialMode {
    /// Vendor header, e.g. `x-api-key`.
    ApiKey,
    /// `Authorization: Bearer <token>` — Anthropic only.
    AuthToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub label: String,
    pub wire_family: WireFamily,
    pub base_url: String,
    /// Opaque credential value (API key / bearer token). Stored encrypted
    /// at rest by the caller via [`crate::secret::SecretVault`]; this field
    /// holds whatever the vault handed back for in-memory use.
    pub credential: String,
    pub credential_mode: Option<CredentialMode>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    pub default_model: Option<String>,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    /// Whether this route target accepts tool/function definitions.
    /// `false` routes strip tool calls/results into plain text before
    /// the request leaves the gateway (spec §4.6).
    #[serde(default = "bool_true")]
    pub supports_tools: bool,
}

impl ProviderConfig {
    pub fn has_model(&self, model_id: &str) -> bool {
        self.default_model.as_deref() == Some(model_id)
            || self.models.iter().any(|m| m.id == model_id)
    }
}

/// Routing defaults for one endpoint family (e.g. "anthropic").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDefaults {
    pub completion: String,
    pub reasoning: Option<String>,
    pub background: Option<String>,
    #[serde(default = "default_long_context_threshold")]
    pub long_context_threshold: u64,
}

fn default_long_context_threshold() -> u64 {
    DEFAULT_LONG_CONTEXT_THRESHOLD
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRouting {
    pub defaults: RouteDefaults,
    /// Pattern (may contain `*`) → `providerId:modelId` or `providerId:*`.
    /// `IndexMap` (rather than `HashMap`) so the Router's wildcard
    /// tie-break ("earlier wins" per spec §4.7 step 2) has a stable
    /// insertion order to break ties on.
    #[serde(default)]
    pub model_routes: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointProtocol {
    Anthropic,
    OpenaiChat,
    OpenaiResponses,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomEndpoint {
    pub path: String,
    pub protocol: EndpointProtocol,
    /// Which endpoint family's routing table this alias resolves against.
    pub endpoint_family: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAuthConfig {
    #[serde(default)]
    pub enabled: bool,
    pub username: Option<String>,
    /// scrypt hash, base64-encoded (see `cc_gw_auth`).
    pub password_hash: Option<String>,
    pub password_salt: Option<String>,
}

impl Default for AdminAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            username: None,
            password_hash: None,
            password_salt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadPersistenceConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

impl Default for PayloadPersistenceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn bool_true() -> bool {
    true
}

impl ConfigDocument {
    /// Validate invariants from spec §4.1. Does not mutate.
    pub fn validate(&self) -> Result<()> {
        let mut seen_ids = std::collections::HashSet::new();
        for p in &self.providers {
            if !seen_ids.insert(p.id.as_str()) {
                return Err(GatewayError::ConfigInvalid(format!(
                    "duplicate provider id: {}",
                    p.id
                )));
            }
            if p.default_model.is_none() && p.models.is_empty() {
                return Err(GatewayError::ConfigInvalid(format!(
                    "provider {} has neither defaultModel nor models",
                    p.id
                )));
            }
            if !(p.base_url.starts_with("http://") || p.base_url.starts_with("https://")) {
                return Err(GatewayError::ConfigInvalid(format!(
                    "provider {} has a malformed base_url: {}",
                    p.id, p.base_url
                )));
            }
        }

        for (endpoint_id, routing) in &self.endpoint_routing {
            for (pattern, target) in &routing.model_routes {
                let Some((provider_id, model_id)) = target.split_once(':') else {
                    return Err(GatewayError::ConfigInvalid(format!(
                        "endpoint {endpoint_id} route {pattern} is not providerId:modelId"
                    )));
                };
                if model_id == "*" {
                    continue;
                }
                let provider = self.providers.iter().find(|p| p.id == provider_id);
                match provider {
                    Some(p) if p.has_model(model_id) => {}
                    Some(_) => {
                        return Err(GatewayError::ConfigInvalid(format!(
                            "endpoint {endpoint_id} route {pattern} references unknown model {model_id} on provider {provider_id}"
                        )));
                    }
                    None => {
                        return Err(GatewayError::ConfigInvalid(format!(
                            "endpoint {endpoint_id} route {pattern} references unknown provider {provider_id}"
                        )));
                    }
                }
            }
        }

        if self.logging.retention_days < 1 {
            return Err(GatewayError::ConfigInvalid(
                "logging.retention_days must be >= 1".to_string(),
            ));
        }

        for ce in &self.custom_endpoints {
            if !self.endpoint_routing.contains_key(&ce.endpoint_family) {
                return Err(GatewayError::ConfigInvalid(format!(
                    "custom endpoint {} references unknown endpoint family {}",
                    ce.path, ce.endpoint_family
                )));
            }
        }

        Ok(())
    }
}

type ChangeListener = Box<dyn Fn(&ConfigDocument) + Send + Sync>;

/// Owns the on-disk configuration document, validates updates, and
/// broadcasts change notifications. Snapshot reads never block writers
/// and vice versa (`RwLock<Arc<ConfigDocument>>` read-copy-update).
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<ConfigDocument>>,
    listeners: RwLock<Vec<ChangeListener>>,
}

impl ConfigStore {
    /// Load the document from `path`, creating a default one if absent.
    /// Env overrides use the `CC_GW_` prefix split on `_`, mirroring
    /// figment-based config loading elsewhere in this codebase.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let doc: ConfigDocument = if path.exists() {
            Figment::new()
                .merge(Json::file(&path))
                .merge(Env::prefixed("CC_GW_").split("_"))
                .extract()
                .map_err(|e| GatewayError::ConfigInvalid(e.to_string()))?
        } else {
            ConfigDocument::default()
        };

        doc.validate()?;

        let store = Self {
            path,
            current: RwLock::new(Arc::new(doc)),
            listeners: RwLock::new(Vec::new()),
        };

        if !store.path.exists() {
            store.persist(&store.get())?;
        }

        Ok(store)
    }

    /// Return the latest snapshot. Cheap: clones an `Arc`.
    pub fn get(&self) -> Arc<ConfigDocument> {
        self.current.read().unwrap().clone()
    }

    /// Validate, persist, install, then fan out to listeners. On validation
    /// or persistence failure the in-memory snapshot is left untouched.
    pub fn update(&self, new_doc: ConfigDocument) -> Result<Arc<ConfigDocument>> {
        new_doc.validate()?;
        self.persist(&new_doc)?;

        let doc = Arc::new(new_doc);
        {
            let mut guard = self.current.write().unwrap();
            *guard = doc.clone();
        }
        self.notify(&doc);
        Ok(doc)
    }

    /// Register a change listener. Fired synchronously, in registration
    /// order, on every successful `update`. A panicking/erroring listener
    /// is isolated — logged, never propagated to the caller of `update`.
    pub fn on_change<F>(&self, cb: F)
    where
        F: Fn(&ConfigDocument) + Send + Sync + 'static,
    {
        self.listeners.write().unwrap().push(Box::new(cb));
    }

    fn notify(&self, doc: &ConfigDocument) {
        for listener in self.listeners.read().unwrap().iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(doc)));
            if result.is_err() {
                error!("config change listener panicked; isolated");
            }
        }
    }

    fn persist(&self, doc: &ConfigDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| GatewayError::Internal(format!("config serialize failed: {e}")))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GatewayError::Internal(format!("config dir create failed: {e}")))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| GatewayError::Internal(format!("config write failed: {e}")))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| GatewayError::Internal(format!("config rename failed: {e}")))?;

        Ok(())
    }
}

/// Returns `~/.cc-gw/config.json`, honoring `CC_GW_HOME` if set.
pub fn default_config_path() -> PathBuf {
    crate::home_dir().join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_provider(id: &str) -> ProviderConfig {
        ProviderConfig {
            id: id.to_string(),
            label: id.to_string(),
            wire_family: WireFamily::Openai,
            base_url: "https://api.example.com".to_string(),
            credential: "secret".to_string(),
            credential_mode: None,
            extra_headers: HashMap::new(),
            default_model: Some("model-a".to_string()),
            models: Vec::new(),
            supports_tools: true,
        }
    }

    #[test]
    fn default_document_validates() {
        let doc = ConfigDocument::default();
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn duplicate_provider_ids_rejected() {
        let mut doc = ConfigDocument::default();
        doc.providers.push(sample_provider("p1"));
        doc.providers.push(sample_provider("p1"));
        assert!(matches!(
            doc.validate(),
            Err(GatewayError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn retention_days_below_one_rejected() {
        let mut doc = ConfigDocument::default();
        doc.logging.retention_days = 0;
        assert!(doc.validate().is_err());
    }

    #[test]
    fn route_target_missing_model_rejected() {
        let mut doc = ConfigDocument::default();
        doc.providers.push(sample_provider("p1"));
        doc.endpoint_routing.insert(
            "anthropic".to_string(),
            EndpointRouting {
                defaults: RouteDefaults {
                    completion: "p1:model-a".to_string(),
                    reasoning: None,
                    background: None,
                    long_context_threshold: DEFAULT_LONG_CONTEXT_THRESHOLD,
                },
                model_routes: IndexMap::from([(
                    "foo".to_string(),
                    "p1:not-a-model".to_string(),
                )]),
            },
        );
        assert!(doc.validate().is_err());
    }

    #[test]
    fn update_persists_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path().join("config.json")).unwrap();

        let notified = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let notified2 = notified.clone();
        store.on_change(move |_| {
            notified2.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        let mut doc = (*store.get()).clone();
        doc.logging.retention_days = 7;
        store.update(doc).unwrap();

        assert_eq!(store.get().logging.retention_days, 7);
        assert!(notified.load(std::sync::atomic::Ordering::SeqCst));
        assert!(dir.path().join("config.json").exists());
    }

    #[test]
    fn invalid_update_does_not_advance_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path().join("config.json")).unwrap();

        let mut bad = (*store.get()).clone();
        bad.logging.retention_days = 0;
        assert!(store.update(bad).is_err());
        assert_eq!(store.get().logging.retention_days, DEFAULT_RETENTION_DAYS);
    }
}
