use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::Result;

/// Single connection to `gateway.db`, guarded by one process-wide mutex.
/// Matches the spec's "one connection with an internal write serializer" —
/// every table this crate owns (request_logs, request_payloads,
/// daily_metrics, api_keys, api_key_audit_logs, gateway_events) lives
/// behind this one lock, mirroring `SessionManager`'s `Mutex<Connection>`
/// shape generalized to a multi-table schema.
pub struct GatewayDb {
    pub(crate) conn: Mutex<Connection>,
}

impl GatewayDb {
    /// Open (creating parent directories as needed) and run schema init.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| crate::error::StoreError::Internal(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Create every table this crate owns if absent, then run incremental
/// migrations. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_request_logs_table(conn)?;
    create_request_payloads_table(conn)?;
    create_daily_metrics_table(conn)?;
    create_api_keys_table(conn)?;
    create_api_key_audit_logs_table(conn)?;
    create_gateway_events_table(conn)?;
    migrate(conn)?;
    Ok(())
}

fn create_request_logs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS request_logs (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp_ms     INTEGER NOT NULL,
            session_id       TEXT,
            endpoint_family  TEXT NOT NULL,
            provider_id      TEXT,
            upstream_model   TEXT,
            client_model     TEXT,
            stream           INTEGER NOT NULL DEFAULT 0,
            latency_ms       INTEGER,
            http_status      INTEGER,
            input_tokens     INTEGER,
            output_tokens    INTEGER,
            cached_tokens    INTEGER,
            ttft_ms          INTEGER,
            tpot_ms          REAL,
            error_message    TEXT,
            api_key_id       TEXT,
            api_key_name     TEXT,
            api_key_masked   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_request_logs_ts ON request_logs(timestamp_ms);
        CREATE INDEX IF NOT EXISTS idx_request_logs_provider ON request_logs(provider_id);
        CREATE INDEX IF NOT EXISTS idx_request_logs_apikey ON request_logs(api_key_id);",
    )?;
    Ok(())
}

fn create_request_payloads_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS request_payloads (
            log_id               INTEGER PRIMARY KEY
                REFERENCES request_logs(id) ON DELETE CASCADE,
            prompt_compressed    BLOB,
            response_compressed  BLOB
        );",
    )?;
    Ok(())
}

fn create_daily_metrics_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS daily_metrics (
            date            TEXT NOT NULL,
            endpoint        TEXT NOT NULL,
            request_count   INTEGER NOT NULL DEFAULT 0,
            input_tokens    INTEGER NOT NULL DEFAULT 0,
            output_tokens   INTEGER NOT NULL DEFAULT 0,
            cached_tokens   INTEGER NOT NULL DEFAULT 0,
            latency_sum_ms  INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (date, endpoint)
        );",
    )?;
    Ok(())
}

fn create_api_keys_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS api_keys (
            id                 TEXT PRIMARY KEY,
            name               TEXT NOT NULL,
            description        TEXT,
            secret_hash        TEXT NOT NULL UNIQUE,
            secret_ciphertext  TEXT,
            prefix             TEXT,
            suffix             TEXT,
            is_wildcard        INTEGER NOT NULL DEFAULT 0,
            enabled            INTEGER NOT NULL DEFAULT 1,
            allowed_endpoints  TEXT,
            usage_count        INTEGER NOT NULL DEFAULT 0,
            last_used_at       TEXT,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn create_api_key_audit_logs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS api_key_audit_logs (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            key_id      TEXT,
            action      TEXT NOT NULL,
            detail      TEXT,
            created_at  TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn create_gateway_events_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS gateway_events (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            level        TEXT NOT NULL,
            event_type   TEXT NOT NULL,
            source       TEXT,
            title        TEXT NOT NULL,
            message      TEXT,
            api_key_id   TEXT,
            endpoint     TEXT,
            user_agent   TEXT,
            detail       TEXT,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_gateway_events_ts ON gateway_events(created_at);",
    )?;
    Ok(())
}

/// Incremental migrations: add any column a prior schema version lacked,
/// and guarantee the wildcard key invariant holds after first launch.
fn migrate(conn: &Connection) -> Result<()> {
    ensure_wildcard_key(conn)?;
    Ok(())
}

fn ensure_wildcard_key(conn: &Connection) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM api_keys WHERE secret_hash = '*')",
        [],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(());
    }

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO api_keys
         (id, name, description, secret_hash, secret_ciphertext, prefix, suffix,
          is_wildcard, enabled, allowed_endpoints, usage_count, last_used_at,
          created_at, updated_at)
         VALUES (?1, 'Any Key', 'Default wildcard key created on first launch',
                 '*', NULL, NULL, NULL, 1, 1, NULL, 0, NULL, ?2, ?2)",
        rusqlite::params![uuid::Uuid::now_v7().to_string(), now],
    )?;
    Ok(())
}
