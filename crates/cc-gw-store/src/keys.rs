use serde::{Deserialize, Serialize};

use crate::db::GatewayDb;
use crate::error::Result;

/// Row-level view of `api_keys`. Business rules (hashing, wildcard
/// semantics, scoping) live in `cc-gw-keys`; this crate only persists
/// and retrieves rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub secret_hash: String,
    pub secret_ciphertext: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub is_wildcard: bool,
    pub enabled: bool,
    /// JSON array of allowed endpoint families, `None` = unrestricted.
    pub allowed_endpoints: Option<Vec<String>>,
    pub usage_count: i64,
    pub last_used_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

const SELECT_COLUMNS: &str = "id, name, description, secret_hash, secret_ciphertext, prefix,
    suffix, is_wildcard, enabled, allowed_endpoints, usage_count, last_used_at,
    created_at, updated_at";

fn row_to_key(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKeyRow> {
    let allowed_json: Option<String> = row.get(9)?;
    Ok(ApiKeyRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        secret_hash: row.get(3)?,
        secret_ciphertext: row.get(4)?,
        prefix: row.get(5)?,
        suffix: row.get(6)?,
        is_wildcard: row.get::<_, i64>(7)? != 0,
        enabled: row.get::<_, i64>(8)? != 0,
        allowed_endpoints: allowed_json.and_then(|s| serde_json::from_str(&s).ok()),
        usage_count: row.get(10)?,
        last_used_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

impl GatewayDb {
    pub fn insert_key(&self, row: &ApiKeyRow) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let allowed_json = row
            .allowed_endpoints
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            "INSERT INTO api_keys
                (id, name, description, secret_hash, secret_ciphertext, prefix, suffix,
                 is_wildcard, enabled, allowed_endpoints, usage_count, last_used_at,
                 created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
            rusqlite::params![
                row.id,
                row.name,
                row.description,
                row.secret_hash,
                row.secret_ciphertext,
                row.prefix,
                row.suffix,
                row.is_wildcard as i64,
                row.enabled as i64,
                allowed_json,
                row.usage_count,
                row.last_used_at,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_key_by_hash(&self, hash: &str) -> Result<Option<ApiKeyRow>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {SELECT_COLUMNS} FROM api_keys WHERE secret_hash = ?1");
        conn.query_row(&sql, [hash], row_to_key)
            .map(Some)
            .or_else(|e| {
                if e == rusqlite::Error::QueryReturnedNoRows {
                    Ok(None)
                } else {
                    Err(e.into())
                }
            })
    }

    pub fn find_key_by_id(&self, id: &str) -> Result<Option<ApiKeyRow>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {SELECT_COLUMNS} FROM api_keys WHERE id = ?1");
        conn.query_row(&sql, [id], row_to_key)
            .map(Some)
            .or_else(|e| {
                if e == rusqlite::Error::QueryReturnedNoRows {
                    Ok(None)
                } else {
                    Err(e.into())
                }
            })
    }

    pub fn list_keys(&self) -> Result<Vec<ApiKeyRow>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {SELECT_COLUMNS} FROM api_keys ORDER BY created_at");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_key)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_key_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE api_keys SET enabled = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![enabled as i64, now, id],
        )?;
        Ok(())
    }

    pub fn delete_key(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM api_keys WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn record_key_usage(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE api_keys SET usage_count = usage_count + 1, last_used_at = ?1 WHERE id = ?2",
            rusqlite::params![now, id],
        )?;
        Ok(())
    }

    pub fn insert_key_audit_log(&self, key_id: Option<&str>, action: &str, detail: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO api_key_audit_logs (key_id, action, detail, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![key_id, action, detail, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, hash: &str) -> ApiKeyRow {
        let now = "2026-07-27T00:00:00Z".to_string();
        ApiKeyRow {
            id: id.to_string(),
            name: "test key".into(),
            description: None,
            secret_hash: hash.to_string(),
            secret_ciphertext: Some("cipher".into()),
            prefix: Some("sk-gw-".into()),
            suffix: Some("abcd".into()),
            is_wildcard: false,
            enabled: true,
            allowed_endpoints: None,
            usage_count: 0,
            last_used_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn wildcard_key_exists_after_open() {
        let db = GatewayDb::open_in_memory().unwrap();
        let wildcard = db.find_key_by_hash("*").unwrap();
        assert!(wildcard.is_some());
        assert!(wildcard.unwrap().is_wildcard);
    }

    #[test]
    fn insert_find_update_delete_round_trip() {
        let db = GatewayDb::open_in_memory().unwrap();
        db.insert_key(&sample("k1", "hash1")).unwrap();

        let found = db.find_key_by_hash("hash1").unwrap().unwrap();
        assert_eq!(found.id, "k1");

        db.set_key_enabled("k1", false).unwrap();
        let disabled = db.find_key_by_id("k1").unwrap().unwrap();
        assert!(!disabled.enabled);

        db.delete_key("k1").unwrap();
        assert!(db.find_key_by_id("k1").unwrap().is_none());
    }
}
