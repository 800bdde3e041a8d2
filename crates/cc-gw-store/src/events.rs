use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::GatewayDb;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventLevel {
    fn as_str(self) -> &'static str {
        match self {
            EventLevel::Info => "info",
            EventLevel::Warn => "warn",
            EventLevel::Error => "error",
        }
    }
}

/// Structured audit entry. Mirrors spec §3's "Gateway event" record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub level: EventLevel,
    pub event_type: String,
    pub source: Option<String>,
    pub title: String,
    pub message: Option<String>,
    pub api_key_id: Option<String>,
    pub endpoint: Option<String>,
    pub user_agent: Option<String>,
    pub detail: Option<Value>,
}

impl GatewayDb {
    pub fn insert_event(&self, e: &GatewayEvent) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let detail_json = e
            .detail
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            "INSERT INTO gateway_events
                (level, event_type, source, title, message, api_key_id, endpoint,
                 user_agent, detail, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            rusqlite::params![
                e.level.as_str(),
                e.event_type,
                e.source,
                e.title,
                e.message,
                e.api_key_id,
                e.endpoint,
                e.user_agent,
                detail_json,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_events(&self, limit: i64) -> Result<Vec<(i64, GatewayEvent, String)>> {
        let conn = self.conn.lock().unwrap();
        let limit = if limit > 0 { limit } else { 100 };
        let mut stmt = conn.prepare(
            "SELECT id, level, event_type, source, title, message, api_key_id, endpoint,
                    user_agent, detail, created_at
             FROM gateway_events ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit], |row| {
                let level_str: String = row.get(1)?;
                let level = match level_str.as_str() {
                    "warn" => EventLevel::Warn,
                    "error" => EventLevel::Error,
                    _ => EventLevel::Info,
                };
                let detail_str: Option<String> = row.get(9)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    GatewayEvent {
                        level,
                        event_type: row.get(2)?,
                        source: row.get(3)?,
                        title: row.get(4)?,
                        message: row.get(5)?,
                        api_key_id: row.get(6)?,
                        endpoint: row.get(7)?,
                        user_agent: row.get(8)?,
                        detail: detail_str.and_then(|s| serde_json::from_str(&s).ok()),
                    },
                    row.get::<_, String>(10)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_list_events() {
        let db = GatewayDb::open_in_memory().unwrap();
        db.insert_event(&GatewayEvent {
            level: EventLevel::Warn,
            event_type: "config_listener_panic".into(),
            source: Some("config_store".into()),
            title: "listener isolated".into(),
            message: None,
            api_key_id: None,
            endpoint: None,
            user_agent: None,
            detail: None,
        })
        .unwrap();

        let events = db.list_events(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.level, EventLevel::Warn);
    }
}
