use serde::{Deserialize, Serialize};

use crate::db::GatewayDb;
use crate::error::Result;

/// One terminal outcome of a request. Inserted exactly once per request,
/// regardless of which state-machine terminal produced it (spec §4.13).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogRecord {
    pub timestamp_ms: i64,
    pub session_id: Option<String>,
    pub endpoint_family: String,
    pub provider_id: Option<String>,
    pub upstream_model: Option<String>,
    pub client_model: Option<String>,
    pub stream: bool,
    pub latency_ms: Option<i64>,
    pub http_status: Option<i32>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cached_tokens: Option<i64>,
    pub ttft_ms: Option<i64>,
    pub tpot_ms: Option<f64>,
    pub error_message: Option<String>,
    pub api_key_id: Option<String>,
    pub api_key_name: Option<String>,
    pub api_key_masked: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogRow {
    pub id: i64,
    #[serde(flatten)]
    pub record: RequestLogRecord,
}

#[derive(Debug, Clone, Default)]
pub struct LogFilters {
    pub since_ms: Option<i64>,
    pub until_ms: Option<i64>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub api_key_id: Option<String>,
    pub status: Option<i32>,
    pub limit: i64,
    /// Exclusive upper bound on `id` for keyset pagination (descending).
    pub cursor: Option<i64>,
}

impl LogFilters {
    pub fn with_limit(limit: i64) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestLogRow> {
    Ok(RequestLogRow {
        id: row.get(0)?,
        record: RequestLogRecord {
            timestamp_ms: row.get(1)?,
            session_id: row.get(2)?,
            endpoint_family: row.get(3)?,
            provider_id: row.get(4)?,
            upstream_model: row.get(5)?,
            client_model: row.get(6)?,
            stream: row.get::<_, i64>(7)? != 0,
            latency_ms: row.get(8)?,
            http_status: row.get(9)?,
            input_tokens: row.get(10)?,
            output_tokens: row.get(11)?,
            cached_tokens: row.get(12)?,
            ttft_ms: row.get(13)?,
            tpot_ms: row.get(14)?,
            error_message: row.get(15)?,
            api_key_id: row.get(16)?,
            api_key_name: row.get(17)?,
            api_key_masked: row.get(18)?,
        },
    })
}

const SELECT_COLUMNS: &str = "id, timestamp_ms, session_id, endpoint_family, provider_id,
    upstream_model, client_model, stream, latency_ms, http_status, input_tokens,
    output_tokens, cached_tokens, ttft_ms, tpot_ms, error_message, api_key_id,
    api_key_name, api_key_masked";

impl GatewayDb {
    /// Insert one terminal log row. Returns its auto-assigned id.
    pub fn insert_log(&self, r: &RequestLogRecord) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO request_logs
             (timestamp_ms, session_id, endpoint_family, provider_id, upstream_model,
              client_model, stream, latency_ms, http_status, input_tokens, output_tokens,
              cached_tokens, ttft_ms, tpot_ms, error_message, api_key_id, api_key_name,
              api_key_masked)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
            rusqlite::params![
                r.timestamp_ms,
                r.session_id,
                r.endpoint_family,
                r.provider_id,
                r.upstream_model,
                r.client_model,
                r.stream as i64,
                r.latency_ms,
                r.http_status,
                r.input_tokens,
                r.output_tokens,
                r.cached_tokens,
                r.ttft_ms,
                r.tpot_ms,
                r.error_message,
                r.api_key_id,
                r.api_key_name,
                r.api_key_masked,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert the brotli-compressed prompt/response payload for a log row.
    pub fn insert_payload(
        &self,
        log_id: i64,
        compressed_prompt: &[u8],
        compressed_response: &[u8],
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO request_payloads (log_id, prompt_compressed, response_compressed)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(log_id) DO UPDATE SET
                prompt_compressed = excluded.prompt_compressed,
                response_compressed = excluded.response_compressed",
            rusqlite::params![log_id, compressed_prompt, compressed_response],
        )?;
        Ok(())
    }

    pub fn query_logs(&self, filters: &LogFilters) -> Result<Vec<RequestLogRow>> {
        let conn = self.conn.lock().unwrap();

        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(since) = filters.since_ms {
            clauses.push("timestamp_ms >= ?".to_string());
            params.push(Box::new(since));
        }
        if let Some(until) = filters.until_ms {
            clauses.push("timestamp_ms <= ?".to_string());
            params.push(Box::new(until));
        }
        if let Some(ref provider) = filters.provider {
            clauses.push("provider_id = ?".to_string());
            params.push(Box::new(provider.clone()));
        }
        if let Some(ref model) = filters.model {
            clauses.push("(upstream_model = ? OR client_model = ?)".to_string());
            params.push(Box::new(model.clone()));
            params.push(Box::new(model.clone()));
        }
        if let Some(ref endpoint) = filters.endpoint {
            clauses.push("endpoint_family = ?".to_string());
            params.push(Box::new(endpoint.clone()));
        }
        if let Some(ref key_id) = filters.api_key_id {
            clauses.push("api_key_id = ?".to_string());
            params.push(Box::new(key_id.clone()));
        }
        if let Some(status) = filters.status {
            clauses.push("http_status = ?".to_string());
            params.push(Box::new(status));
        }
        if let Some(cursor) = filters.cursor {
            clauses.push("id < ?".to_string());
            params.push(Box::new(cursor));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let limit = if filters.limit > 0 { filters.limit } else { 100 };
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM request_logs {where_sql} ORDER BY id DESC LIMIT {limit}"
        );

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_log_with_payload(
        &self,
        id: i64,
    ) -> Result<Option<(RequestLogRow, Option<(Vec<u8>, Vec<u8>)>)>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {SELECT_COLUMNS} FROM request_logs WHERE id = ?1");
        let log = conn
            .query_row(&sql, [id], row_to_record)
            .map(Some)
            .or_else(|e| {
                if e == rusqlite::Error::QueryReturnedNoRows {
                    Ok(None)
                } else {
                    Err(e)
                }
            })?;

        let Some(log) = log else {
            return Ok(None);
        };

        let payload = conn
            .query_row(
                "SELECT prompt_compressed, response_compressed FROM request_payloads
                 WHERE log_id = ?1",
                [id],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?)),
            )
            .map(Some)
            .or_else(|e| {
                if e == rusqlite::Error::QueryReturnedNoRows {
                    Ok(None)
                } else {
                    Err(e)
                }
            })?;

        Ok(Some((log, payload)))
    }

    /// Delete all logs with `timestamp_ms < cutoff_ms`. `request_payloads`
    /// rows cascade via the foreign key; the whole sweep runs in one
    /// transaction so the cascade is atomic.
    pub fn delete_logs_before(&self, cutoff_ms: i64) -> Result<u64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let count = tx.execute(
            "DELETE FROM request_logs WHERE timestamp_ms < ?1",
            [cutoff_ms],
        )?;
        tx.commit()?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RequestLogRecord {
        RequestLogRecord {
            timestamp_ms: 1_000,
            session_id: Some("s1".into()),
            endpoint_family: "anthropic".into(),
            provider_id: Some("kimi".into()),
            upstream_model: Some("kimi-k2".into()),
            client_model: Some("claude-3-5-sonnet-latest".into()),
            stream: false,
            latency_ms: Some(250),
            http_status: Some(200),
            input_tokens: Some(10),
            output_tokens: Some(20),
            cached_tokens: Some(0),
            ttft_ms: Some(50),
            tpot_ms: Some(10.0),
            error_message: None,
            api_key_id: Some("k1".into()),
            api_key_name: Some("default".into()),
            api_key_masked: Some("sk-gw-****1234".into()),
        }
    }

    #[test]
    fn insert_and_query_round_trip() {
        let db = GatewayDb::open_in_memory().unwrap();
        let id = db.insert_log(&sample()).unwrap();
        assert!(id > 0);

        let rows = db.query_logs(&LogFilters::with_limit(10)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].record.provider_id.as_deref(), Some("kimi"));
    }

    #[test]
    fn filters_narrow_results() {
        let db = GatewayDb::open_in_memory().unwrap();
        let mut r = sample();
        db.insert_log(&r).unwrap();
        r.provider_id = Some("deepseek".into());
        db.insert_log(&r).unwrap();

        let filters = LogFilters {
            provider: Some("deepseek".to_string()),
            limit: 10,
            ..Default::default()
        };
        let rows = db.query_logs(&filters).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.provider_id.as_deref(), Some("deepseek"));
    }

    #[test]
    fn retention_deletes_and_cascades() {
        let db = GatewayDb::open_in_memory().unwrap();
        let mut r = sample();
        r.timestamp_ms = 100;
        let old_id = db.insert_log(&r).unwrap();
        db.insert_payload(old_id, b"prompt", b"response").unwrap();

        r.timestamp_ms = 10_000;
        let new_id = db.insert_log(&r).unwrap();

        let deleted = db.delete_logs_before(5_000).unwrap();
        assert_eq!(deleted, 1);

        let remaining = db.query_logs(&LogFilters::with_limit(10)).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, new_id);

        let payload = db.get_log_with_payload(old_id).unwrap();
        assert!(payload.is_none());
    }
}
