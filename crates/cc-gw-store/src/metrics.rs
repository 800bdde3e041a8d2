use serde::{Deserialize, Serialize};

use crate::db::GatewayDb;
use crate::error::Result;
use crate::logs::RequestLogRecord;

/// Deltas contributed by one completed request, upserted into the
/// `(date, endpoint)` row.
#[derive(Debug, Clone, Default)]
pub struct DailyDelta {
    pub request_count: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cached_tokens: i64,
    pub latency_sum_ms: i64,
}

impl From<&RequestLogRecord> for DailyDelta {
    fn from(r: &RequestLogRecord) -> Self {
        Self {
            request_count: 1,
            input_tokens: r.input_tokens.unwrap_or(0),
            output_tokens: r.output_tokens.unwrap_or(0),
            cached_tokens: r.cached_tokens.unwrap_or(0),
            latency_sum_ms: r.latency_ms.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetricRow {
    pub date: String,
    pub endpoint: String,
    pub request_count: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cached_tokens: i64,
    pub latency_sum_ms: i64,
}

impl GatewayDb {
    /// Upsert a daily metric row, adding `delta`'s contributions to any
    /// existing row for `(date, endpoint)`.
    pub fn upsert_daily(&self, date: &str, endpoint: &str, delta: &DailyDelta) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO daily_metrics
                (date, endpoint, request_count, input_tokens, output_tokens,
                 cached_tokens, latency_sum_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(date, endpoint) DO UPDATE SET
                request_count  = request_count  + excluded.request_count,
                input_tokens   = input_tokens   + excluded.input_tokens,
                output_tokens  = output_tokens  + excluded.output_tokens,
                cached_tokens  = cached_tokens  + excluded.cached_tokens,
                latency_sum_ms = latency_sum_ms + excluded.latency_sum_ms",
            rusqlite::params![
                date,
                endpoint,
                delta.request_count,
                delta.input_tokens,
                delta.output_tokens,
                delta.cached_tokens,
                delta.latency_sum_ms,
            ],
        )?;
        Ok(())
    }

    pub fn query_daily(&self, since_date: &str) -> Result<Vec<DailyMetricRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT date, endpoint, request_count, input_tokens, output_tokens,
                    cached_tokens, latency_sum_ms
             FROM daily_metrics WHERE date >= ?1 ORDER BY date, endpoint",
        )?;
        let rows = stmt
            .query_map([since_date], |row| {
                Ok(DailyMetricRow {
                    date: row.get(0)?,
                    endpoint: row.get(1)?,
                    request_count: row.get(2)?,
                    input_tokens: row.get(3)?,
                    output_tokens: row.get(4)?,
                    cached_tokens: row.get(5)?,
                    latency_sum_ms: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_accumulates() {
        let db = GatewayDb::open_in_memory().unwrap();
        let delta = DailyDelta {
            request_count: 1,
            input_tokens: 10,
            output_tokens: 20,
            cached_tokens: 0,
            latency_sum_ms: 100,
        };
        db.upsert_daily("2026-07-27", "anthropic", &delta).unwrap();
        db.upsert_daily("2026-07-27", "anthropic", &delta).unwrap();

        let rows = db.query_daily("2026-01-01").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_count, 2);
        assert_eq!(rows[0].output_tokens, 40);
    }

    #[test]
    fn retention_sweep_retains_daily_aggregates() {
        let db = GatewayDb::open_in_memory().unwrap();
        let delta = DailyDelta {
            request_count: 5,
            input_tokens: 50,
            output_tokens: 50,
            cached_tokens: 0,
            latency_sum_ms: 500,
        };
        db.upsert_daily("2026-06-01", "openai-chat", &delta)
            .unwrap();
        db.delete_logs_before(i64::MAX).unwrap();

        let rows = db.query_daily("2026-01-01").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_count, 5);
    }
}
