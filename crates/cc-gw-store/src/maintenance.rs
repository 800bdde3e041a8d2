use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{error, info};

use cc_gw_core::config::ConfigStore;

use crate::db::GatewayDb;
use crate::error::Result;

const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CompactReport {
    pub bytes_reclaimed: i64,
}

/// Periodic retention sweep + admin-triggered compaction, both serialized
/// through `busy` so they never run concurrently with each other or with
/// the pending write queue. Shape mirrors `SchedulerEngine`'s tick/shutdown
/// select loop, generalized from a job queue to a single fixed-interval task.
pub struct Maintenance {
    db: Arc<GatewayDb>,
    config: Arc<ConfigStore>,
    busy: AsyncMutex<()>,
}

impl Maintenance {
    pub fn new(db: Arc<GatewayDb>, config: Arc<ConfigStore>) -> Self {
        Self {
            db,
            config,
            busy: AsyncMutex::new(()),
        }
    }

    /// Run the 24h retention sweep loop until `shutdown` broadcasts `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("maintenance loop started");
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!("retention sweep failed: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("maintenance loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Delete logs older than `logRetentionDays` from the live config snapshot.
    pub async fn sweep(&self) -> Result<u64> {
        let _guard = self.busy.lock().await;
        let retention_days = self.config.get().logging.retention_days as i64;
        let cutoff_ms = chrono::Utc::now().timestamp_millis() - retention_days * 86_400_000;

        let db = self.db.clone();
        let deleted =
            tokio::task::spawn_blocking(move || db.delete_logs_before(cutoff_ms))
                .await
                .map_err(|e| crate::error::StoreError::Internal(e.to_string()))??;

        if deleted > 0 {
            info!(count = deleted, cutoff_ms, "retention sweep deleted rows");
        }
        Ok(deleted)
    }

    /// Admin-triggered checkpoint + VACUUM. Reports bytes reclaimed.
    pub async fn compact(&self) -> Result<CompactReport> {
        let _guard = self.busy.lock().await;
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.compact())
            .await
            .map_err(|e| crate::error::StoreError::Internal(e.to_string()))?
    }
}

impl GatewayDb {
    pub(crate) fn compact(&self) -> Result<CompactReport> {
        let conn = self.conn.lock().unwrap();

        let path = conn.path().map(|p| p.to_string());
        let size_before = path
            .as_deref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len() as i64)
            .unwrap_or(0);

        conn.pragma_update(None, "wal_checkpoint", "TRUNCATE")?;
        conn.execute_batch("VACUUM;")?;

        let size_after = path
            .as_deref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len() as i64)
            .unwrap_or(0);

        Ok(CompactReport {
            bytes_reclaimed: (size_before - size_after).max(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sweep_respects_config_retention() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(GatewayDb::open(dir.path().join("gateway.db")).unwrap());
        let config = Arc::new(ConfigStore::load(dir.path().join("config.json")).unwrap());
        let mut doc = (*config.get()).clone();
        doc.logging.retention_days = 1;
        config.update(doc).unwrap();

        let old_ts = chrono::Utc::now().timestamp_millis() - 2 * 86_400_000;
        db.insert_log(&crate::logs::RequestLogRecord {
            timestamp_ms: old_ts,
            session_id: None,
            endpoint_family: "anthropic".into(),
            provider_id: None,
            upstream_model: None,
            client_model: None,
            stream: false,
            latency_ms: None,
            http_status: Some(200),
            input_tokens: None,
            output_tokens: None,
            cached_tokens: None,
            ttft_ms: None,
            tpot_ms: None,
            error_message: None,
            api_key_id: None,
            api_key_name: None,
            api_key_masked: None,
        })
        .unwrap();

        let maintenance = Maintenance::new(db.clone(), config);
        let deleted = maintenance.sweep().await.unwrap();
        assert_eq!(deleted, 1);
    }
}
