pub mod db;
pub mod error;
pub mod events;
pub mod keys;
pub mod logs;
pub mod maintenance;
pub mod metrics;
pub mod payload;

pub use db::GatewayDb;

/// Returns `~/.cc-gw/data/gateway.db`, honoring `CC_GW_HOME`.
pub fn default_db_path() -> std::path::PathBuf {
    cc_gw_core::home_dir().join("data").join("gateway.db")
}
