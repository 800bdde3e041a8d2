pub mod config;
pub mod error;
pub mod secret;

use std::path::PathBuf;

/// Data root for all persisted gateway state: config, keys, db, logs.
/// Honors `CC_GW_HOME`; defaults to `~/.cc-gw`.
pub fn home_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CC_GW_HOME") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".cc-gw")
}
