mod config;
pub mod migrations;
pub mod plan_store;

pub use config::{CatalogConfig, Config, GenerationConfig, PlanConfig};
pub use plan_store::{PlanStore, SqlitePlanStore, StoredPlan};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `COURSEPLAN_DATA_DIR` wins when set. Otherwise `~/.config/courseplan`, or
/// `~/.config/courseplan-dev` when `COURSEPLAN_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("COURSEPLAN_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("COURSEPLAN_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("courseplan-dev")
            } else {
                base_dir.join("courseplan")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
