//! Command implementations

pub mod check;
pub mod config;
pub mod end;
pub mod open;
pub mod prune;
pub mod save;
pub mod sessions;

use coedit_core::{CoeditConfig, ConfigLayer, SqliteSessionStore};

/// Effective configuration with `--database` layered over files and env.
pub fn load_config(database: Option<&str>) -> coedit_core::Result<CoeditConfig> {
    coedit_core::load_config_with(ConfigLayer {
        database_path: database.map(str::to_string),
        ..ConfigLayer::default()
    })
}

/// Open the session store named by the configuration.
pub async fn open_store(config: &CoeditConfig) -> coedit_core::Result<SqliteSessionStore> {
    tracing::debug!(database = %config.database_path, "opening session store");
    SqliteSessionStore::open(&config.database_path).await
}
