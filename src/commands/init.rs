//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Where init put things
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitResult {
    pub config_path: String,
    pub db_path: String,
    pub overwritten: bool,
}

/// Write the default configuration and create the database schema
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<InitResult> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    let exists = config.paths.config_file.exists();
    if exists && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.save()?;

    let db = MetaDb::connect(&config).await?;
    if !db.is_initialized().await? {
        db.init_schema().await?;
    }

    info!("Initialized playbooks at {:?}", config.paths.base_dir);

    Ok(InitResult {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        overwritten: exists,
    })
}

/// Print init result to console
pub fn print_init_result(result: &InitResult) {
    println!("✓ playbooks initialized successfully");
    println!("  Config: {}", result.config_path);
    println!("  Database: {}", result.db_path);
    println!("\nNext steps:");
    println!("  1. Import content: playbooks import content.json");
    println!("  2. Generate playbooks: playbooks generate --org <org-id>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_db() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("home");

        let result = cmd_init(Some(base.clone()), false).await.unwrap();
        assert!(!result.overwritten);

        let config = Config::load_from(Some(base.clone())).unwrap();
        assert!(config.is_initialized());

        let err = cmd_init(Some(base.clone()), false).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let again = cmd_init(Some(base), true).await.unwrap();
        assert!(again.overwritten);
    }
}
