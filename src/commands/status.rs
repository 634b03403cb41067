//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::meta::{GlobalStats, MetaDb};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub lookback_days: u32,
    pub match_threshold: f64,
    pub db_stats: GlobalStats,
}

/// Get system status
pub async fn cmd_status(config: &Config, db: &MetaDb) -> Result<StatusInfo> {
    info!("Getting status");

    let db_stats = db.get_global_stats().await?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        lookback_days: config.generation.lookback_days,
        match_threshold: config.tracking.match_threshold,
        db_stats,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 playbooks Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nSettings:");
    println!("  Lookback: {} days", status.lookback_days);
    println!("  Match threshold: {:.2}", status.match_threshold);
    println!("\nDatabase Stats:");
    println!("  Content items: {}", status.db_stats.content_count);
    println!("  Metric rows: {}", status.db_stats.metric_rows);
    println!("  Playbooks: {}", status.db_stats.playbook_count);
    println!("  Live variants: {}", status.db_stats.variant_count);
    println!("  Experiments: {}", status.db_stats.experiment_count);
    println!("  Tracked content: {}", status.db_stats.tracked_content_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::test_support::*;
    use crate::models::ContentFormat;

    #[tokio::test]
    async fn test_status_counts() {
        let (db, _tmp) = setup_test_db().await;
        seed_content(&db, "a", "org", ContentFormat::Post, None, &[], at(2024, 3, 1, 9), Some(10), 1).await;

        let status = cmd_status(&Config::default(), &db).await.unwrap();
        assert_eq!(status.db_stats.content_count, 1);
        assert_eq!(status.db_stats.metric_rows, 1);
        assert_eq!(status.db_stats.playbook_count, 0);
    }
}
