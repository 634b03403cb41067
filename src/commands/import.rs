//! Import command implementation
//!
//! Loads content items, daily metrics and group memberships from a JSON
//! bundle, refreshes the aggregates of variants already tracking updated
//! content, then auto-tracks every newly created item.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::{ContentItem, DailyMetric, MetaDb};
use crate::models::ContentFormat;
use crate::tracking::{recompute_variant_metrics, AutoTracker, BatchTrackingReport};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Plain-data import file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportBundle {
    #[serde(default)]
    pub content: Vec<ImportContent>,
    #[serde(default)]
    pub metrics: Vec<ImportMetric>,
    #[serde(default)]
    pub groups: Vec<ImportGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportContent {
    pub id: String,
    pub org_id: String,
    pub integration_id: String,
    pub format: ContentFormat,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMetric {
    pub content_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub impressions: Option<i64>,
    #[serde(default)]
    pub reach: Option<i64>,
    #[serde(default)]
    pub reactions: Option<i64>,
    #[serde(default)]
    pub comments: Option<i64>,
    #[serde(default)]
    pub shares: Option<i64>,
    #[serde(default)]
    pub video_views: Option<i64>,
    #[serde(default)]
    pub clicks: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportGroup {
    pub org_id: String,
    pub group_id: String,
    pub integration_ids: Vec<String>,
}

/// Import statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub content_created: usize,
    pub content_existing: usize,
    pub metrics_written: usize,
    pub metrics_failed: usize,
    pub group_links: usize,
    /// Variant links recomputed because tracked content got new metrics
    pub variants_refreshed: usize,
    pub tracking: Option<BatchTrackingReport>,
}

/// Read an import bundle from disk
pub fn read_bundle(path: &Path) -> Result<ImportBundle> {
    if !path.exists() {
        return Err(Error::Validation(format!(
            "Import file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file {}", path.display()))?;
    let bundle: ImportBundle = serde_json::from_str(&content)
        .with_context(|| format!("Invalid import bundle {}", path.display()))?;
    Ok(bundle)
}

/// Import a bundle; new content is auto-tracked unless `track` is false
pub async fn cmd_import(
    config: &Config,
    db: &MetaDb,
    bundle: &ImportBundle,
    track: bool,
) -> Result<ImportStats> {
    info!(
        content = bundle.content.len(),
        metrics = bundle.metrics.len(),
        "Importing bundle"
    );

    let mut stats = ImportStats::default();

    for group in &bundle.groups {
        for integration_id in &group.integration_ids {
            db.add_group_integration(&group.org_id, &group.group_id, integration_id)
                .await?;
            stats.group_links += 1;
        }
    }

    let mut created_ids = Vec::new();
    for record in &bundle.content {
        let item = ContentItem::new(
            record.id.clone(),
            record.org_id.clone(),
            record.integration_id.clone(),
            record.format,
            record.caption.clone(),
            record.hashtags.clone(),
            record.published_at,
        );
        if db.insert_content_item(&item).await? {
            stats.content_created += 1;
            created_ids.push(item.id);
        } else {
            stats.content_existing += 1;
        }
    }

    let mut updated_ids: Vec<&str> = Vec::new();
    for record in &bundle.metrics {
        let metric = DailyMetric {
            content_id: record.content_id.clone(),
            metric_date: record.date.format("%Y-%m-%d").to_string(),
            impressions: record.impressions,
            reach: record.reach,
            reactions: record.reactions,
            comments: record.comments,
            shares: record.shares,
            video_views: record.video_views,
            clicks: record.clicks,
        };
        match db.upsert_daily_metric(&metric).await {
            Ok(()) => {
                stats.metrics_written += 1;
                if !updated_ids.contains(&record.content_id.as_str()) {
                    updated_ids.push(&record.content_id);
                }
            }
            Err(e) => {
                warn!(content_id = %record.content_id, "Failed to write metric: {}", e);
                stats.metrics_failed += 1;
            }
        }
    }

    let mut links: Vec<String> = Vec::new();
    for content_id in updated_ids {
        for link in db.list_tracking_links(content_id).await? {
            if !links.contains(&link) {
                links.push(link);
            }
        }
    }
    for link in &links {
        match recompute_variant_metrics(db, link).await {
            Ok(_) => stats.variants_refreshed += 1,
            Err(e) => warn!(experiment_variant_id = %link, "Failed to refresh variant metrics: {}", e),
        }
    }

    if track && !created_ids.is_empty() {
        let tracker = AutoTracker::new(db, config);
        stats.tracking = Some(tracker.track_content_batch(&created_ids).await);
    }

    Ok(stats)
}

/// Print import statistics
pub fn print_import_stats(stats: &ImportStats) {
    println!("\n📥 Import Complete\n");
    println!("  Content created: {}", stats.content_created);
    println!("  Content already present: {}", stats.content_existing);
    println!("  Metric rows written: {}", stats.metrics_written);
    if stats.metrics_failed > 0 {
        println!("  Metric rows failed: {}", stats.metrics_failed);
    }
    if stats.group_links > 0 {
        println!("  Group links: {}", stats.group_links);
    }
    if stats.variants_refreshed > 0 {
        println!("  Variant aggregates refreshed: {}", stats.variants_refreshed);
    }
    if let Some(tracking) = &stats.tracking {
        println!(
            "  Auto-tracked: {} item(s) into {} variant(s)",
            tracking.items_processed, tracking.tracked
        );
        if !tracking.failures.is_empty() {
            println!("  Tracking failures: {}", tracking.failures.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{create_experiment, CreateExperiment};
    use crate::meta::test_support::{at, seed_content, setup_test_db};
    use crate::meta::{ContentFilters, MetricsStore, Playbook, PlaybookVariant};
    use crate::models::{Evidence, Recipe, SuccessMetric, VariantType};
    use std::io::Write;

    const BUNDLE: &str = r##"{
        "content": [
            {"id": "c1", "org_id": "org", "integration_id": "page-1", "format": "reel",
             "caption": "Stop scrolling now!", "hashtags": ["#Gym"],
             "published_at": "2024-03-04T19:00:00Z"},
            {"id": "c2", "org_id": "org", "integration_id": "page-1", "format": "post",
             "published_at": "2024-03-05T09:00:00Z"}
        ],
        "metrics": [
            {"content_id": "c1", "date": "2024-03-04", "reach": 100, "reactions": 5},
            {"content_id": "ghost", "date": "2024-03-04", "reach": 1}
        ],
        "groups": [{"org_id": "org", "group_id": "g1", "integration_ids": ["page-1"]}]
    }"##;

    #[tokio::test]
    async fn test_import_bundle() {
        let (db, _tmp) = setup_test_db().await;
        let bundle: ImportBundle = serde_json::from_str(BUNDLE).unwrap();

        let stats = cmd_import(&Config::default(), &db, &bundle, true).await.unwrap();
        assert_eq!(stats.content_created, 2);
        assert_eq!(stats.metrics_written, 1);
        assert_eq!(stats.metrics_failed, 1);
        assert_eq!(stats.group_links, 1);
        assert_eq!(stats.tracking.as_ref().unwrap().items_processed, 2);

        let items = db
            .fetch_content_items("org", &ContentFilters::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].hashtags(), vec!["gym".to_string()]);

        let again = cmd_import(&Config::default(), &db, &bundle, true).await.unwrap();
        assert_eq!(again.content_created, 0);
        assert_eq!(again.content_existing, 2);
        assert!(again.tracking.is_none());
    }

    #[tokio::test]
    async fn test_new_metrics_refresh_tracked_variants() {
        let (db, _tmp) = setup_test_db().await;
        seed_content(&db, "c1", "org", ContentFormat::Reel, None, &[], at(2024, 3, 4, 9), Some(100), 5).await;

        let playbook = Playbook::new("org".to_string(), None, ContentFormat::Reel, &Recipe::default(), &Evidence::default(), 0.0).unwrap();
        db.insert_playbook(&playbook, &[]).await.unwrap();
        let variants: Vec<PlaybookVariant> = (0..2)
            .map(|i| PlaybookVariant::new(playbook.id.clone(), format!("v{i}"), VariantType::Hook, &Recipe::default(), String::new(), i).unwrap())
            .collect();
        db.replace_variants(&playbook.id, &variants).await.unwrap();
        let detail = create_experiment(
            &db,
            &CreateExperiment {
                org_id: "org".to_string(),
                playbook_id: playbook.id.clone(),
                name: "Refresh".to_string(),
                description: None,
                success_metric: SuccessMetric::Reach,
                variant_ids: variants.iter().map(|v| v.id.clone()).collect(),
            },
        )
        .await
        .unwrap();
        let link = detail.variants[0].link.id.clone();
        db.track_content(&link, "c1", 0.5).await.unwrap();
        recompute_variant_metrics(&db, &link).await.unwrap();

        let bundle: ImportBundle = serde_json::from_str(
            r#"{"metrics": [{"content_id": "c1", "date": "2024-03-05", "reach": 300, "reactions": 15}]}"#,
        )
        .unwrap();
        let stats = cmd_import(&Config::default(), &db, &bundle, true).await.unwrap();
        assert_eq!(stats.variants_refreshed, 1);

        let refreshed = db.get_experiment_variant(&link).await.unwrap().unwrap();
        assert_eq!(refreshed.total_reach, 400);
        assert_eq!(refreshed.total_engagement, 20);
    }

    #[test]
    fn test_read_bundle_names_file_on_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        match read_bundle(file.path()).unwrap_err() {
            Error::Other(message) => {
                assert!(message.contains("Invalid import bundle"));
                assert!(message.contains(&file.path().display().to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
