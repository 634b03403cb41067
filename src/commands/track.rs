//! Tracking commands: track, untrack and backfill

use crate::config::Config;
use crate::error::Result;
use crate::meta::MetaDb;
use crate::progress::add_progress_bar;
use crate::tracking::{untrack, AutoTracker, BatchTrackingReport, TrackingReport};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Result of an untrack request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UntrackResult {
    pub experiment_variant_id: String,
    pub content_id: String,
    pub removed: bool,
}

/// Track a single content item
pub async fn cmd_track(config: &Config, db: &MetaDb, content_id: &str) -> Result<TrackingReport> {
    AutoTracker::new(db, config).track_content(content_id).await
}

/// Remove a content item from an experiment variant
pub async fn cmd_untrack(
    db: &MetaDb,
    experiment_variant_id: &str,
    content_id: &str,
) -> Result<UntrackResult> {
    let removed = untrack(db, experiment_variant_id, content_id).await?;
    Ok(UntrackResult {
        experiment_variant_id: experiment_variant_id.to_string(),
        content_id: content_id.to_string(),
        removed,
    })
}

/// Run tracking over every content item of an organization
pub async fn cmd_backfill(config: &Config, db: &MetaDb, org_id: &str) -> Result<BatchTrackingReport> {
    let ids = db.list_content_ids(org_id).await?;
    info!(org_id, items = ids.len(), "Backfilling experiment tracking");

    let tracker = AutoTracker::new(db, config);
    let mut batch = BatchTrackingReport::default();

    let pb = add_progress_bar(ids.len() as u64);

    for content_id in &ids {
        pb.set_message(content_id.clone());
        let result = tracker.track_content(content_id).await;
        batch.record(content_id, result);
        pb.inc(1);
    }

    pb.finish_with_message("done");
    Ok(batch)
}

/// Print a single tracking report
pub fn print_tracking_report(report: &TrackingReport) {
    println!("\n📌 Tracking {}\n", report.content_id);
    println!("  Experiments evaluated: {}", report.experiments_evaluated);
    println!("  Already tracked: {}", report.skipped_existing);

    if report.tracked.is_empty() {
        println!("  No variant matched above the threshold.");
    }
    for tracked in &report.tracked {
        println!(
            "  ✓ Experiment {} → variant link {} (score {:.2})",
            tracked.experiment_id, tracked.experiment_variant_id, tracked.score
        );
    }
    for failure in &report.failures {
        println!(
            "  ✗ Experiment {}: {}",
            failure.experiment_id.as_deref().unwrap_or("-"),
            failure.reason
        );
    }
}

/// Print an untrack result
pub fn print_untrack_result(result: &UntrackResult) {
    if result.removed {
        println!(
            "✓ Untracked {} from {}",
            result.content_id, result.experiment_variant_id
        );
    } else {
        println!(
            "Content {} was not tracked on {}",
            result.content_id, result.experiment_variant_id
        );
    }
}

/// Print batch tracking statistics
pub fn print_batch_report(batch: &BatchTrackingReport) {
    println!("\n📌 Backfill Complete\n");
    println!("  Items processed: {}", batch.items_processed);
    println!("  Items failed: {}", batch.items_failed);
    println!("  New attributions: {}", batch.tracked);
    println!("  Already tracked: {}", batch.skipped_existing);

    if !batch.failures.is_empty() {
        println!("\n  Failures:");
        for failure in batch.failures.iter().take(10) {
            println!("    • {}: {}", failure.content_id, failure.reason);
        }
        if batch.failures.len() > 10 {
            println!("    ... and {} more", batch.failures.len() - 10);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::test_support::*;
    use crate::models::ContentFormat;

    #[tokio::test]
    async fn test_backfill_processes_every_item() {
        let (db, _tmp) = setup_test_db().await;
        seed_content(&db, "a", "org", ContentFormat::Post, None, &[], at(2024, 3, 1, 9), Some(10), 1).await;
        seed_content(&db, "b", "org", ContentFormat::Reel, None, &[], at(2024, 3, 2, 9), Some(10), 1).await;
        seed_content(&db, "x", "other", ContentFormat::Reel, None, &[], at(2024, 3, 2, 9), Some(10), 1).await;

        let batch = cmd_backfill(&Config::default(), &db, "org").await.unwrap();
        assert_eq!(batch.items_processed, 2);
        assert_eq!(batch.items_failed, 0);
        assert_eq!(batch.tracked, 0);
        assert_eq!(batch.reports.len(), 2);
    }
}
