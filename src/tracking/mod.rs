//! Auto-tracking of new content into experiments
//!
//! Each content item is scored against every variant of the organization's
//! experiments. Per experiment, the best variant scoring above the match
//! threshold claims the item and has its aggregates recomputed. Failures are
//! collected per experiment and item instead of aborting the pass.

pub mod aggregate;
pub mod score;

pub use aggregate::recompute_variant_metrics;
pub use score::{score_match, ContentSignals, DayPart, MatchBreakdown};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::{MetaDb, TrackingCandidate};
use crate::models::{ContentFormat, Recipe};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A content item attributed to an experiment variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedMatch {
    pub experiment_id: String,
    pub experiment_variant_id: String,
    pub playbook_variant_id: String,
    pub score: f64,
}

/// A failure recovered during tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingFailure {
    pub content_id: String,
    /// `None` when the item itself could not be processed
    pub experiment_id: Option<String>,
    pub reason: String,
}

/// Outcome of tracking one content item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingReport {
    pub content_id: String,
    pub experiments_evaluated: usize,
    pub tracked: Vec<TrackedMatch>,
    /// Experiments whose best variant already had this item
    pub skipped_existing: usize,
    pub failures: Vec<TrackingFailure>,
}

/// Outcome of tracking many content items
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchTrackingReport {
    pub items_processed: usize,
    pub items_failed: usize,
    pub tracked: usize,
    pub skipped_existing: usize,
    pub reports: Vec<TrackingReport>,
    pub failures: Vec<TrackingFailure>,
}

impl BatchTrackingReport {
    /// Fold one item's result into the batch
    pub fn record(&mut self, content_id: &str, result: Result<TrackingReport>) {
        self.items_processed += 1;
        match result {
            Ok(report) => {
                self.tracked += report.tracked.len();
                self.skipped_existing += report.skipped_existing;
                self.failures.extend(report.failures.iter().cloned());
                self.reports.push(report);
            }
            Err(e) => {
                warn!(content_id, "Tracking failed: {}", e);
                self.items_failed += 1;
                self.failures.push(TrackingFailure {
                    content_id: content_id.to_string(),
                    experiment_id: None,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// A scored variant of one experiment
struct ScoredCandidate<'c> {
    candidate: &'c TrackingCandidate,
    score: f64,
}

/// Matches content to experiment variants
pub struct AutoTracker<'a> {
    db: &'a MetaDb,
    config: &'a Config,
}

impl<'a> AutoTracker<'a> {
    pub fn new(db: &'a MetaDb, config: &'a Config) -> Self {
        Self { db, config }
    }

    /// Track one content item into every experiment it matches
    pub async fn track_content(&self, content_id: &str) -> Result<TrackingReport> {
        let item = self
            .db
            .get_content_item(content_id)
            .await?
            .ok_or_else(|| Error::ContentNotFound(content_id.to_string()))?;
        let signals = ContentSignals::from_item(&item, self.config.extraction.local_offset())?;

        let candidates = self.db.list_tracking_candidates(&item.org_id).await?;

        let mut report = TrackingReport {
            content_id: content_id.to_string(),
            ..Default::default()
        };

        for group in candidates.chunk_by(|a, b| a.experiment_id == b.experiment_id) {
            let experiment_id = &group[0].experiment_id;
            report.experiments_evaluated += 1;

            match self.track_into_experiment(&signals, content_id, group).await {
                Ok(Some(Outcome::Tracked(tracked))) => report.tracked.push(tracked),
                Ok(Some(Outcome::AlreadyTracked)) => report.skipped_existing += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(content_id, experiment_id = %experiment_id, "Tracking failed: {}", e);
                    report.failures.push(TrackingFailure {
                        content_id: content_id.to_string(),
                        experiment_id: Some(experiment_id.clone()),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            content_id,
            evaluated = report.experiments_evaluated,
            tracked = report.tracked.len(),
            skipped = report.skipped_existing,
            failed = report.failures.len(),
            "Tracked content"
        );
        Ok(report)
    }

    /// Track many items; one item's failure never stops the rest
    pub async fn track_content_batch(&self, content_ids: &[String]) -> BatchTrackingReport {
        let mut batch = BatchTrackingReport::default();
        for content_id in content_ids {
            let result = self.track_content(content_id).await;
            batch.record(content_id, result);
        }
        batch
    }

    async fn track_into_experiment(
        &self,
        signals: &ContentSignals,
        content_id: &str,
        group: &[TrackingCandidate],
    ) -> Result<Option<Outcome>> {
        let mut best: Option<ScoredCandidate> = None;
        for candidate in group {
            let score = self.score_candidate(signals, candidate)?;
            debug!(
                content_id,
                experiment_variant_id = %candidate.experiment_variant_id,
                score,
                "Scored variant"
            );
            if score <= self.config.tracking.match_threshold {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(ScoredCandidate { candidate, score });
            }
        }

        let Some(best) = best else {
            return Ok(None);
        };

        let inserted = self
            .db
            .track_content(&best.candidate.experiment_variant_id, content_id, best.score)
            .await?;
        if !inserted {
            return Ok(Some(Outcome::AlreadyTracked));
        }

        recompute_variant_metrics(self.db, &best.candidate.experiment_variant_id).await?;

        Ok(Some(Outcome::Tracked(TrackedMatch {
            experiment_id: best.candidate.experiment_id.clone(),
            experiment_variant_id: best.candidate.experiment_variant_id.clone(),
            playbook_variant_id: best.candidate.playbook_variant_id.clone(),
            score: best.score,
        })))
    }

    fn score_candidate(&self, signals: &ContentSignals, candidate: &TrackingCandidate) -> Result<f64> {
        let format: ContentFormat = candidate.playbook_format.parse()?;
        let playbook_recipe = Recipe::from_json(
            &format!("playbook {}", candidate.playbook_id),
            &candidate.playbook_recipe_json,
        )?;
        let variant_recipe = Recipe::from_json(
            &format!("variant {}", candidate.playbook_variant_id),
            &candidate.variant_recipe_json,
        )?;

        let breakdown = score_match(
            signals,
            format,
            &playbook_recipe,
            &variant_recipe,
            &self.config.tracking.weights,
        );
        Ok(breakdown.total)
    }
}

enum Outcome {
    Tracked(TrackedMatch),
    AlreadyTracked,
}

/// Track one content item with the given configuration
pub async fn track_content(db: &MetaDb, config: &Config, content_id: &str) -> Result<TrackingReport> {
    AutoTracker::new(db, config).track_content(content_id).await
}

/// Track many content items, collecting per-item results
pub async fn track_content_batch(
    db: &MetaDb,
    config: &Config,
    content_ids: &[String],
) -> BatchTrackingReport {
    AutoTracker::new(db, config)
        .track_content_batch(content_ids)
        .await
}

/// Remove a content item from an experiment variant and recompute its metrics.
/// Returns false when the pair was not tracked.
pub async fn untrack(db: &MetaDb, experiment_variant_id: &str, content_id: &str) -> Result<bool> {
    if db.get_experiment_variant(experiment_variant_id).await?.is_none() {
        return Err(Error::VariantNotFound(experiment_variant_id.to_string()));
    }

    let removed = db.untrack_content(experiment_variant_id, content_id).await?;
    if removed {
        recompute_variant_metrics(db, experiment_variant_id).await?;
        info!(experiment_variant_id, content_id, "Untracked content");
    }
    Ok(removed)
}
