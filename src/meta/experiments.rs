//! Experiment, experiment variant and tracked content storage

use super::{format_timestamp, MetaDb};
use crate::error::Result;
use crate::models::{ExperimentStatus, SuccessMetric, VariantAggregate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

/// An A/B/C test bound to one playbook
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub org_id: String,
    pub playbook_id: String,
    pub name: String,
    pub description: Option<String>,
    pub success_metric: String,
    pub status: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub winner_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl Experiment {
    pub fn new(
        org_id: String,
        playbook_id: String,
        name: String,
        description: Option<String>,
        success_metric: SuccessMetric,
    ) -> Self {
        let now = format_timestamp(Utc::now());
        Self {
            id: Uuid::new_v4().to_string(),
            org_id,
            playbook_id,
            name,
            description,
            success_metric: success_metric.to_string(),
            status: ExperimentStatus::Draft.to_string(),
            start_date: None,
            end_date: None,
            winner_id: None,
            created_at: now.clone(),
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn get_status(&self) -> Result<ExperimentStatus> {
        self.status.parse()
    }

    pub fn get_success_metric(&self) -> Result<SuccessMetric> {
        self.success_metric.parse()
    }
}

/// Link between an experiment and one playbook variant, with rolling aggregates
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExperimentVariant {
    pub id: String,
    pub experiment_id: String,
    pub playbook_variant_id: String,
    pub position: i64,
    pub total_reach: i64,
    pub total_engagement: i64,
    pub content_count: i64,
    pub avg_engagement_rate: f64,
    pub updated_at: String,
}

impl ExperimentVariant {
    pub fn new(experiment_id: String, playbook_variant_id: String, position: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            experiment_id,
            playbook_variant_id,
            position,
            total_reach: 0,
            total_engagement: 0,
            content_count: 0,
            avg_engagement_rate: 0.0,
            updated_at: format_timestamp(Utc::now()),
        }
    }

    pub fn aggregate(&self) -> VariantAggregate {
        VariantAggregate {
            content_count: self.content_count,
            total_reach: self.total_reach,
            total_engagement: self.total_engagement,
            avg_engagement_rate: self.avg_engagement_rate,
        }
    }
}

/// Content attributed to an experiment variant
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrackedContent {
    pub id: String,
    pub experiment_variant_id: String,
    pub content_id: String,
    pub match_score: f64,
    pub tracked_at: String,
    pub deleted_at: Option<String>,
}

/// One (experiment variant, playbook variant, playbook) triple eligible for tracking
#[derive(Debug, Clone, FromRow)]
pub struct TrackingCandidate {
    pub experiment_id: String,
    pub experiment_status: String,
    pub experiment_variant_id: String,
    pub playbook_variant_id: String,
    pub variant_recipe_json: String,
    pub playbook_id: String,
    pub playbook_format: String,
    pub playbook_recipe_json: String,
}

impl MetaDb {
    // ===== Experiment Operations =====

    /// Insert an experiment and its variant links in one transaction
    pub async fn insert_experiment(
        &self,
        experiment: &Experiment,
        variants: &[ExperimentVariant],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO experiments (id, org_id, playbook_id, name, description, success_metric, status, start_date, end_date, winner_id, created_at, updated_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&experiment.id)
        .bind(&experiment.org_id)
        .bind(&experiment.playbook_id)
        .bind(&experiment.name)
        .bind(&experiment.description)
        .bind(&experiment.success_metric)
        .bind(&experiment.status)
        .bind(&experiment.start_date)
        .bind(&experiment.end_date)
        .bind(&experiment.winner_id)
        .bind(&experiment.created_at)
        .bind(&experiment.updated_at)
        .bind(&experiment.deleted_at)
        .execute(&mut *tx)
        .await?;

        for variant in variants {
            sqlx::query(
                r#"
                INSERT INTO experiment_variants (id, experiment_id, playbook_variant_id, position, total_reach, total_engagement, content_count, avg_engagement_rate, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&variant.id)
            .bind(&variant.experiment_id)
            .bind(&variant.playbook_variant_id)
            .bind(variant.position)
            .bind(variant.total_reach)
            .bind(variant.total_engagement)
            .bind(variant.content_count)
            .bind(variant.avg_engagement_rate)
            .bind(&variant.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(experiment_id = %experiment.id, variants = variants.len(), "Inserted experiment");
        Ok(())
    }

    /// Get a live experiment by ID
    pub async fn get_experiment(&self, id: &str) -> Result<Option<Experiment>> {
        let experiment = sqlx::query_as::<_, Experiment>(
            "SELECT * FROM experiments WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(experiment)
    }

    /// List an organization's live experiments, newest first
    pub async fn list_experiments(&self, org_id: &str) -> Result<Vec<Experiment>> {
        let experiments = sqlx::query_as::<_, Experiment>(
            "SELECT * FROM experiments WHERE org_id = ? AND deleted_at IS NULL ORDER BY created_at DESC, id",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(experiments)
    }

    /// Move an experiment from `from` to `to` if it is still in `from`.
    ///
    /// Start/end dates are only written when currently unset. Returns false
    /// when the experiment is missing, deleted, or in another status.
    pub async fn transition_experiment(
        &self,
        id: &str,
        from: ExperimentStatus,
        to: ExperimentStatus,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE experiments SET
                status = ?,
                start_date = COALESCE(start_date, ?),
                end_date = COALESCE(end_date, ?),
                updated_at = ?
            WHERE id = ? AND status = ? AND deleted_at IS NULL
            "#,
        )
        .bind(to.to_string())
        .bind(start_date.map(format_timestamp))
        .bind(end_date.map(format_timestamp))
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .bind(from.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the operator's winner choice
    pub async fn set_experiment_winner(&self, id: &str, winner_id: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE experiments SET winner_id = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(winner_id)
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete an experiment. Returns false if it was not live.
    pub async fn soft_delete_experiment(&self, id: &str) -> Result<bool> {
        let now = format_timestamp(Utc::now());
        let result = sqlx::query(
            "UPDATE experiments SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Variant links of an experiment, in creation order
    pub async fn list_experiment_variants(
        &self,
        experiment_id: &str,
    ) -> Result<Vec<ExperimentVariant>> {
        let variants = sqlx::query_as::<_, ExperimentVariant>(
            "SELECT * FROM experiment_variants WHERE experiment_id = ? ORDER BY position",
        )
        .bind(experiment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(variants)
    }

    /// Get an experiment variant by ID
    pub async fn get_experiment_variant(&self, id: &str) -> Result<Option<ExperimentVariant>> {
        let variant = sqlx::query_as::<_, ExperimentVariant>(
            "SELECT * FROM experiment_variants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(variant)
    }

    /// Store recomputed aggregates for an experiment variant
    pub async fn update_variant_aggregate(
        &self,
        experiment_variant_id: &str,
        aggregate: &VariantAggregate,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE experiment_variants SET
                total_reach = ?,
                total_engagement = ?,
                content_count = ?,
                avg_engagement_rate = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(aggregate.total_reach)
        .bind(aggregate.total_engagement)
        .bind(aggregate.content_count)
        .bind(aggregate.avg_engagement_rate)
        .bind(format_timestamp(Utc::now()))
        .bind(experiment_variant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Tracking Operations =====

    /// Every variant triple of the organization's experiments that still
    /// accept tracked content, grouped by experiment in creation order
    pub async fn list_tracking_candidates(&self, org_id: &str) -> Result<Vec<TrackingCandidate>> {
        let candidates = sqlx::query_as::<_, TrackingCandidate>(
            r#"
            SELECT
                e.id AS experiment_id,
                e.status AS experiment_status,
                ev.id AS experiment_variant_id,
                pv.id AS playbook_variant_id,
                pv.recipe_json AS variant_recipe_json,
                p.id AS playbook_id,
                p.format AS playbook_format,
                p.recipe_json AS playbook_recipe_json
            FROM experiments e
            JOIN experiment_variants ev ON ev.experiment_id = e.id
            JOIN playbook_variants pv ON pv.id = ev.playbook_variant_id
            JOIN playbooks p ON p.id = e.playbook_id
            WHERE e.org_id = ?
              AND e.deleted_at IS NULL
              AND e.status IN ('draft', 'active', 'completed')
            ORDER BY e.created_at, e.id, ev.position
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(candidates)
    }

    /// Attribute content to an experiment variant.
    ///
    /// Returns false when the pair is already tracked; a previously
    /// untracked pair is revived.
    pub async fn track_content(
        &self,
        experiment_variant_id: &str,
        content_id: &str,
        match_score: f64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO experiment_tracked_content (id, experiment_variant_id, content_id, match_score, tracked_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, NULL)
            ON CONFLICT(experiment_variant_id, content_id) DO UPDATE SET
                match_score = excluded.match_score,
                tracked_at = excluded.tracked_at,
                deleted_at = NULL
            WHERE experiment_tracked_content.deleted_at IS NOT NULL
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(experiment_variant_id)
        .bind(content_id)
        .bind(match_score)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-remove a tracked pair. Returns false if it was not tracked.
    pub async fn untrack_content(&self, experiment_variant_id: &str, content_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE experiment_tracked_content SET deleted_at = ?
            WHERE experiment_variant_id = ? AND content_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(format_timestamp(Utc::now()))
        .bind(experiment_variant_id)
        .bind(content_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether the pair is currently tracked
    pub async fn is_tracked(&self, experiment_variant_id: &str, content_id: &str) -> Result<bool> {
        let found: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT 1 FROM experiment_tracked_content
            WHERE experiment_variant_id = ? AND content_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(experiment_variant_id)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Experiment variant links currently tracking a content item
    pub async fn list_tracking_links(&self, content_id: &str) -> Result<Vec<String>> {
        let links: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT experiment_variant_id FROM experiment_tracked_content
            WHERE content_id = ? AND deleted_at IS NULL
            ORDER BY tracked_at, id
            "#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links.into_iter().map(|(id,)| id).collect())
    }

    /// Live tracked content of an experiment variant, oldest first
    pub async fn list_tracked_content(
        &self,
        experiment_variant_id: &str,
    ) -> Result<Vec<TrackedContent>> {
        let tracked = sqlx::query_as::<_, TrackedContent>(
            r#"
            SELECT * FROM experiment_tracked_content
            WHERE experiment_variant_id = ? AND deleted_at IS NULL
            ORDER BY tracked_at, id
            "#,
        )
        .bind(experiment_variant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tracked)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{Playbook, PlaybookVariant};
    use super::*;
    use crate::models::{ContentFormat, Evidence, Recipe, VariantType};

    async fn seed_experiment(db: &MetaDb) -> (Experiment, Vec<ExperimentVariant>) {
        let playbook = Playbook::new(
            "org".to_string(),
            None,
            ContentFormat::Post,
            &Recipe::default(),
            &Evidence::default(),
            0.0,
        )
        .unwrap();
        db.insert_playbook(&playbook, &[]).await.unwrap();

        let variants: Vec<PlaybookVariant> = (0..2)
            .map(|i| {
                PlaybookVariant::new(
                    playbook.id.clone(),
                    format!("v{i}"),
                    VariantType::Time,
                    &Recipe::default(),
                    "desc".to_string(),
                    i,
                )
                .unwrap()
            })
            .collect();
        db.replace_variants(&playbook.id, &variants).await.unwrap();

        let experiment = Experiment::new(
            "org".to_string(),
            playbook.id.clone(),
            "Morning vs evening".to_string(),
            None,
            SuccessMetric::Reach,
        );
        let links: Vec<ExperimentVariant> = variants
            .iter()
            .enumerate()
            .map(|(i, v)| ExperimentVariant::new(experiment.id.clone(), v.id.clone(), i as i64))
            .collect();
        db.insert_experiment(&experiment, &links).await.unwrap();
        (experiment, links)
    }

    #[tokio::test]
    async fn test_transition_is_conditional() {
        let (db, _tmp) = setup_test_db().await;
        let (experiment, _) = seed_experiment(&db).await;

        let started = at(2024, 4, 1, 12);
        assert!(db
            .transition_experiment(
                &experiment.id,
                ExperimentStatus::Draft,
                ExperimentStatus::Active,
                Some(started),
                None,
            )
            .await
            .unwrap());

        // Second attempt from draft no longer matches
        assert!(!db
            .transition_experiment(
                &experiment.id,
                ExperimentStatus::Draft,
                ExperimentStatus::Active,
                Some(at(2024, 5, 1, 12)),
                None,
            )
            .await
            .unwrap());

        let loaded = db.get_experiment(&experiment.id).await.unwrap().unwrap();
        assert_eq!(loaded.get_status().unwrap(), ExperimentStatus::Active);
        assert_eq!(loaded.start_date.as_deref(), Some("2024-04-01T12:00:00Z"));
    }

    #[tokio::test]
    async fn test_tracking_is_idempotent_and_revivable() {
        let (db, _tmp) = setup_test_db().await;
        let (_, links) = seed_experiment(&db).await;
        seed_content(&db, "c1", "org", ContentFormat::Post, None, &[], at(2024, 4, 2, 9), Some(10), 1).await;

        let ev = &links[0].id;
        assert!(db.track_content(ev, "c1", 0.8).await.unwrap());
        assert!(!db.track_content(ev, "c1", 0.9).await.unwrap());
        assert_eq!(db.list_tracked_content(ev).await.unwrap().len(), 1);

        assert!(db.untrack_content(ev, "c1").await.unwrap());
        assert!(!db.is_tracked(ev, "c1").await.unwrap());
        assert!(db.list_tracked_content(ev).await.unwrap().is_empty());

        assert!(db.track_content(ev, "c1", 0.7).await.unwrap());
        let tracked = db.list_tracked_content(ev).await.unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].match_score, 0.7);
    }

    #[tokio::test]
    async fn test_tracking_candidates_skip_deleted_experiments() {
        let (db, _tmp) = setup_test_db().await;
        let (experiment, _) = seed_experiment(&db).await;

        let candidates = db.list_tracking_candidates("org").await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.experiment_id == experiment.id));
        assert_eq!(candidates[0].playbook_format, "post");

        assert!(db.soft_delete_experiment(&experiment.id).await.unwrap());
        assert!(db.list_tracking_candidates("org").await.unwrap().is_empty());
        assert!(db.get_experiment(&experiment.id).await.unwrap().is_none());
        assert!(db.list_experiments("org").await.unwrap().is_empty());
    }
}
