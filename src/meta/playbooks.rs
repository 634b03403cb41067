//! Playbook and playbook variant storage

use super::{format_timestamp, MetaDb};
use crate::error::{Error, Result};
use crate::models::{ContentFormat, Evidence, Recipe, VariantType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

/// A persisted playbook
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Playbook {
    pub id: String,
    pub org_id: String,
    pub group_id: Option<String>,
    pub format: String,
    pub recipe_json: String,
    pub evidence_json: String,
    pub consistency_score: f64,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

impl Playbook {
    pub fn new(
        org_id: String,
        group_id: Option<String>,
        format: ContentFormat,
        recipe: &Recipe,
        evidence: &Evidence,
        consistency_score: f64,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            org_id,
            group_id,
            format: format.to_string(),
            recipe_json: recipe.to_json()?,
            evidence_json: serde_json::to_string(evidence)?,
            consistency_score,
            created_at: format_timestamp(Utc::now()),
            deleted_at: None,
        })
    }

    pub fn get_format(&self) -> Result<ContentFormat> {
        self.format.parse()
    }

    pub fn recipe(&self) -> Result<Recipe> {
        Recipe::from_json(&format!("playbook {}", self.id), &self.recipe_json)
    }

    pub fn evidence(&self) -> Result<Evidence> {
        Ok(serde_json::from_str(&self.evidence_json)?)
    }
}

/// A derived recipe to test against its playbook
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PlaybookVariant {
    pub id: String,
    pub playbook_id: String,
    pub name: String,
    pub variant_type: String,
    pub recipe_json: String,
    pub description: String,
    pub position: i64,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

impl PlaybookVariant {
    pub fn new(
        playbook_id: String,
        name: String,
        variant_type: VariantType,
        recipe: &Recipe,
        description: String,
        position: i64,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            playbook_id,
            name,
            variant_type: variant_type.to_string(),
            recipe_json: recipe.to_json()?,
            description,
            position,
            created_at: format_timestamp(Utc::now()),
            deleted_at: None,
        })
    }

    pub fn get_type(&self) -> Result<VariantType> {
        self.variant_type.parse()
    }

    pub fn recipe(&self) -> Result<Recipe> {
        Recipe::from_json(&format!("variant {}", self.id), &self.recipe_json)
    }
}

impl MetaDb {
    // ===== Playbook Operations =====

    /// Insert a playbook together with its ordered source content
    pub async fn insert_playbook(&self, playbook: &Playbook, source_ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO playbooks (id, org_id, group_id, format, recipe_json, evidence_json, consistency_score, created_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&playbook.id)
        .bind(&playbook.org_id)
        .bind(&playbook.group_id)
        .bind(&playbook.format)
        .bind(&playbook.recipe_json)
        .bind(&playbook.evidence_json)
        .bind(playbook.consistency_score)
        .bind(&playbook.created_at)
        .bind(&playbook.deleted_at)
        .execute(&mut *tx)
        .await?;

        for (position, content_id) in source_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO playbook_sources (playbook_id, content_id, position) VALUES (?, ?, ?)",
            )
            .bind(&playbook.id)
            .bind(content_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(playbook_id = %playbook.id, sources = source_ids.len(), "Inserted playbook");
        Ok(())
    }

    /// Get a live playbook by ID
    pub async fn get_playbook(&self, id: &str) -> Result<Option<Playbook>> {
        let playbook = sqlx::query_as::<_, Playbook>(
            "SELECT * FROM playbooks WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(playbook)
    }

    /// List an organization's live playbooks, newest first
    pub async fn list_playbooks(&self, org_id: &str) -> Result<Vec<Playbook>> {
        let playbooks = sqlx::query_as::<_, Playbook>(
            "SELECT * FROM playbooks WHERE org_id = ? AND deleted_at IS NULL ORDER BY created_at DESC, id",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(playbooks)
    }

    /// Source content IDs of a playbook in winner order
    pub async fn list_playbook_sources(&self, playbook_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT content_id FROM playbook_sources WHERE playbook_id = ? ORDER BY position",
        )
        .bind(playbook_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Soft-delete a playbook. Returns false if it was not live.
    pub async fn soft_delete_playbook(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE playbooks SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Variant Operations =====

    /// Swap the live variant set of a playbook for `variants`.
    ///
    /// Invalidation of the old set and insertion of the new one commit
    /// together, so readers never see two live sets.
    pub async fn replace_variants(
        &self,
        playbook_id: &str,
        variants: &[PlaybookVariant],
    ) -> Result<u64> {
        if let Some(stray) = variants.iter().find(|v| v.playbook_id != playbook_id) {
            return Err(Error::Validation(format!(
                "Variant {} belongs to playbook {}, not {}",
                stray.id, stray.playbook_id, playbook_id
            )));
        }

        let mut tx = self.pool.begin().await?;

        let invalidated = sqlx::query(
            "UPDATE playbook_variants SET deleted_at = ? WHERE playbook_id = ? AND deleted_at IS NULL",
        )
        .bind(format_timestamp(Utc::now()))
        .bind(playbook_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        for variant in variants {
            sqlx::query(
                r#"
                INSERT INTO playbook_variants (id, playbook_id, name, variant_type, recipe_json, description, position, created_at, deleted_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)
                "#,
            )
            .bind(&variant.id)
            .bind(&variant.playbook_id)
            .bind(&variant.name)
            .bind(&variant.variant_type)
            .bind(&variant.recipe_json)
            .bind(&variant.description)
            .bind(variant.position)
            .bind(&variant.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(playbook_id, invalidated, created = variants.len(), "Replaced variant set");
        Ok(invalidated)
    }

    /// The live variant set of a playbook, in generation order
    pub async fn list_live_variants(&self, playbook_id: &str) -> Result<Vec<PlaybookVariant>> {
        let variants = sqlx::query_as::<_, PlaybookVariant>(
            "SELECT * FROM playbook_variants WHERE playbook_id = ? AND deleted_at IS NULL ORDER BY position",
        )
        .bind(playbook_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(variants)
    }

    /// Get a variant by ID, including invalidated ones still referenced by experiments
    pub async fn get_variant(&self, id: &str) -> Result<Option<PlaybookVariant>> {
        let variant =
            sqlx::query_as::<_, PlaybookVariant>("SELECT * FROM playbook_variants WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(variant)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn sample_playbook(org: &str) -> Playbook {
        let recipe = Recipe {
            hooks: vec!["Stop scrolling now!".to_string()],
            ..Default::default()
        };
        let evidence = Evidence {
            median_reach: 1000.0,
            median_engagement: 65.0,
            engagement_rate: 6.5,
            content_count: 3,
        };
        Playbook::new(org.to_string(), None, ContentFormat::Reel, &recipe, &evidence, 66.67)
            .unwrap()
    }

    #[tokio::test]
    async fn test_playbook_round_trip_and_soft_delete() {
        let (db, _tmp) = setup_test_db().await;
        seed_content(&db, "c1", "org", ContentFormat::Reel, None, &[], at(2024, 3, 1, 9), Some(10), 1).await;
        seed_content(&db, "c2", "org", ContentFormat::Reel, None, &[], at(2024, 3, 2, 9), Some(10), 1).await;

        let playbook = sample_playbook("org");
        db.insert_playbook(&playbook, &["c2".to_string(), "c1".to_string()])
            .await
            .unwrap();

        let loaded = db.get_playbook(&playbook.id).await.unwrap().unwrap();
        assert_eq!(loaded.recipe().unwrap().hooks, vec!["Stop scrolling now!".to_string()]);
        assert_eq!(loaded.evidence().unwrap().content_count, 3);
        assert_eq!(
            db.list_playbook_sources(&playbook.id).await.unwrap(),
            vec!["c2".to_string(), "c1".to_string()]
        );

        assert!(db.soft_delete_playbook(&playbook.id).await.unwrap());
        assert!(!db.soft_delete_playbook(&playbook.id).await.unwrap());
        assert!(db.get_playbook(&playbook.id).await.unwrap().is_none());
        assert!(db.list_playbooks("org").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_variants_keeps_one_live_set() {
        let (db, _tmp) = setup_test_db().await;
        let playbook = sample_playbook("org");
        db.insert_playbook(&playbook, &[]).await.unwrap();

        let make_set = || {
            (0..2)
                .map(|i| {
                    PlaybookVariant::new(
                        playbook.id.clone(),
                        format!("v{i}"),
                        VariantType::Hook,
                        &Recipe::default(),
                        "desc".to_string(),
                        i,
                    )
                    .unwrap()
                })
                .collect::<Vec<_>>()
        };

        let first = make_set();
        assert_eq!(db.replace_variants(&playbook.id, &first).await.unwrap(), 0);
        let second = make_set();
        assert_eq!(db.replace_variants(&playbook.id, &second).await.unwrap(), 2);

        let live = db.list_live_variants(&playbook.id).await.unwrap();
        assert_eq!(live.len(), 2);
        assert!(live.iter().all(|v| second.iter().any(|s| s.id == v.id)));

        let old = db.get_variant(&first[0].id).await.unwrap().unwrap();
        assert!(old.deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_replace_variants_rejects_foreign_variant() {
        let (db, _tmp) = setup_test_db().await;
        let playbook = sample_playbook("org");
        db.insert_playbook(&playbook, &[]).await.unwrap();

        let stray = PlaybookVariant::new(
            "other".to_string(),
            "x".to_string(),
            VariantType::Time,
            &Recipe::default(),
            "desc".to_string(),
            0,
        )
        .unwrap();

        let err = db.replace_variants(&playbook.id, &[stray]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(db.list_live_variants(&playbook.id).await.unwrap().is_empty());
    }
}
