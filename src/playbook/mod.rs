//! Playbook generation
//!
//! Ranks an organization's recent content and cuts it to a winner set. For
//! every format with enough winners, extracts a recipe from them, scores its
//! evidence and persists the playbook.

use crate::config::Config;
use crate::error::Result;
use crate::evidence::score_winners;
use crate::extract::PatternExtractor;
use crate::meta::{MetaDb, Playbook};
use crate::models::ContentFormat;
use crate::rank::{ContentRanker, RankQuery};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Parameters of one generation run
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub org_id: String,
    /// Falls back to `generation.lookback_days`
    pub lookback_days: Option<u32>,
    pub group_id: Option<String>,
    pub integration_id: Option<String>,
    pub format: Option<ContentFormat>,
    pub now: DateTime<Utc>,
}

impl GenerateRequest {
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            lookback_days: None,
            group_id: None,
            integration_id: None,
            format: None,
            now: Utc::now(),
        }
    }
}

/// Builds playbooks from ranked content
pub struct PlaybookBuilder<'a> {
    db: &'a MetaDb,
    config: &'a Config,
}

impl<'a> PlaybookBuilder<'a> {
    pub fn new(db: &'a MetaDb, config: &'a Config) -> Self {
        Self { db, config }
    }

    /// Generate playbooks and return their ids. Too little data yields an empty list.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<Vec<String>> {
        let generation = &self.config.generation;
        let ranker = ContentRanker::new(generation);
        let extractor = PatternExtractor::new(&self.config.extraction)?;

        let query = RankQuery {
            org_id: request.org_id.clone(),
            lookback_days: request.lookback_days.unwrap_or(generation.lookback_days),
            group_id: request.group_id.clone(),
            integration_id: request.integration_id.clone(),
            format: request.format,
            now: request.now,
        };

        let groups = ranker.top_content(self.db, &query).await?;
        let mut created = Vec::new();

        for group in groups {
            if group.winners.len() < generation.min_content_items {
                debug!(
                    format = %group.format,
                    winners = group.winners.len(),
                    required = generation.min_content_items,
                    "Not enough content for a playbook"
                );
                continue;
            }

            let recipe = extractor.extract(&group.winners);
            let scored = score_winners(&group.winners);
            let source_ids: Vec<String> =
                group.winners.iter().map(|w| w.content_id.clone()).collect();

            let playbook = Playbook::new(
                request.org_id.clone(),
                request.group_id.clone(),
                group.format,
                &recipe,
                &scored.evidence,
                scored.consistency_score,
            )?;
            self.db.insert_playbook(&playbook, &source_ids).await?;

            info!(
                playbook_id = %playbook.id,
                format = %group.format,
                winners = source_ids.len(),
                consistency = scored.consistency_score,
                "Created playbook"
            );
            created.push(playbook.id);
        }

        Ok(created)
    }
}

/// Generate playbooks for an organization
pub async fn generate_playbooks(
    db: &MetaDb,
    config: &Config,
    request: &GenerateRequest,
) -> Result<Vec<String>> {
    PlaybookBuilder::new(db, config).generate(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::test_support::*;

    fn request() -> GenerateRequest {
        let mut request = GenerateRequest::new("org");
        request.now = at(2024, 3, 31, 12);
        request
    }

    #[tokio::test]
    async fn test_generate_single_playbook() {
        let (db, _tmp) = setup_test_db().await;
        let config = Config::default();

        seed_content(&db, "a", "org", ContentFormat::Reel, Some("Stop scrolling right now! Link in bio"), &["#Fitness", "#gym"], at(2024, 3, 4, 9), Some(1000), 65).await;
        seed_content(&db, "b", "org", ContentFormat::Reel, Some("Want abs in 30 days? Comment below"), &["fitness"], at(2024, 3, 5, 9), Some(1200), 144).await;
        seed_content(&db, "c", "org", ContentFormat::Reel, None, &["gym", "fitness"], at(2024, 3, 6, 18), Some(900), 54).await;

        let ids = generate_playbooks(&db, &config, &request()).await.unwrap();
        assert_eq!(ids.len(), 1);

        let playbook = db.get_playbook(&ids[0]).await.unwrap().unwrap();
        assert_eq!(playbook.get_format().unwrap(), ContentFormat::Reel);
        assert_eq!(playbook.consistency_score, 66.67);

        let evidence = playbook.evidence().unwrap();
        assert_eq!(evidence.content_count, 3);
        assert_eq!(evidence.median_reach, 1000.0);

        let recipe = playbook.recipe().unwrap();
        assert_eq!(
            recipe.hooks,
            vec!["Want abs in 30 days?".to_string(), "Stop scrolling right now!".to_string()]
        );
        assert_eq!(recipe.cta_patterns, vec!["Comment below".to_string(), "Link in bio".to_string()]);
        assert_eq!(recipe.hashtag_bucket, vec!["fitness".to_string(), "gym".to_string()]);
        assert_eq!(recipe.best_hours, vec![9, 18]);

        assert_eq!(
            db.list_playbook_sources(&ids[0]).await.unwrap(),
            vec!["b".to_string(), "a".to_string(), "c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_small_group_skipped_without_blocking_others() {
        let (db, _tmp) = setup_test_db().await;
        let config = Config::default();

        // 20 items keep 5 winners: both posts, then the three best reels
        for i in 0..18u32 {
            seed_content(&db, &format!("r{i}"), "org", ContentFormat::Reel, None, &[], at(2024, 3, 10 + i, 9), Some(1000), 10 + i as i64).await;
        }
        seed_content(&db, "p0", "org", ContentFormat::Post, None, &[], at(2024, 3, 10, 9), Some(100), 10).await;
        seed_content(&db, "p1", "org", ContentFormat::Post, None, &[], at(2024, 3, 11, 9), Some(100), 12).await;

        let ids = generate_playbooks(&db, &config, &request()).await.unwrap();
        assert_eq!(ids.len(), 1);
        let playbook = db.get_playbook(&ids[0]).await.unwrap().unwrap();
        assert_eq!(playbook.get_format().unwrap(), ContentFormat::Reel);
        assert_eq!(
            db.list_playbook_sources(&ids[0]).await.unwrap(),
            vec!["r17".to_string(), "r16".to_string(), "r15".to_string()]
        );
    }

    #[tokio::test]
    async fn test_minimum_applies_to_winners() {
        let (db, _tmp) = setup_test_db().await;
        let mut config = Config::default();
        config.generation.min_content_items = 5;

        // 8 qualifying reels keep only 3 winners
        for i in 0..8u32 {
            seed_content(&db, &format!("a{i}"), "org", ContentFormat::Reel, None, &[], at(2024, 3, 10 + i, 9), Some(1000), 10 + i as i64).await;
        }
        let ids = generate_playbooks(&db, &config, &request()).await.unwrap();
        assert!(ids.is_empty());

        // 20 reels keep 5
        for i in 0..12u32 {
            seed_content(&db, &format!("b{i}"), "org", ContentFormat::Reel, None, &[], at(2024, 3, 10 + i, 15), Some(1000), 30 + i as i64).await;
        }
        let ids = generate_playbooks(&db, &config, &request()).await.unwrap();
        assert_eq!(ids.len(), 1);
        let evidence = db.get_playbook(&ids[0]).await.unwrap().unwrap().evidence().unwrap();
        assert_eq!(evidence.content_count, 5);
        assert_eq!(db.list_playbook_sources(&ids[0]).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_no_content_returns_empty() {
        let (db, _tmp) = setup_test_db().await;
        let ids = generate_playbooks(&db, &Config::default(), &request()).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_silent_items_do_not_count_toward_minimum() {
        let (db, _tmp) = setup_test_db().await;
        seed_content(&db, "a", "org", ContentFormat::Story, None, &[], at(2024, 3, 10, 9), Some(100), 5).await;
        seed_content(&db, "b", "org", ContentFormat::Story, None, &[], at(2024, 3, 11, 9), Some(200), 5).await;
        seed_content(&db, "c", "org", ContentFormat::Story, None, &[], at(2024, 3, 12, 9), Some(0), 0).await;

        let ids = generate_playbooks(&db, &Config::default(), &request()).await.unwrap();
        assert!(ids.is_empty());
    }
}
