//! Top-content selection and ranking
//!
//! This module handles:
//! - Summing daily metrics over the lookback window
//! - Ordering content by engagement rate (or raw engagement without reach)
//! - Cutting the window down to its winner set, then grouping winners by format

use crate::config::GenerationConfig;
use crate::error::Result;
use crate::meta::{totals_by_content, ContentFilters, MetricsStore};
use crate::models::{engagement_rate, ContentFormat, ContentPerformance, DateRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// What to rank
#[derive(Debug, Clone)]
pub struct RankQuery {
    pub org_id: String,
    pub lookback_days: u32,
    pub group_id: Option<String>,
    pub integration_id: Option<String>,
    pub format: Option<ContentFormat>,
    /// End of the lookback window
    pub now: DateTime<Utc>,
}

impl RankQuery {
    pub fn new(org_id: impl Into<String>, lookback_days: u32) -> Self {
        Self {
            org_id: org_id.into(),
            lookback_days,
            group_id: None,
            integration_id: None,
            format: None,
            now: Utc::now(),
        }
    }

    pub fn window(&self) -> DateRange {
        DateRange::lookback(self.lookback_days, self.now)
    }
}

/// Winners of one format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatGroup {
    pub format: ContentFormat,
    /// Ranked winners of this format, best first
    pub winners: Vec<ContentPerformance>,
}

/// Selects the top-performing content per format
pub struct ContentRanker {
    winner_percentile: f64,
    min_winners: usize,
}

impl ContentRanker {
    /// Create a new ranker
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            winner_percentile: config.winner_percentile,
            min_winners: config.min_winners,
        }
    }

    /// Sum each item's metrics over the window and drop items with no signal
    pub async fn fetch_performance(
        &self,
        store: &dyn MetricsStore,
        query: &RankQuery,
    ) -> Result<Vec<ContentPerformance>> {
        let window = query.window();

        let integration_ids = match (&query.group_id, &query.integration_id) {
            (Some(group_id), integration) => {
                let mut ids = store
                    .fetch_group_integration_ids(&query.org_id, group_id)
                    .await?;
                if let Some(integration) = integration {
                    ids.retain(|id| id == integration);
                }
                Some(ids)
            }
            (None, Some(integration)) => Some(vec![integration.clone()]),
            (None, None) => None,
        };

        let filters = ContentFilters {
            integration_ids,
            format: query.format,
            published_since: Some(window.start_instant()),
        };

        let items = store.fetch_content_items(&query.org_id, &filters).await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        let metrics = store
            .fetch_daily_metrics(&query.org_id, &ids, Some(window))
            .await?;
        let totals = totals_by_content(&metrics);

        let mut performance = Vec::with_capacity(items.len());
        for item in items {
            let (format, published_at) = match (item.get_format(), item.published_time()) {
                (Ok(format), Ok(published_at)) => (format, published_at),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(content_id = %item.id, "Skipping content: {}", e);
                    continue;
                }
            };

            let sums = totals.get(&item.id).copied().unwrap_or_default();
            let total_reach = sums.total_reach();
            let total_engagement = sums.engagement();
            if total_reach <= 0 && total_engagement <= 0 {
                continue;
            }

            let hashtags = item.hashtags();
            performance.push(ContentPerformance {
                content_id: item.id,
                format,
                caption: item.caption,
                hashtags,
                published_at,
                total_reach,
                total_engagement,
                engagement_rate: engagement_rate(total_engagement, total_reach),
            });
        }

        debug!(
            org_id = %query.org_id,
            qualifying = performance.len(),
            "Computed content performance"
        );
        Ok(performance)
    }

    /// Order content best first.
    ///
    /// Two items with reach compare by engagement rate; any pair missing
    /// reach compares by raw engagement. That mixed comparison is not a total
    /// order, so mixed input is ranked by stable insertion instead of a sort.
    pub fn rank(&self, items: Vec<ContentPerformance>) -> Vec<ContentPerformance> {
        let with_rate = items.iter().filter(|i| i.engagement_rate.is_some()).count();

        if with_rate == items.len() || with_rate == 0 {
            let mut ranked = items;
            ranked.sort_by(compare_performance);
            return ranked;
        }

        let mut ranked: Vec<ContentPerformance> = Vec::with_capacity(items.len());
        for item in items {
            let position = ranked
                .iter()
                .position(|r| compare_performance(&item, r) == Ordering::Less)
                .unwrap_or(ranked.len());
            ranked.insert(position, item);
        }
        ranked
    }

    /// Number of winners kept out of `available` ranked items
    pub fn winner_count(&self, available: usize) -> usize {
        let by_percentile = (available as f64 * self.winner_percentile).ceil() as usize;
        by_percentile
            .max(self.min_winners.min(available))
            .min(available)
    }

    /// Rank and cut one group of content
    pub fn select_winners(&self, items: Vec<ContentPerformance>) -> Vec<ContentPerformance> {
        let count = self.winner_count(items.len());
        let mut ranked = self.rank(items);
        ranked.truncate(count);
        ranked
    }

    /// Split a ranked winner list by format, keeping rank order within each
    /// format and first-seen order between formats
    pub fn group_by_format(&self, winners: Vec<ContentPerformance>) -> Vec<FormatGroup> {
        let mut groups: Vec<FormatGroup> = Vec::new();
        for item in winners {
            match groups.iter_mut().find(|g| g.format == item.format) {
                Some(group) => group.winners.push(item),
                None => groups.push(FormatGroup {
                    format: item.format,
                    winners: vec![item],
                }),
            }
        }
        groups
    }

    /// Fetch, rank and cut content for a query
    pub async fn top_content(
        &self,
        store: &dyn MetricsStore,
        query: &RankQuery,
    ) -> Result<Vec<FormatGroup>> {
        let performance = self.fetch_performance(store, query).await?;
        let winners = self.select_winners(performance);
        Ok(self.group_by_format(winners))
    }
}

fn compare_performance(a: &ContentPerformance, b: &ContentPerformance) -> Ordering {
    match (a.engagement_rate, b.engagement_rate) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        _ => b.total_engagement.cmp(&a.total_engagement),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::test_support::*;
    use crate::meta::DailyMetric;

    fn perf(id: &str, format: ContentFormat, reach: i64, engagement: i64) -> ContentPerformance {
        ContentPerformance {
            content_id: id.to_string(),
            format,
            caption: None,
            hashtags: Vec::new(),
            published_at: at(2024, 3, 1, 9),
            total_reach: reach,
            total_engagement: engagement,
            engagement_rate: engagement_rate(engagement, reach),
        }
    }

    fn ranker() -> ContentRanker {
        ContentRanker::new(&GenerationConfig::default())
    }

    fn ids(items: &[ContentPerformance]) -> Vec<&str> {
        items.iter().map(|i| i.content_id.as_str()).collect()
    }

    #[test]
    fn test_rank_by_engagement_rate() {
        let ranked = ranker().rank(vec![
            perf("a", ContentFormat::Post, 1000, 65),
            perf("b", ContentFormat::Post, 1200, 144),
            perf("c", ContentFormat::Post, 900, 54),
        ]);
        assert_eq!(ids(&ranked), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_rank_without_reach_uses_engagement() {
        let ranked = ranker().rank(vec![
            perf("a", ContentFormat::Post, 0, 5),
            perf("b", ContentFormat::Post, 0, 50),
            perf("c", ContentFormat::Post, 0, 20),
        ]);
        assert_eq!(ids(&ranked), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_rank_mixed_reach_is_deterministic() {
        let items = vec![
            perf("a", ContentFormat::Post, 100, 10),
            perf("b", ContentFormat::Post, 0, 7),
            perf("c", ContentFormat::Post, 1000, 100),
            perf("d", ContentFormat::Post, 0, 500),
        ];
        let first = ranker().rank(items.clone());
        let second = ranker().rank(items);
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.len(), 4);
        assert_eq!(first[0].content_id, "d");
    }

    #[test]
    fn test_winner_count_floor_and_percentile() {
        let r = ranker();
        assert_eq!(r.winner_count(0), 0);
        assert_eq!(r.winner_count(1), 1);
        assert_eq!(r.winner_count(2), 2);
        assert_eq!(r.winner_count(3), 3);
        assert_eq!(r.winner_count(8), 3);
        assert_eq!(r.winner_count(20), 5);
        assert_eq!(r.winner_count(21), 6);
    }

    #[test]
    fn test_cut_spans_formats_before_grouping() {
        let mut items: Vec<ContentPerformance> = (0..5)
            .map(|i| perf(&format!("r{i}"), ContentFormat::Reel, 100, 10 + i))
            .collect();
        items.push(perf("p0", ContentFormat::Post, 100, 30));
        items.push(perf("p1", ContentFormat::Post, 100, 40));

        // 7 items keep 3 winners across the whole window
        let r = ranker();
        let groups = r.group_by_format(r.select_winners(items));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].format, ContentFormat::Post);
        assert_eq!(ids(&groups[0].winners), vec!["p1", "p0"]);
        assert_eq!(groups[1].format, ContentFormat::Reel);
        assert_eq!(ids(&groups[1].winners), vec!["r4"]);
    }

    #[tokio::test]
    async fn test_fetch_performance_sums_window_and_excludes_silent_items() {
        let (db, _tmp) = setup_test_db().await;
        seed_content(&db, "a", "org", ContentFormat::Reel, None, &[], at(2024, 3, 10, 9), Some(600), 30).await;
        db.upsert_daily_metric(&DailyMetric {
            content_id: "a".to_string(),
            metric_date: "2024-03-11".to_string(),
            reach: Some(400),
            comments: Some(5),
            shares: Some(5),
            ..Default::default()
        })
        .await
        .unwrap();
        seed_content(&db, "silent", "org", ContentFormat::Reel, None, &[], at(2024, 3, 12, 9), Some(0), 0).await;
        seed_content(&db, "old", "org", ContentFormat::Reel, None, &[], at(2023, 12, 1, 9), Some(900), 90).await;

        let mut query = RankQuery::new("org", 30);
        query.now = at(2024, 3, 31, 12);

        let performance = ranker().fetch_performance(&db, &query).await.unwrap();
        assert_eq!(ids(&performance), vec!["a"]);
        assert_eq!(performance[0].total_reach, 1000);
        assert_eq!(performance[0].total_engagement, 40);
        assert_eq!(performance[0].engagement_rate, Some(4.0));
    }

    #[tokio::test]
    async fn test_fetch_performance_group_scope() {
        let (db, _tmp) = setup_test_db().await;
        seed_content(&db, "a", "org", ContentFormat::Post, None, &[], at(2024, 3, 10, 9), Some(100), 5).await;
        db.add_group_integration("org", "g-empty", "page-9").await.unwrap();

        let mut query = RankQuery::new("org", 30);
        query.now = at(2024, 3, 31, 12);
        query.group_id = Some("g-empty".to_string());
        assert!(ranker().fetch_performance(&db, &query).await.unwrap().is_empty());

        db.add_group_integration("org", "g-main", "page-1").await.unwrap();
        query.group_id = Some("g-main".to_string());
        assert_eq!(ranker().fetch_performance(&db, &query).await.unwrap().len(), 1);
    }
}
