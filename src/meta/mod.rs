//! Metadata storage using SQLite
//!
//! This module handles all local storage including:
//! - Content items and daily metrics (the ingested inputs)
//! - Playbooks and their variants
//! - Experiments, experiment variants and tracked content

mod experiments;
mod playbooks;
mod schema;

pub use experiments::*;
pub use playbooks::*;
pub use schema::*;

use crate::config::Config;
use crate::error::Result;
use crate::models::{normalize_hashtag, ContentFormat, DateRange, MetricTotals};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use tracing::{debug, info};

/// SQLite caps bound parameters per statement; IN lists are split to stay under it
const MAX_BIND_CHUNK: usize = 500;

/// Format a timestamp the way every TEXT timestamp column stores it
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A published content item
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub org_id: String,
    pub integration_id: String,
    pub format: String,
    pub caption: Option<String>,
    pub hashtags_json: Option<String>,
    pub published_at: String,
    pub created_at: String,
}

impl ContentItem {
    pub fn new(
        id: String,
        org_id: String,
        integration_id: String,
        format: ContentFormat,
        caption: Option<String>,
        hashtags: Vec<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            org_id,
            integration_id,
            format: format.to_string(),
            caption,
            hashtags_json: Some(serde_json::to_string(&hashtags).unwrap_or_default()),
            published_at: format_timestamp(published_at),
            created_at: format_timestamp(Utc::now()),
        }
    }

    pub fn get_format(&self) -> Result<ContentFormat> {
        self.format.parse()
    }

    /// Normalized hashtags; an unreadable list counts as no hashtags
    pub fn hashtags(&self) -> Vec<String> {
        self.hashtags_json
            .as_ref()
            .and_then(|j| serde_json::from_str::<Vec<String>>(j).ok())
            .unwrap_or_default()
            .iter()
            .map(|t| normalize_hashtag(t))
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn published_time(&self) -> Result<DateTime<Utc>> {
        let ts = DateTime::parse_from_rfc3339(&self.published_at).map_err(|e| {
            crate::error::Error::Validation(format!(
                "Invalid publish timestamp '{}' on content {}: {}",
                self.published_at, self.id, e
            ))
        })?;
        Ok(ts.with_timezone(&Utc))
    }
}

/// One day of cumulative stats for a content item
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct DailyMetric {
    pub content_id: String,
    /// YYYY-MM-DD
    pub metric_date: String,
    pub impressions: Option<i64>,
    pub reach: Option<i64>,
    pub reactions: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    pub video_views: Option<i64>,
    pub clicks: Option<i64>,
}

impl DailyMetric {
    pub fn accumulate_into(&self, totals: &mut MetricTotals) {
        totals.add(
            self.reach,
            self.impressions,
            self.reactions,
            self.comments,
            self.shares,
        );
    }
}

/// Sum metric rows per content item
pub fn totals_by_content(metrics: &[DailyMetric]) -> HashMap<String, MetricTotals> {
    let mut totals: HashMap<String, MetricTotals> = HashMap::new();
    for metric in metrics {
        metric.accumulate_into(totals.entry(metric.content_id.clone()).or_default());
    }
    totals
}

/// Filters applied when fetching content items
#[derive(Debug, Clone, Default)]
pub struct ContentFilters {
    /// Restrict to these integrations (an empty list matches nothing)
    pub integration_ids: Option<Vec<String>>,
    pub format: Option<ContentFormat>,
    pub published_since: Option<DateTime<Utc>>,
}

/// Read access to ingested content and metrics
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Content items of an organization matching the filters
    async fn fetch_content_items(
        &self,
        org_id: &str,
        filters: &ContentFilters,
    ) -> Result<Vec<ContentItem>>;

    /// Daily metric rows for the given items; `None` means every recorded day
    async fn fetch_daily_metrics(
        &self,
        org_id: &str,
        content_ids: &[String],
        range: Option<DateRange>,
    ) -> Result<Vec<DailyMetric>>;

    /// Integration ids that make up a group
    async fn fetch_group_integration_ids(&self, org_id: &str, group_id: &str)
        -> Result<Vec<String>>;
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the database configured in `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file).await
    }

    /// Connect to the database, initializing the schema if needed
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        let db = Self::open(db_path).await?;

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    async fn open(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='content_items'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(result.is_some())
    }

    // ===== Content Operations =====

    /// Insert a content item. Returns false when the id already exists
    /// (content items are immutable once created).
    pub async fn insert_content_item(&self, item: &ContentItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO content_items (id, org_id, integration_id, format, caption, hashtags_json, published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&item.id)
        .bind(&item.org_id)
        .bind(&item.integration_id)
        .bind(&item.format)
        .bind(&item.caption)
        .bind(&item.hashtags_json)
        .bind(&item.published_at)
        .bind(&item.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get content item by ID
    pub async fn get_content_item(&self, id: &str) -> Result<Option<ContentItem>> {
        let item = sqlx::query_as::<_, ContentItem>("SELECT * FROM content_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// IDs of an organization's content, oldest first
    pub async fn list_content_ids(&self, org_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM content_items WHERE org_id = ? ORDER BY published_at, id",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    // ===== Metric Operations =====

    /// Insert or replace one day of metrics
    pub async fn upsert_daily_metric(&self, metric: &DailyMetric) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_metrics (content_id, metric_date, impressions, reach, reactions, comments, shares, video_views, clicks)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(content_id, metric_date) DO UPDATE SET
                impressions = excluded.impressions,
                reach = excluded.reach,
                reactions = excluded.reactions,
                comments = excluded.comments,
                shares = excluded.shares,
                video_views = excluded.video_views,
                clicks = excluded.clicks
            "#,
        )
        .bind(&metric.content_id)
        .bind(&metric.metric_date)
        .bind(metric.impressions)
        .bind(metric.reach)
        .bind(metric.reactions)
        .bind(metric.comments)
        .bind(metric.shares)
        .bind(metric.video_views)
        .bind(metric.clicks)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Group Operations =====

    /// Register an integration as a member of a group
    pub async fn add_group_integration(
        &self,
        org_id: &str,
        group_id: &str,
        integration_id: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO group_integrations (org_id, group_id, integration_id)
            VALUES (?, ?, ?)
            ON CONFLICT(group_id, integration_id) DO NOTHING
            "#,
        )
        .bind(org_id)
        .bind(group_id)
        .bind(integration_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        Ok(GlobalStats {
            content_count: self.count("SELECT COUNT(*) FROM content_items").await?,
            metric_rows: self.count("SELECT COUNT(*) FROM daily_metrics").await?,
            playbook_count: self
                .count("SELECT COUNT(*) FROM playbooks WHERE deleted_at IS NULL")
                .await?,
            variant_count: self
                .count("SELECT COUNT(*) FROM playbook_variants WHERE deleted_at IS NULL")
                .await?,
            experiment_count: self
                .count("SELECT COUNT(*) FROM experiments WHERE deleted_at IS NULL")
                .await?,
            tracked_content_count: self
                .count("SELECT COUNT(*) FROM experiment_tracked_content WHERE deleted_at IS NULL")
                .await?,
        })
    }

    async fn count(&self, sql: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(n as usize)
    }
}

#[async_trait]
impl MetricsStore for MetaDb {
    async fn fetch_content_items(
        &self,
        org_id: &str,
        filters: &ContentFilters,
    ) -> Result<Vec<ContentItem>> {
        let mut sql = String::from("SELECT * FROM content_items WHERE org_id = ?");

        if let Some(ids) = &filters.integration_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            sql.push_str(&format!(" AND integration_id IN ({})", placeholders));
        }
        if filters.format.is_some() {
            sql.push_str(" AND format = ?");
        }
        if filters.published_since.is_some() {
            sql.push_str(" AND published_at >= ?");
        }
        sql.push_str(" ORDER BY published_at, id");

        let mut query = sqlx::query_as::<_, ContentItem>(&sql).bind(org_id);
        if let Some(ids) = &filters.integration_ids {
            for id in ids {
                query = query.bind(id);
            }
        }
        if let Some(format) = filters.format {
            query = query.bind(format.to_string());
        }
        if let Some(since) = filters.published_since {
            query = query.bind(format_timestamp(since));
        }

        let items = query.fetch_all(&self.pool).await?;
        debug!(org_id, count = items.len(), "Fetched content items");
        Ok(items)
    }

    async fn fetch_daily_metrics(
        &self,
        org_id: &str,
        content_ids: &[String],
        range: Option<DateRange>,
    ) -> Result<Vec<DailyMetric>> {
        let mut metrics = Vec::new();

        for chunk in content_ids.chunks(MAX_BIND_CHUNK) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let mut sql = format!(
                r#"
                SELECT m.* FROM daily_metrics m
                JOIN content_items c ON c.id = m.content_id
                WHERE c.org_id = ? AND m.content_id IN ({})
                "#,
                placeholders
            );
            if range.is_some() {
                sql.push_str(" AND m.metric_date >= ? AND m.metric_date <= ?");
            }
            sql.push_str(" ORDER BY m.content_id, m.metric_date");

            let mut query = sqlx::query_as::<_, DailyMetric>(&sql).bind(org_id);
            for id in chunk {
                query = query.bind(id);
            }
            if let Some(range) = range {
                query = query
                    .bind(range.start.format("%Y-%m-%d").to_string())
                    .bind(range.end.format("%Y-%m-%d").to_string());
            }

            metrics.extend(query.fetch_all(&self.pool).await?);
        }

        Ok(metrics)
    }

    async fn fetch_group_integration_ids(
        &self,
        org_id: &str,
        group_id: &str,
    ) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT integration_id FROM group_integrations WHERE org_id = ? AND group_id = ? ORDER BY integration_id",
        )
        .bind(org_id)
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub content_count: usize,
    pub metric_rows: usize,
    pub playbook_count: usize,
    pub variant_count: usize,
    pub experiment_count: usize,
    pub tracked_content_count: usize,
}
