//! Domain vocabulary shared by the ranking, extraction, variant and tracking stages.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Content format tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Post,
    Reel,
    Story,
}

impl std::fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentFormat::Post => write!(f, "post"),
            ContentFormat::Reel => write!(f, "reel"),
            ContentFormat::Story => write!(f, "story"),
        }
    }
}

impl FromStr for ContentFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "post" => Ok(ContentFormat::Post),
            "reel" => Ok(ContentFormat::Reel),
            "story" => Ok(ContentFormat::Story),
            _ => Err(Error::Validation(format!("Unknown content format: {}", s))),
        }
    }
}

/// Dimension a playbook variant changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantType {
    Hook,
    Time,
    Hashtag,
}

impl std::fmt::Display for VariantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariantType::Hook => write!(f, "hook"),
            VariantType::Time => write!(f, "time"),
            VariantType::Hashtag => write!(f, "hashtag"),
        }
    }
}

impl FromStr for VariantType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hook" => Ok(VariantType::Hook),
            "time" => Ok(VariantType::Time),
            "hashtag" => Ok(VariantType::Hashtag),
            _ => Err(Error::Validation(format!("Unknown variant type: {}", s))),
        }
    }
}

/// Experiment state. Transitions: draft -> active -> completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Draft,
    Active,
    Completed,
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperimentStatus::Draft => write!(f, "draft"),
            ExperimentStatus::Active => write!(f, "active"),
            ExperimentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for ExperimentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ExperimentStatus::Draft),
            "active" => Ok(ExperimentStatus::Active),
            "completed" => Ok(ExperimentStatus::Completed),
            _ => Err(Error::Validation(format!("Unknown experiment status: {}", s))),
        }
    }
}

/// Metric an experiment is judged on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessMetric {
    Reach,
    #[default]
    Engagement,
    Combined,
}

impl std::fmt::Display for SuccessMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuccessMetric::Reach => write!(f, "reach"),
            SuccessMetric::Engagement => write!(f, "engagement"),
            SuccessMetric::Combined => write!(f, "combined"),
        }
    }
}

impl FromStr for SuccessMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "reach" => Ok(SuccessMetric::Reach),
            "engagement" => Ok(SuccessMetric::Engagement),
            "combined" => Ok(SuccessMetric::Combined),
            _ => Err(Error::Validation(format!("Unknown success metric: {}", s))),
        }
    }
}

/// The structured formula behind a playbook or one of its variants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub hooks: Vec<String>,
    #[serde(default)]
    pub cta_patterns: Vec<String>,
    /// Normalized hashtags, most frequent first
    #[serde(default)]
    pub hashtag_bucket: Vec<String>,
    /// Hours of day (0-23), most frequent first
    #[serde(default)]
    pub best_hours: Vec<u32>,
    /// Days of week (0 = Sunday), most frequent first
    #[serde(default)]
    pub best_days: Vec<u32>,
}

impl Recipe {
    /// Parse a stored recipe, attributing failures to `owner`
    pub fn from_json(owner: &str, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedRecipe {
            owner: owner.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Statistical backing for a playbook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub median_reach: f64,
    pub median_engagement: f64,
    /// Median of the winners' engagement rates (percent)
    pub engagement_rate: f64,
    pub content_count: usize,
}

/// Inclusive range of metric days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// The `days`-long window ending at `now`
    pub fn lookback(days: u32, now: DateTime<Utc>) -> Self {
        let end = now.date_naive();
        let start = end - Duration::days(i64::from(days));
        Self { start, end }
    }

    /// Earliest instant inside the window
    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

/// Summed daily metrics for one content item.
///
/// Reach and impressions stay `None` when no metric row carried them, so
/// "unknown" is distinguishable from "zero".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTotals {
    pub reach: Option<i64>,
    pub impressions: Option<i64>,
    pub reactions: i64,
    pub comments: i64,
    pub shares: i64,
}

impl MetricTotals {
    pub fn add(
        &mut self,
        reach: Option<i64>,
        impressions: Option<i64>,
        reactions: Option<i64>,
        comments: Option<i64>,
        shares: Option<i64>,
    ) {
        if let Some(r) = reach {
            self.reach = Some(self.reach.unwrap_or(0) + r);
        }
        if let Some(i) = impressions {
            self.impressions = Some(self.impressions.unwrap_or(0) + i);
        }
        self.reactions += reactions.unwrap_or(0);
        self.comments += comments.unwrap_or(0);
        self.shares += shares.unwrap_or(0);
    }

    /// Reactions + comments + shares
    pub fn engagement(&self) -> i64 {
        self.reactions + self.comments + self.shares
    }

    /// Reach as reported, 0 when never reported
    pub fn total_reach(&self) -> i64 {
        self.reach.unwrap_or(0)
    }

    /// Reach, or impressions when the item never reported reach
    pub fn best_known_reach(&self) -> i64 {
        self.reach.or(self.impressions).unwrap_or(0)
    }
}

/// Engagement as a percentage of reach; `None` when reach is not positive
pub fn engagement_rate(engagement: i64, reach: i64) -> Option<f64> {
    if reach > 0 {
        Some(engagement as f64 * 100.0 / reach as f64)
    } else {
        None
    }
}

/// Canonical hashtag form: no leading '#', trimmed, lowercase
pub fn normalize_hashtag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').trim().to_lowercase()
}

/// Rolling aggregates of an experiment variant's tracked content
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantAggregate {
    pub content_count: i64,
    pub total_reach: i64,
    pub total_engagement: i64,
    /// Mean of per-item engagement rates (percent), not a rate of the totals
    pub avg_engagement_rate: f64,
}

impl VariantAggregate {
    /// Engagement over reach across all tracked items (percent).
    ///
    /// A different statistic from `avg_engagement_rate`; both are reported.
    pub fn pooled_engagement_rate(&self) -> f64 {
        engagement_rate(self.total_engagement, self.total_reach).unwrap_or(0.0)
    }
}

/// One content item together with its performance over a window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPerformance {
    pub content_id: String,
    pub format: ContentFormat,
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub total_reach: i64,
    pub total_engagement: i64,
    /// Percent; `None` when reach was unavailable
    pub engagement_rate: Option<f64>,
}
