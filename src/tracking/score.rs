//! Weighted similarity between a content item and a variant recipe
//!
//! Only the hook factor reads the variant; format, hashtags, time and CTA
//! are compared against the playbook the variant was derived from.

use crate::config::MatchWeights;
use crate::error::Result;
use crate::meta::ContentItem;
use crate::models::{normalize_hashtag, ContentFormat, Recipe};
use chrono::{FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Hook keywords must be longer than this many chars
const MIN_KEYWORD_CHARS: usize = 2;

/// Coarse part of day used for time matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayPart {
    pub fn of_hour(hour: u32) -> Self {
        match hour {
            6..=11 => DayPart::Morning,
            12..=17 => DayPart::Afternoon,
            18..=21 => DayPart::Evening,
            _ => DayPart::Night,
        }
    }
}

/// The parts of a content item that matching looks at
#[derive(Debug, Clone)]
pub struct ContentSignals {
    pub format: ContentFormat,
    /// Lowercased caption, empty when absent
    pub caption: String,
    /// Normalized, unique
    pub hashtags: Vec<String>,
    /// Local publish hour
    pub hour: u32,
}

impl ContentSignals {
    pub fn from_item(item: &ContentItem, offset: FixedOffset) -> Result<Self> {
        let mut hashtags: Vec<String> = Vec::new();
        for tag in item.hashtags() {
            if !hashtags.contains(&tag) {
                hashtags.push(tag);
            }
        }

        Ok(Self {
            format: item.get_format()?,
            caption: item.caption.as_deref().unwrap_or_default().to_lowercase(),
            hashtags,
            hour: item.published_time()?.with_timezone(&offset).hour(),
        })
    }
}

/// Per-factor scores in [0, 1] and their weighted total
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchBreakdown {
    pub format: f64,
    pub hook: f64,
    pub hashtag: f64,
    pub time: f64,
    pub cta: f64,
    pub total: f64,
}

/// Score how closely `content` follows a variant of a playbook
pub fn score_match(
    content: &ContentSignals,
    playbook_format: ContentFormat,
    playbook_recipe: &Recipe,
    variant_recipe: &Recipe,
    weights: &MatchWeights,
) -> MatchBreakdown {
    let format = if content.format == playbook_format { 1.0 } else { 0.0 };
    let hook = hook_factor(&content.caption, &variant_recipe.hooks, &playbook_recipe.hooks);
    let hashtag = hashtag_factor(&content.hashtags, &playbook_recipe.hashtag_bucket);
    let time = time_factor(content.hour, &playbook_recipe.best_hours);
    let cta = fraction_present(&content.caption, &playbook_recipe.cta_patterns);

    let weight_sum = weights.total();
    let total = if weight_sum > 0.0 {
        (weights.format * format
            + weights.hook * hook
            + weights.hashtag * hashtag
            + weights.time * time
            + weights.cta * cta)
            / weight_sum
    } else {
        0.0
    };

    MatchBreakdown {
        format,
        hook,
        hashtag,
        time,
        cta,
        total,
    }
}

fn hook_factor(caption: &str, variant_hooks: &[String], playbook_hooks: &[String]) -> f64 {
    if caption.is_empty() {
        return 0.0;
    }

    let mut keywords: Vec<String> = Vec::new();
    for hook in variant_hooks {
        for word in hook.unicode_words() {
            let word = word.to_lowercase();
            if word.chars().count() > MIN_KEYWORD_CHARS && !keywords.contains(&word) {
                keywords.push(word);
            }
        }
    }

    let keyword_share = fraction_present(caption, &keywords);
    let hook_share = fraction_present(caption, playbook_hooks);
    (keyword_share + hook_share) / 2.0
}

fn hashtag_factor(content_tags: &[String], playbook_tags: &[String]) -> f64 {
    let playbook: HashSet<String> = playbook_tags.iter().map(|t| normalize_hashtag(t)).collect();
    let denominator = content_tags.len().max(playbook.len());
    if denominator == 0 {
        return 0.0;
    }
    let matched = content_tags.iter().filter(|t| playbook.contains(*t)).count();
    matched as f64 / denominator as f64
}

fn time_factor(hour: u32, best_hours: &[u32]) -> f64 {
    let part = DayPart::of_hour(hour);
    if best_hours.iter().any(|&h| DayPart::of_hour(h) == part) {
        1.0
    } else {
        0.0
    }
}

/// Share of `needles` found case-insensitively in the lowercased `haystack`
fn fraction_present(haystack: &str, needles: &[String]) -> f64 {
    if needles.is_empty() || haystack.is_empty() {
        return 0.0;
    }
    let found = needles
        .iter()
        .filter(|n| haystack.contains(&n.to_lowercase()))
        .count();
    found as f64 / needles.len() as f64
}
