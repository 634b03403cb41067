//! Pattern extraction from a winner set
//!
//! Turns the captions, hashtags and publish times of winning content into
//! the hooks, CTA phrases, hashtag bucket and time buckets of a recipe.

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::models::{ContentPerformance, Recipe};
use chrono::{Datelike, FixedOffset, Timelike};
use regex::{Regex, RegexBuilder};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Characters that end a hook
const HOOK_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Extracts recipe patterns from ranked content
pub struct PatternExtractor {
    config: ExtractionConfig,
    cta_regex: Option<Regex>,
    offset: FixedOffset,
}

impl PatternExtractor {
    /// Create an extractor, compiling the CTA phrase set
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let phrases: Vec<String> = config
            .cta_phrases
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(regex::escape)
            .collect();

        let cta_regex = if phrases.is_empty() {
            None
        } else {
            let regex = RegexBuilder::new(&phrases.join("|"))
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::Config(format!("Invalid CTA phrase set: {}", e)))?;
            Some(regex)
        };

        Ok(Self {
            config: config.clone(),
            cta_regex,
            offset: config.local_offset(),
        })
    }

    /// Build the full recipe for one format's winners
    pub fn extract(&self, winners: &[ContentPerformance]) -> Recipe {
        let captions: Vec<&str> = winners.iter().filter_map(|w| w.caption.as_deref()).collect();

        Recipe {
            hooks: self.extract_hooks(&captions),
            cta_patterns: self.extract_cta_patterns(&captions),
            hashtag_bucket: self.extract_hashtags(winners),
            best_hours: self.best_hours(winners),
            best_days: self.best_days(winners),
        }
    }

    /// Opening sentences of captions, terminator included
    pub fn extract_hooks(&self, captions: &[&str]) -> Vec<String> {
        let mut hooks: Vec<String> = Vec::new();

        for &caption in captions {
            if hooks.len() >= self.config.max_hooks {
                break;
            }

            let hook = match caption.find(HOOK_TERMINATORS) {
                Some(idx) => &caption[..=idx],
                None => caption,
            }
            .trim();

            let len = hook.chars().count();
            if len < self.config.hook_min_chars || len >= self.config.hook_max_chars {
                continue;
            }
            if !hooks.iter().any(|h| h == hook) {
                hooks.push(hook.to_string());
            }
        }

        hooks
    }

    /// Call-to-action phrases as they were written in the captions
    pub fn extract_cta_patterns(&self, captions: &[&str]) -> Vec<String> {
        let Some(regex) = &self.cta_regex else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut patterns = Vec::new();

        'captions: for caption in captions {
            for found in regex.find_iter(caption) {
                if patterns.len() >= self.config.max_cta_patterns {
                    break 'captions;
                }
                if seen.insert(found.as_str().to_lowercase()) {
                    patterns.push(found.as_str().to_string());
                }
            }
        }

        patterns
    }

    /// Most frequent normalized hashtags
    pub fn extract_hashtags(&self, winners: &[ContentPerformance]) -> Vec<String> {
        let tags = winners.iter().flat_map(|w| w.hashtags.iter().cloned());
        top_by_frequency(tags, self.config.max_hashtags)
    }

    /// Most frequent publish hours in local time
    pub fn best_hours(&self, winners: &[ContentPerformance]) -> Vec<u32> {
        let hours = winners
            .iter()
            .map(|w| w.published_at.with_timezone(&self.offset).hour());
        top_by_frequency(hours, self.config.top_time_slots)
    }

    /// Most frequent publish weekdays in local time, 0 = Sunday
    pub fn best_days(&self, winners: &[ContentPerformance]) -> Vec<u32> {
        let days = winners.iter().map(|w| {
            w.published_at
                .with_timezone(&self.offset)
                .weekday()
                .num_days_from_sunday()
        });
        top_by_frequency(days, self.config.top_time_slots)
    }
}

/// Values ordered by descending count; equal counts keep first-seen order
fn top_by_frequency<T, I>(values: I, limit: usize) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut counts: Vec<(T, usize)> = Vec::new();
    let mut index: HashMap<T, usize> = HashMap::new();

    for value in values {
        match index.get(&value) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(value.clone(), counts.len());
                counts.push((value, 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(limit).map(|(v, _)| v).collect()
}
