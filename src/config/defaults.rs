//! Default values for configuration

/// Default lookback window for winner selection (days)
pub fn default_lookback_days() -> u32 {
    30
}

/// Minimum winners a format needs before a playbook is built
pub fn default_min_content_items() -> usize {
    3
}

/// Share of ranked content kept as winners (top 25th percentile)
pub fn default_winner_percentile() -> f64 {
    0.25
}

/// Floor on the winner set size (capped by available items)
pub fn default_min_winners() -> usize {
    3
}

/// Maximum hooks kept per recipe
pub fn default_max_hooks() -> usize {
    5
}

/// Minimum hook length in characters (inclusive)
pub fn default_hook_min_chars() -> usize {
    10
}

/// Maximum hook length in characters (exclusive)
pub fn default_hook_max_chars() -> usize {
    100
}

/// Maximum CTA patterns kept per recipe
pub fn default_max_cta_patterns() -> usize {
    5
}

/// Maximum hashtags kept per recipe
pub fn default_max_hashtags() -> usize {
    10
}

/// Number of best hours / best days kept
pub fn default_top_time_slots() -> usize {
    3
}

/// Offset applied to publish timestamps before bucketing (UTC by default)
pub fn default_utc_offset_minutes() -> i32 {
    0
}

/// Call-to-action phrases recognised in captions
pub fn default_cta_phrases() -> Vec<String> {
    [
        "check out",
        "learn more",
        "click link",
        "link in bio",
        "swipe up",
        "comment below",
        "tag a friend",
        "share this",
        "save this",
        "follow for more",
        "dm me",
        "sign up",
        "shop now",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Minimum match score (exclusive) for a variant to claim content
pub fn default_match_threshold() -> f64 {
    0.30
}

pub fn default_format_weight() -> f64 {
    0.20
}

pub fn default_hook_weight() -> f64 {
    0.30
}

pub fn default_hashtag_weight() -> f64 {
    0.20
}

pub fn default_time_weight() -> f64 {
    0.15
}

pub fn default_cta_weight() -> f64 {
    0.15
}
