//! Evidence and consistency scoring for a winner set

use crate::models::{ContentPerformance, Evidence};

/// Winner sets smaller than this get a consistency score of 0
const MIN_CONSISTENCY_SAMPLE: usize = 3;

/// Evidence for a playbook together with its consistency score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEvidence {
    pub evidence: Evidence,
    /// Share of winners reaching at least the median reach, 0-100
    pub consistency_score: f64,
}

/// Score a winner set. Items without reach count as a 0% engagement rate.
pub fn score_winners(winners: &[ContentPerformance]) -> ScoredEvidence {
    let reaches: Vec<f64> = winners.iter().map(|w| w.total_reach as f64).collect();
    let engagements: Vec<f64> = winners.iter().map(|w| w.total_engagement as f64).collect();
    let rates: Vec<f64> = winners
        .iter()
        .map(|w| w.engagement_rate.unwrap_or(0.0))
        .collect();

    ScoredEvidence {
        evidence: Evidence {
            median_reach: median(&reaches),
            median_engagement: median(&engagements),
            engagement_rate: median(&rates),
            content_count: winners.len(),
        },
        consistency_score: consistency_score(&reaches),
    }
}

/// Standard median; 0 for an empty slice
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Percentage of values at or above their median, rounded to 2 decimals
pub fn consistency_score(reaches: &[f64]) -> f64 {
    if reaches.len() < MIN_CONSISTENCY_SAMPLE {
        return 0.0;
    }

    let median_reach = median(reaches);
    let at_or_above = reaches.iter().filter(|&&r| r >= median_reach).count();
    let pct = at_or_above as f64 / reaches.len() as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{engagement_rate, ContentFormat};
    use chrono::Utc;

    #[test]
    fn test_median() {
        assert_eq!(median(&[1.0, 3.0, 5.0, 7.0, 9.0]), 5.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[42.0]), 42.0);
    }

    #[test]
    fn test_consistency_score() {
        assert_eq!(consistency_score(&[1000.0, 1200.0, 900.0]), 66.67);
        assert_eq!(consistency_score(&[5.0, 5.0, 5.0, 5.0]), 100.0);
        assert_eq!(consistency_score(&[1.0, 2.0, 3.0, 4.0]), 50.0);
    }

    #[test]
    fn test_consistency_needs_three_items() {
        assert_eq!(consistency_score(&[]), 0.0);
        assert_eq!(consistency_score(&[100.0, 200.0]), 0.0);
    }

    #[test]
    fn test_score_winners() {
        let winners: Vec<ContentPerformance> = [(1000, 65), (1200, 144), (900, 54)]
            .iter()
            .enumerate()
            .map(|(i, &(reach, engagement))| ContentPerformance {
                content_id: format!("c{i}"),
                format: ContentFormat::Reel,
                caption: None,
                hashtags: Vec::new(),
                published_at: Utc::now(),
                total_reach: reach,
                total_engagement: engagement,
                engagement_rate: engagement_rate(engagement, reach),
            })
            .collect();

        let scored = score_winners(&winners);
        assert_eq!(scored.evidence.content_count, 3);
        assert_eq!(scored.evidence.median_reach, 1000.0);
        assert_eq!(scored.evidence.median_engagement, 65.0);
        assert_eq!(scored.evidence.engagement_rate, 6.5);
        assert_eq!(scored.consistency_score, 66.67);
    }
}
