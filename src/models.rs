use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ratings the histogram always reports, even when nothing was submitted for them
pub const RATING_SCALE: [i64; 5] = [1, 2, 3, 4, 5];

/// A single stored review, as it appears in the persisted JSON array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub user_rating: i64,
    pub user_review: String,
    pub ai_response: String,
    pub ai_summary: String,
    pub ai_recommended_action: String,
    pub timestamp: String,
    /// Keys written by something other than this crate; kept so rewrites don't drop them
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The caller-supplied part of a review; id and timestamp are assigned on append
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub user_rating: i64,
    pub user_review: String,
    pub ai_response: String,
    pub ai_summary: String,
    pub ai_recommended_action: String,
}

/// The three strings produced for a review by the analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiInsights {
    pub response: String,
    pub summary: String,
    pub recommended_action: String,
}

impl NewReview {
    pub fn new(rating: i64, text: impl Into<String>, insights: AiInsights) -> Self {
        Self {
            user_rating: rating,
            user_review: text.into(),
            ai_response: insights.response,
            ai_summary: insights.summary,
            ai_recommended_action: insights.recommended_action,
        }
    }

    /// Stamp the review with its storage metadata
    pub fn into_record(self, id: u64, timestamp: String) -> ReviewRecord {
        ReviewRecord {
            id: Some(id),
            user_rating: self.user_rating,
            user_review: self.user_review,
            ai_response: self.ai_response,
            ai_summary: self.ai_summary,
            ai_recommended_action: self.ai_recommended_action,
            timestamp,
            extra: Map::new(),
        }
    }
}

/// Descriptive statistics over the whole stored collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total_count: usize,
    pub average_rating: f64,
    pub rating_histogram: BTreeMap<i64, usize>,
    pub recent: Vec<ReviewRecord>,
}

impl AnalyticsSummary {
    pub fn from_records(records: &[ReviewRecord], recent_window: usize) -> Self {
        let mut rating_histogram: BTreeMap<i64, usize> =
            RATING_SCALE.iter().map(|r| (*r, 0)).collect();

        // Ratings outside the scale still count toward the mean
        for record in records {
            if let Some(count) = rating_histogram.get_mut(&record.user_rating) {
                *count += 1;
            }
        }

        let average_rating = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.user_rating as f64).sum::<f64>() / records.len() as f64
        };

        let start = records.len().saturating_sub(recent_window);

        Self {
            total_count: records.len(),
            average_rating,
            rating_histogram,
            recent: records[start..].to_vec(),
        }
    }

    /// Number of reviews with the given rating
    pub fn count_for(&self, rating: i64) -> usize {
        self.rating_histogram.get(&rating).copied().unwrap_or(0)
    }

    /// Percentage of reviews rated five stars
    pub fn five_star_share(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.count_for(5) as f64 / self.total_count as f64 * 100.0
    }

    /// Reviews rated one or two stars
    pub fn low_rating_count(&self) -> usize {
        self.count_for(1) + self.count_for(2)
    }
}

/// Admin-side listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    pub rating: Option<i64>,
    pub search: Option<String>,
}

impl ReviewFilter {
    pub fn matches(&self, record: &ReviewRecord) -> bool {
        if let Some(rating) = self.rating {
            if record.user_rating != rating {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                record.user_review.to_lowercase().contains(&needle)
                    || record.ai_summary.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}
