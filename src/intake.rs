use anyhow::Result;
use tracing::info;

use crate::analyzer::ReviewAnalyzer;
use crate::backend::Backend;
use crate::models::{AiInsights, AnalyticsSummary, NewReview, RATING_SCALE};
use crate::store::ReviewStore;

/// Outcome of a submitted review
#[derive(Debug, Clone)]
pub struct Submission {
    pub insights: AiInsights,
    /// Whether the review reached durable storage
    pub saved: bool,
}

/// The user-facing submission flow: analyze a review, then store it
pub struct Intake<A: ReviewAnalyzer, B: Backend> {
    analyzer: A,
    store: ReviewStore<B>,
}

impl<A: ReviewAnalyzer, B: Backend> Intake<A, B> {
    pub fn new(analyzer: A, store: ReviewStore<B>) -> Self {
        Self { analyzer, store }
    }

    /// Analyze and store a review.
    ///
    /// Blank review text is rejected before anything is generated. Storage
    /// failures are reported through [`Submission::saved`], not as errors.
    pub async fn submit(&self, rating: i64, review_text: &str) -> Result<Submission> {
        if review_text.trim().is_empty() {
            anyhow::bail!("Please write a review before submitting");
        }

        info!(rating, "Processing review submission");

        let insights = self.analyzer.analyze(rating, review_text).await;
        let saved = self
            .store
            .append(NewReview::new(rating, review_text, insights.clone()))
            .await;

        info!(saved, "Review submission complete");

        Ok(Submission { insights, saved })
    }

    /// Get the store for direct access
    pub fn store(&self) -> &ReviewStore<B> {
        &self.store
    }
}

/// Render an analytics summary as a plain-text report
pub fn render_report(summary: &AnalyticsSummary) -> String {
    let mut out = String::new();

    out.push_str("Review Analytics\n================\n\n");

    let average = if summary.total_count == 0 {
        "N/A".to_string()
    } else {
        format!("{:.1}", summary.average_rating)
    };

    out.push_str(&format!("Total reviews:      {}\n", summary.total_count));
    out.push_str(&format!("Average rating:     {}\n", average));
    out.push_str(&format!("5-star reviews:     {:.1}%\n", summary.five_star_share()));
    out.push_str(&format!("Low ratings (1-2):  {}\n\n", summary.low_rating_count()));

    out.push_str("Rating distribution\n");
    for rating in RATING_SCALE.iter().rev() {
        let count = summary.count_for(*rating);
        out.push_str(&format!(
            "  {} star{} {:>4}  {}\n",
            rating,
            if *rating == 1 { " " } else { "s" },
            count,
            "#".repeat(count.min(40))
        ));
    }

    if summary.recent.is_empty() {
        out.push_str("\nNo reviews found.\n");
        return out;
    }

    out.push_str(&format!("\nRecent reviews ({})\n", summary.recent.len()));
    for record in &summary.recent {
        let date: String = record.timestamp.chars().take(10).collect();
        out.push_str(&format!(
            "  [{}] {}/5  {}\n",
            date,
            record.user_rating,
            truncate(&record.user_review, 60)
        ));
    }

    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    short.push_str("...");
    short
}
