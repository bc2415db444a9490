use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::AnalyzerConfig;
use crate::models::AiInsights;

/// Returned for every field when no API key is configured
pub const UNAVAILABLE_FALLBACK: &str = "AI temporarily unavailable.";

/// Returned for a field whose generation call failed
pub const FAILURE_FALLBACK: &str = "AI response failed.";

/// Produces the reply, summary and recommended action for a review.
///
/// Implementations never fail; a field that couldn't be generated carries a
/// fixed fallback string instead.
pub trait ReviewAnalyzer: Send + Sync {
    fn analyze(&self, rating: i64, review_text: &str)
        -> impl Future<Output = AiInsights> + Send;
}

/// Analyzer backed by the Gemini `generateContent` API
pub struct GeminiAnalyzer {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiAnalyzer {
    pub fn from_config(config: &AnalyzerConfig, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("GEMINI_API_KEY not set, AI insights will use fallback text");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create Gemini HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Generate one field, falling back to fixed text on any failure
    async fn generate_or_fallback(&self, prompt: String) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return UNAVAILABLE_FALLBACK.to_string();
        };

        match self.generate(api_key, prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Generation failed");
                FAILURE_FALLBACK.to_string()
            }
        }
    }

    async fn generate(&self, api_key: &str, prompt: String) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!(model = %self.model, "Sending request to Gemini API");

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text = body
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("Gemini returned no text");
        }

        Ok(text.to_string())
    }
}

impl ReviewAnalyzer for GeminiAnalyzer {
    #[instrument(skip(self, review_text), fields(model = %self.model))]
    async fn analyze(&self, rating: i64, review_text: &str) -> AiInsights {
        info!("Generating AI insights for review");

        let (response, summary, recommended_action) = tokio::join!(
            self.generate_or_fallback(reply_prompt(rating, review_text)),
            self.generate_or_fallback(summary_prompt(rating, review_text)),
            self.generate_or_fallback(recommendation_prompt(rating, review_text)),
        );

        AiInsights {
            response,
            summary,
            recommended_action,
        }
    }
}

fn reply_prompt(rating: i64, review_text: &str) -> String {
    format!(
        r#"You are replying to a customer review on behalf of the business.

Rating: {rating} stars
Review: "{review_text}"

Write a short 2-3 sentence reply. Thank the reviewer, reflect their sentiment,
address any concerns if the rating is low, and optionally invite them back."#
    )
}

fn summary_prompt(rating: i64, review_text: &str) -> String {
    format!(
        r#"Summarize this customer review in 1-2 sentences.

Rating: {rating} stars
Review: "{review_text}""#
    )
}

fn recommendation_prompt(rating: i64, review_text: &str) -> String {
    format!(
        r#"Based on this customer review, give ONE actionable improvement for the business.

Rating: {rating} stars
Review: "{review_text}"

Answer with a single clear recommendation."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn analyzer(server: &MockServer, key: Option<&str>) -> GeminiAnalyzer {
        let config = AnalyzerConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        GeminiAnalyzer::from_config(&config, key.map(str::to_string)).unwrap()
    }

    #[tokio::test]
    async fn test_no_key_uses_unavailable_fallback() {
        let server = MockServer::start().await;

        let insights = analyzer(&server, None).analyze(5, "Great food").await;

        assert_eq!(insights.response, UNAVAILABLE_FALLBACK);
        assert_eq!(insights.summary, UNAVAILABLE_FALLBACK);
        assert_eq!(insights.recommended_action, UNAVAILABLE_FALLBACK);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configured_timeout_is_applied() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "candidates": [{ "content": { "parts": [{ "text": "late" }] } }]
                    }))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = AnalyzerConfig {
            base_url: server.uri(),
            timeout_secs: 1,
            ..Default::default()
        };
        let analyzer = GeminiAnalyzer::from_config(&config, Some("key".to_string())).unwrap();

        let insights = analyzer.analyze(4, "Nice").await;
        assert_eq!(insights.response, FAILURE_FALLBACK);
    }

    #[tokio::test]
    async fn test_api_error_uses_failure_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let insights = analyzer(&server, Some("key")).analyze(1, "Cold soup").await;

        assert_eq!(insights.response, FAILURE_FALLBACK);
        assert_eq!(insights.summary, FAILURE_FALLBACK);
        assert_eq!(insights.recommended_action, FAILURE_FALLBACK);
    }

    #[tokio::test]
    async fn test_extracts_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "  Thank you for visiting! " }] }
                }]
            })))
            .expect(3)
            .mount(&server)
            .await;

        let insights = analyzer(&server, Some("key")).analyze(5, "Great food").await;

        assert_eq!(insights.response, "Thank you for visiting!");
        assert_eq!(insights.summary, "Thank you for visiting!");
        assert_eq!(insights.recommended_action, "Thank you for visiting!");
    }

    #[tokio::test]
    async fn test_empty_candidates_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        let insights = analyzer(&server, Some("key")).analyze(3, "Fine").await;
        assert_eq!(insights.summary, FAILURE_FALLBACK);
    }

    #[test]
    fn test_prompts_carry_rating_and_text() {
        let prompt = summary_prompt(2, "Slow service");
        assert!(prompt.contains("Rating: 2 stars"));
        assert!(prompt.contains("\"Slow service\""));
        assert!(recommendation_prompt(2, "x").contains("ONE actionable"));
        assert!(reply_prompt(2, "x").contains("2-3 sentence"));
    }
}
