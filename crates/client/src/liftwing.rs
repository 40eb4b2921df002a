use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use latprobe_core::config::ScoringConfig;

use super::traits::{ScoreError, Scorer};
use super::wikipedia::USER_AGENT;

/// Revert-risk scorer reached over HTTP with a bearer token.
///
/// No client timeout is set: a hung call holds its worker until the
/// service answers.
pub struct LiftWingScorer {
    client: Client,
    url: String,
    access_token: String,
}

impl LiftWingScorer {
    pub fn new(config: &ScoringConfig) -> Result<Self, ScoreError> {
        Ok(Self {
            client: Client::builder().user_agent(USER_AGENT).build()?,
            url: config.url.clone(),
            access_token: config.access_token.clone(),
        })
    }
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    rev_id: i64,
    lang: &'a str,
}

#[async_trait]
impl Scorer for LiftWingScorer {
    async fn score(&self, source_tag: &str, item_id: i64) -> Result<(), ScoreError> {
        let request = ScoreRequest {
            rev_id: item_id,
            lang: source_tag,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&request)
            .send()
            .await?;

        // The body is never read on success so the measured latency stops
        // at the response head.
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ScoreError::Status { status, body });
        }

        Ok(())
    }
}
