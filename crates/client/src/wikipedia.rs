use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use latprobe_core::config::SourceConfig;
use latprobe_core::SampledItem;

use super::traits::{ContentSource, SourceError};

pub(crate) const USER_AGENT: &str = concat!("latprobe/", env!("CARGO_PKG_VERSION"));

/// Random-article sampler backed by the MediaWiki action API.
pub struct WikipediaSource {
    client: Client,
    url_template: String,
}

impl WikipediaSource {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url_template: config.url_template.clone(),
        })
    }

    fn endpoint(&self, source_tag: &str) -> String {
        endpoint_for(&self.url_template, source_tag)
    }
}

pub(crate) fn endpoint_for(template: &str, source_tag: &str) -> String {
    template.replace("{tag}", source_tag)
}

#[derive(Deserialize)]
struct RandomResponse {
    query: Option<RandomQuery>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct RandomQuery {
    #[serde(default)]
    random: Vec<SampledItem>,
}

#[derive(Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    info: String,
}

/// Extract the sampled items from a `list=random` response body.
pub(crate) fn parse_random_response(body: &str) -> Result<Vec<SampledItem>, SourceError> {
    let parsed: RandomResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    if let Some(err) = parsed.error {
        return Err(SourceError::Api(format!("{}: {}", err.code, err.info)));
    }

    parsed
        .query
        .map(|q| q.random)
        .ok_or_else(|| SourceError::Parse("response has no query section".to_string()))
}

#[async_trait]
impl ContentSource for WikipediaSource {
    async fn sample(&self, source_tag: &str, count: usize) -> Result<Vec<SampledItem>, SourceError> {
        let limit = count.to_string();
        let response = self
            .client
            .get(self.endpoint(source_tag))
            .query(&[
                ("action", "query"),
                ("list", "random"),
                ("rnnamespace", "0"),
                ("rnlimit", limit.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(format!("{status}: {body}")));
        }

        let body = response.text().await?;
        let items = parse_random_response(&body)?;
        debug!(source = %source_tag, requested = count, received = items.len(), "sampled batch");
        Ok(items)
    }
}
