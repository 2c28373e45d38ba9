//! HTTP implementation of the analysis collaborator

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use feedflow_core::{AnalysisOutput, Analyzer, ExternalError, PortfolioContext, truncate_body};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct ProcessRequest<'a> {
    youtube_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    portfolio_context: Option<&'a PortfolioContext>,
}

/// Client for the analysis service's `/process` and `/health` endpoints
#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    client: Client,
    base_url: String,
}

impl HttpAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from `WORKFLOW_SERVICE_URL`, falling back to the local default
    pub fn from_env() -> Result<Self> {
        Self::new(AnalysisConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run one item through the service
    #[instrument(skip(self, context), fields(has_context = context.is_some()))]
    pub async fn process_item(
        &self,
        item_url: &str,
        context: Option<&PortfolioContext>,
    ) -> Result<AnalysisOutput> {
        debug!("Sending item to analysis service");

        let response = self
            .client
            .post(format!("{}/process", self.base_url))
            .header("accept", "application/json")
            .json(&ProcessRequest {
                youtube_url: item_url,
                portfolio_context: context,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }

        parse_output(&body)
    }

    /// Whether the service answers its health endpoint
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }
        Ok(())
    }
}

fn status_error(status: u16, body: &str) -> AnalysisError {
    let message = truncate_body(body);
    match status {
        429 => AnalysisError::RateLimitExceeded(message),
        status => AnalysisError::Status { status, message },
    }
}

fn parse_output(body: &str) -> Result<AnalysisOutput> {
    serde_json::from_str(body)
        .map_err(|e| AnalysisError::UnexpectedResponse(format!("failed to parse response: {e}")))
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    fn name(&self) -> &str {
        "analysis-service"
    }

    async fn process(
        &self,
        item_url: &str,
        context: Option<&PortfolioContext>,
    ) -> std::result::Result<AnalysisOutput, ExternalError> {
        Ok(self.process_item(item_url, context).await?)
    }
}
