//! Analysis collaborator contract

use crate::context::PortfolioContext;
use crate::error::ExternalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Transcript portion of an analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptOutput {
    #[serde(rename = "video_id")]
    pub item_id: String,
    #[serde(rename = "video_title")]
    pub item_title: String,
    pub text: String,
    #[serde(default)]
    pub duration: Option<u32>,
}

/// Market analysis portion of an analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysisOutput {
    pub conditions: String,
    #[serde(default)]
    pub trends: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    pub summary: String,
}

/// Recommendation portion of an analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationOutput {
    pub action: String,
    pub confidence: f64,
    #[serde(default)]
    pub suggested_actions: Vec<crate::artifact::SuggestedAction>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Everything the collaborator returns for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub transcript: TranscriptOutput,
    pub market_analysis: MarketAnalysisOutput,
    pub recommendation: RecommendationOutput,
}

/// Turns an item reference into a transcript, analysis and recommendation
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Run the full pipeline for one item
    async fn process(
        &self,
        item_url: &str,
        context: Option<&PortfolioContext>,
    ) -> Result<AnalysisOutput, ExternalError>;
}
