//! Analysis artifacts produced for an execution
//!
//! Each artifact carries `execution_id` as an association id for reverse
//! lookups. Ownership runs the other way: the execution holds the forward
//! pointers, and deleting an artifact never touches its execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transcript of one content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub execution_id: String,
    pub item_id: String,
    pub item_title: String,
    pub item_url: String,
    pub text: String,
    /// Length of the item in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Market-condition analysis derived from a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub id: String,
    pub execution_id: String,
    pub transcript_id: String,
    /// bullish, bearish or neutral
    pub conditions: String,
    #[serde(default)]
    pub trends: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// A single suggested portfolio adjustment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAction {
    /// increase, decrease, hold, add or remove
    #[serde(rename = "type")]
    pub action_type: String,
    pub symbol: String,
    pub rationale: String,
}

/// Recommendation derived from an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub execution_id: String,
    pub analysis_id: String,
    pub action: String,
    /// Always within `0.0..=1.0`
    pub confidence: f64,
    #[serde(default)]
    pub suggested_actions: Vec<SuggestedAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Clamp a reported confidence into `0.0..=1.0`, mapping NaN to zero
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_confidence() {
        assert!((clamp_confidence(0.75) - 0.75).abs() < f64::EPSILON);
        assert!((clamp_confidence(1.4) - 1.0).abs() < f64::EPSILON);
        assert!(clamp_confidence(-0.2).abs() < f64::EPSILON);
        assert!(clamp_confidence(f64::NAN).abs() < f64::EPSILON);
    }

    #[test]
    fn test_suggested_action_wire_name() {
        let action: SuggestedAction = serde_json::from_str(
            r#"{"type": "increase", "symbol": "VTI", "rationale": "broad exposure"}"#,
        )
        .unwrap();
        assert_eq!(action.action_type, "increase");

        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "increase");
    }
}
