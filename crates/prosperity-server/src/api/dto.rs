use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use prosperity_core::{
    DataPoint, DataSource, EnhancedIndicatorRecord, EnhancementBatch, GeoLocation, IndicatorValues,
    PredictionModel,
};

// ============================================================================
// GET /health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_sources: usize,
    pub models: usize,
}

// ============================================================================
// GET/POST /api/v1/sources
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesResponse {
    pub sources: Vec<DataSource>,
    pub indicators: Vec<String>,
    pub total: usize,
}

/// A data source plus the indicators it should be collected for
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSourceRequest {
    #[serde(flatten)]
    pub source: DataSource,

    #[serde(default)]
    pub indicators: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSourceResponse {
    pub source: DataSource,
    pub indicators: Vec<String>,
    pub message: String,
}

// ============================================================================
// GET /api/v1/models
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<PredictionModel>,
    pub total: usize,
}

// ============================================================================
// POST /api/v1/data-enhancement
// ============================================================================

/// Pipeline operation selected by the request's `action` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementAction {
    Collect,
    Harmonize,
    Validate,
    Predict,
    Assess,
    FillMissing,
    Normalize,
}

impl EnhancementAction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "collect" => Some(EnhancementAction::Collect),
            "harmonize" => Some(EnhancementAction::Harmonize),
            "validate" => Some(EnhancementAction::Validate),
            "predict" => Some(EnhancementAction::Predict),
            "assess" | "assess_quality" => Some(EnhancementAction::Assess),
            "fill_missing" | "fill-missing" => Some(EnhancementAction::FillMissing),
            "normalize" => Some(EnhancementAction::Normalize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnhancementAction::Collect => "collect",
            EnhancementAction::Harmonize => "harmonize",
            EnhancementAction::Validate => "validate",
            EnhancementAction::Predict => "predict",
            EnhancementAction::Assess => "assess",
            EnhancementAction::FillMissing => "fill_missing",
            EnhancementAction::Normalize => "normalize",
        }
    }
}

/// Which fields are required depends on the action; handlers check them
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementRequest {
    pub action: String,

    #[serde(default)]
    pub indicator_name: Option<String>,

    #[serde(default)]
    pub indicators: Vec<String>,

    #[serde(default)]
    pub city_location: Option<GeoLocation>,

    #[serde(default)]
    pub existing_data: Option<IndicatorValues>,

    #[serde(default)]
    pub data_points: Vec<DataPoint>,

    #[serde(default)]
    pub record: Option<EnhancedIndicatorRecord>,

    #[serde(default)]
    pub value: Option<f64>,

    #[serde(default)]
    pub min_benchmark: Option<f64>,

    #[serde(default)]
    pub max_benchmark: Option<f64>,

    /// Produced values are saved for this user when present
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EnhancementResponse {
    pub action: String,
    pub message: String,

    pub record: Option<EnhancedIndicatorRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<EnhancementBatch>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl EnhancementResponse {
    pub fn single(action: EnhancementAction, message: impl Into<String>, record: Option<EnhancedIndicatorRecord>) -> Self {
        Self {
            action: action.as_str().to_string(),
            message: message.into(),
            record,
            records: None,
            score: None,
        }
    }

    pub fn batch(action: EnhancementAction, message: impl Into<String>, records: EnhancementBatch) -> Self {
        Self {
            action: action.as_str().to_string(),
            message: message.into(),
            record: None,
            records: Some(records),
            score: None,
        }
    }

    pub fn score(action: EnhancementAction, message: impl Into<String>, score: f64) -> Self {
        Self {
            action: action.as_str().to_string(),
            message: message.into(),
            record: None,
            records: None,
            score: Some(score),
        }
    }
}

// ============================================================================
// GET /api/v1/user/{user_id}/indicators
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIndicatorsResponse {
    pub user_id: String,
    pub indicators: HashMap<String, f64>,
    pub retrieved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        assert_eq!(EnhancementAction::from_str("predict"), Some(EnhancementAction::Predict));
        assert_eq!(EnhancementAction::from_str("HARMONIZE"), Some(EnhancementAction::Harmonize));
        assert_eq!(EnhancementAction::from_str("fill-missing"), Some(EnhancementAction::FillMissing));
        assert_eq!(EnhancementAction::from_str("delete"), None);
    }

    #[test]
    fn test_request_uses_camel_case_fields() {
        let request: EnhancementRequest = serde_json::from_str(
            r#"{
                "action": "predict",
                "indicatorName": "pm25_concentration",
                "existingData": {"co2_emissions": 10.0, "population": null},
                "cityLocation": {"lat": -1.29, "lon": 36.82},
                "userId": "user-1"
            }"#,
        )
        .unwrap();

        assert_eq!(request.indicator_name.as_deref(), Some("pm25_concentration"));
        let existing = request.existing_data.unwrap();
        assert_eq!(existing["co2_emissions"], Some(10.0));
        assert_eq!(existing["population"], None);
        assert!(request.city_location.is_some());
        assert!(request.data_points.is_empty());
    }

    #[test]
    fn test_single_response_keeps_null_record() {
        let body = serde_json::to_value(EnhancementResponse::single(
            EnhancementAction::Predict,
            "Insufficient proxy data",
            None,
        ))
        .unwrap();

        assert!(body["record"].is_null());
        assert!(body.get("records").is_none());
        assert!(body.get("score").is_none());
    }

    #[test]
    fn test_register_request_flattens_source() {
        let request: RegisterSourceRequest = serde_json::from_str(
            r#"{
                "id": "traffic_cams",
                "name": "Traffic Cameras",
                "type": "sensor",
                "refreshFrequency": "real-time",
                "reliability": 0.6,
                "indicators": ["pm25_concentration"]
            }"#,
        )
        .unwrap();

        assert_eq!(request.source.id, "traffic_cams");
        assert!(request.source.is_active);
        assert_eq!(request.indicators, vec!["pm25_concentration"]);
    }
}
