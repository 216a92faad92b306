//! Data models shared by every pipeline stage
//!
//! These are the structures that cross the boundary to the calculator pages:
//! sources, raw readings, enhanced records and the static prediction model catalog.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::quality::DataQuality;

/// Indicator readings already known for a subject, keyed by indicator name.
/// `None` marks an indicator the caller knows about but has no value for.
pub type IndicatorValues = HashMap<String, Option<f64>>;

/// Per-indicator result of a batch call. `None` means nothing could be produced.
pub type EnhancementBatch = BTreeMap<String, Option<EnhancedIndicatorRecord>>;

// =============================================================================
// Data Sources
// =============================================================================

/// Kind of upstream system a source represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Sensor,
    Satellite,
    SocialMedia,
    Administrative,
    GenericApi,
    Manual,
}

impl SourceType {
    /// Satellite imagery is only meaningful for a concrete footprint.
    pub fn requires_location(&self) -> bool {
        matches!(self, SourceType::Satellite)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Sensor => write!(f, "sensor"),
            SourceType::Satellite => write!(f, "satellite"),
            SourceType::SocialMedia => write!(f, "social-media"),
            SourceType::Administrative => write!(f, "administrative"),
            SourceType::GenericApi => write!(f, "generic-api"),
            SourceType::Manual => write!(f, "manual"),
        }
    }
}

/// How often a source publishes new readings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshFrequency {
    RealTime,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RefreshFrequency {
    /// Window over which a reading's timeliness decays linearly to zero.
    /// Yearly sources have no window and get a flat timeliness instead.
    pub fn decay_window(&self) -> Option<Duration> {
        match self {
            RefreshFrequency::RealTime => Some(Duration::hours(1)),
            RefreshFrequency::Hourly => Some(Duration::hours(24)),
            RefreshFrequency::Daily => Some(Duration::days(7)),
            RefreshFrequency::Weekly => Some(Duration::days(30)),
            RefreshFrequency::Monthly => Some(Duration::days(365)),
            RefreshFrequency::Yearly => None,
        }
    }
}

/// A registered data source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    /// Unique identifier; re-registering the same id overwrites the source
    pub id: String,

    /// Human-readable name
    pub name: String,

    #[serde(rename = "type")]
    pub source_type: SourceType,

    /// Provider endpoint, if the source is reached over the network
    #[serde(default)]
    pub endpoint: Option<String>,

    pub refresh_frequency: RefreshFrequency,

    /// Reliability in [0, 1]
    pub reliability: f64,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl DataSource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source_type: SourceType,
        refresh_frequency: RefreshFrequency,
        reliability: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_type,
            endpoint: None,
            refresh_frequency,
            reliability: reliability.clamp(0.0, 1.0),
            last_updated: None,
            is_active: true,
        }
    }

    pub fn with_last_updated(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = Some(at);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Geographic position of the city a request is about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub lat: f64,
    pub lon: f64,
}

// =============================================================================
// Readings
// =============================================================================

/// One reading of one indicator from one source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub indicator: String,

    /// The reading, or `None` when the source answered without a value
    pub value: Option<f64>,

    pub timestamp: DateTime<Utc>,

    pub source: DataSource,

    /// Quality of this single reading
    pub quality: DataQuality,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl DataPoint {
    /// The value if it is present and finite
    pub fn valid_value(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}

// =============================================================================
// Enhanced Records
// =============================================================================

/// How a record's value was obtained
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementMetadata {
    #[serde(default)]
    pub prediction_method: Option<ModelKind>,

    /// Proxies that actually fed a prediction
    #[serde(default)]
    pub proxy_indicators: Vec<String>,

    #[serde(default)]
    pub harmonization_applied: bool,

    #[serde(default)]
    pub outlier_detected: bool,
}

/// The unit returned across the system boundary: one indicator, one value,
/// plus everything a consumer needs to judge how much to trust it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedIndicatorRecord {
    pub indicator: String,

    pub value: Option<f64>,

    /// First raw value seen for this indicator
    pub original_value: Option<f64>,

    #[serde(rename = "isAIPredicted")]
    pub is_ai_predicted: bool,

    pub is_predicted_from_proxy: bool,

    pub quality: DataQuality,

    /// Sources that contributed readings
    pub sources: Vec<DataSource>,

    pub last_updated: DateTime<Utc>,

    pub metadata: EnhancementMetadata,
}

impl EnhancedIndicatorRecord {
    /// A record carrying a single reading as-is
    pub fn from_point(point: &DataPoint) -> Self {
        Self {
            indicator: point.indicator.clone(),
            value: point.value,
            original_value: point.value,
            is_ai_predicted: false,
            is_predicted_from_proxy: false,
            quality: point.quality.clone(),
            sources: vec![point.source.clone()],
            last_updated: point.timestamp,
            metadata: EnhancementMetadata::default(),
        }
    }
}

// =============================================================================
// Prediction Models
// =============================================================================

/// Family of model used to estimate an indicator from its proxies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ModelKind {
    #[serde(rename = "linear-combination")]
    LinearCombination,
    #[serde(rename = "ensemble-average")]
    EnsembleAverage,
    #[serde(rename = "single-hidden-layer-network")]
    NeuralNetwork,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::LinearCombination => write!(f, "linear-combination"),
            ModelKind::EnsembleAverage => write!(f, "ensemble-average"),
            ModelKind::NeuralNetwork => write!(f, "single-hidden-layer-network"),
        }
    }
}

/// Static description of how an indicator is predicted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionModel {
    pub indicator: String,

    pub kind: ModelKind,

    /// Ordered; parameter vectors line up with this list
    pub proxy_indicators: Vec<String>,

    /// Base accuracy in [0, 1]
    pub accuracy: f64,

    pub last_trained: DateTime<Utc>,
}
