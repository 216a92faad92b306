//! Tunable pipeline settings
//!
//! Every field has a serde default so a partially filled config section still
//! deserializes; the server embeds these sections in its own configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub collector: CollectorSettings,
    #[serde(default)]
    pub harmonizer: HarmonizerSettings,
    #[serde(default)]
    pub predictor: PredictorSettings,
    #[serde(default)]
    pub simulation: SimulationSettings,
}

/// Per-source fan-out limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectorSettings {
    /// Upper bound on a single source attempt
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
    /// Extra attempts after the first, for transient failures only
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff before the first retry; doubled on each further attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            source_timeout_ms: default_source_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_source_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    100
}

/// What to do with readings flagged as statistical outliers
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutlierPolicy {
    /// Flag in metadata, keep in the average
    #[default]
    FlagOnly,
    /// Flag, drop from the average and re-weight the rest
    ExcludeAndReweight,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarmonizerSettings {
    #[serde(default)]
    pub outlier_policy: OutlierPolicy,
    /// Distance from the mean, in standard deviations, beyond which a value is an outlier
    #[serde(default = "default_outlier_sigma")]
    pub outlier_sigma: f64,
}

impl Default for HarmonizerSettings {
    fn default() -> Self {
        Self {
            outlier_policy: OutlierPolicy::default(),
            outlier_sigma: default_outlier_sigma(),
        }
    }
}

fn default_outlier_sigma() -> f64 {
    2.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictorSettings {
    /// Minimum fraction of a model's proxies that must be present
    #[serde(default = "default_proxy_coverage_threshold")]
    pub proxy_coverage_threshold: f64,
    /// Number of perturbed variants averaged by ensemble models
    #[serde(default = "default_ensemble_size")]
    pub ensemble_size: usize,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            proxy_coverage_threshold: default_proxy_coverage_threshold(),
            ensemble_size: default_ensemble_size(),
        }
    }
}

fn default_proxy_coverage_threshold() -> f64 {
    0.6
}

fn default_ensemble_size() -> usize {
    5
}

/// Knobs for the simulated provider that stands in for real network clients
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimulationSettings {
    /// Fixed seed for reproducible readings; entropy when unset
    #[serde(default)]
    pub seed: Option<u64>,
    /// Fraction of fetches that fail as if the source were down
    #[serde(default)]
    pub failure_rate: f64,
}
