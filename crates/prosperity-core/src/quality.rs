//! Quality model shared by collection, harmonization and prediction
//!
//! A quality is five sub-scores in [0, 1] plus their mean. It is never patched in
//! place by the pipeline; each stage computes a fresh one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::DataSource;

/// Placeholder until consistency is measured from cross-reading variance
pub const BASELINE_CONSISTENCY: f64 = 0.9;

/// Timeliness for sources without a decay window or without a last update
pub const DEFAULT_TIMELINESS: f64 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub completeness: f64,
    pub accuracy: f64,
    pub consistency: f64,
    pub timeliness: f64,
    pub reliability: f64,
    pub overall_score: f64,
    #[serde(rename = "aiEnhanced")]
    pub ai_enhanced: bool,
    pub confidence: f64,
}

impl DataQuality {
    /// Build a quality from its five sub-scores. Each is clamped into [0, 1] and
    /// the overall score is their arithmetic mean; confidence starts equal to it.
    pub fn from_scores(
        completeness: f64,
        accuracy: f64,
        consistency: f64,
        timeliness: f64,
        reliability: f64,
    ) -> Self {
        let completeness = unit(completeness);
        let accuracy = unit(accuracy);
        let consistency = unit(consistency);
        let timeliness = unit(timeliness);
        let reliability = unit(reliability);
        let overall_score =
            (completeness + accuracy + consistency + timeliness + reliability) / 5.0;

        Self {
            completeness,
            accuracy,
            consistency,
            timeliness,
            reliability,
            overall_score,
            ai_enhanced: false,
            confidence: overall_score,
        }
    }

    /// Quality of a single reading taken from `source` at `now`.
    pub fn for_reading(source: &DataSource, has_value: bool, now: DateTime<Utc>) -> Self {
        Self::from_scores(
            if has_value { 1.0 } else { 0.0 },
            source.reliability,
            BASELINE_CONSISTENCY,
            timeliness(source, now),
            source.reliability,
        )
    }

    /// Reliability-weighted mean of each sub-score across `inputs`.
    /// Falls back to an unweighted mean when every weight is zero.
    pub fn weighted_mean<'a, I>(inputs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a DataQuality, f64)>,
    {
        let inputs: Vec<(&DataQuality, f64)> = inputs.into_iter().collect();
        if inputs.is_empty() {
            return None;
        }

        let total_weight: f64 = inputs.iter().map(|(_, w)| w.max(0.0)).sum();
        let weight_of = |w: f64| {
            if total_weight > 0.0 {
                w.max(0.0) / total_weight
            } else {
                1.0 / inputs.len() as f64
            }
        };
        let mean = |field: fn(&DataQuality) -> f64| -> f64 {
            inputs.iter().map(|(q, w)| field(q) * weight_of(*w)).sum()
        };

        Some(Self::from_scores(
            mean(|q| q.completeness),
            mean(|q| q.accuracy),
            mean(|q| q.consistency),
            mean(|q| q.timeliness),
            mean(|q| q.reliability),
        ))
    }

    /// Mark as produced by the enhancement pipeline with confidence pinned to the
    /// overall score.
    pub fn enhanced(mut self) -> Self {
        self.ai_enhanced = true;
        self.confidence = self.overall_score;
        self
    }

    /// Penalize the overall score, e.g. after a value has been rejected.
    pub fn penalized(mut self, factor: f64) -> Self {
        self.overall_score = unit(self.overall_score * factor);
        self
    }
}

/// Linear decay from 1 at the source's last update to 0 at the end of its
/// refresh window.
pub fn timeliness(source: &DataSource, now: DateTime<Utc>) -> f64 {
    let (Some(window), Some(last_updated)) =
        (source.refresh_frequency.decay_window(), source.last_updated)
    else {
        return DEFAULT_TIMELINESS;
    };

    let window_ms = window.num_milliseconds() as f64;
    let elapsed_ms = (now - last_updated).num_milliseconds().max(0) as f64;
    unit(1.0 - elapsed_ms / window_ms)
}

fn unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RefreshFrequency, SourceType};
    use chrono::{Duration, TimeZone};

    fn source(freq: RefreshFrequency, reliability: f64) -> DataSource {
        DataSource::new("s", "Source", SourceType::Sensor, freq, reliability)
    }

    #[test]
    fn test_overall_is_mean_of_five() {
        let q = DataQuality::from_scores(1.0, 0.8, 0.9, 0.5, 0.8);
        assert!((q.overall_score - 0.8).abs() < 1e-12);
        assert!(!q.ai_enhanced);
    }

    #[test]
    fn test_scores_are_clamped() {
        let q = DataQuality::from_scores(1.5, -0.2, f64::NAN, 0.5, 2.0);
        assert_eq!(q.completeness, 1.0);
        assert_eq!(q.accuracy, 0.0);
        assert_eq!(q.consistency, 0.0);
        assert_eq!(q.reliability, 1.0);
    }

    #[test]
    fn test_timeliness_decays_over_window() {
        let updated = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let s = source(RefreshFrequency::RealTime, 0.9).with_last_updated(updated);

        assert_eq!(timeliness(&s, updated), 1.0);
        let half = timeliness(&s, updated + Duration::minutes(30));
        assert!((half - 0.5).abs() < 1e-9);
        assert_eq!(timeliness(&s, updated + Duration::hours(2)), 0.0);
    }

    #[test]
    fn test_timeliness_defaults() {
        let now = Utc::now();
        let yearly = source(RefreshFrequency::Yearly, 0.9).with_last_updated(now);
        assert_eq!(timeliness(&yearly, now), DEFAULT_TIMELINESS);

        let never_updated = source(RefreshFrequency::Daily, 0.9);
        assert_eq!(timeliness(&never_updated, now), DEFAULT_TIMELINESS);
    }

    #[test]
    fn test_reading_quality_without_value() {
        let now = Utc::now();
        let s = source(RefreshFrequency::Hourly, 0.6).with_last_updated(now);
        let q = DataQuality::for_reading(&s, false, now);
        assert_eq!(q.completeness, 0.0);
        assert_eq!(q.accuracy, 0.6);
        assert_eq!(q.consistency, BASELINE_CONSISTENCY);
        assert_eq!(q.timeliness, 1.0);
        assert!((q.overall_score - (0.0 + 0.6 + 0.9 + 1.0 + 0.6) / 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_mean() {
        let a = DataQuality::from_scores(1.0, 1.0, 1.0, 1.0, 1.0);
        let b = DataQuality::from_scores(0.0, 0.0, 0.0, 0.0, 0.0);

        let q = DataQuality::weighted_mean([(&a, 3.0), (&b, 1.0)]).unwrap();
        assert!((q.overall_score - 0.75).abs() < 1e-12);

        let unweighted = DataQuality::weighted_mean([(&a, 0.0), (&b, 0.0)]).unwrap();
        assert!((unweighted.overall_score - 0.5).abs() < 1e-12);

        assert!(DataQuality::weighted_mean(std::iter::empty::<(&DataQuality, f64)>()).is_none());
    }
}
