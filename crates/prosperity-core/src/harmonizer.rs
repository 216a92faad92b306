//! Reconciles multiple readings of one indicator into a single value
//!
//! Readings are averaged with their own quality as weight, quality sub-scores are
//! averaged with source reliability as weight, and statistical outliers are
//! flagged (and optionally excluded, depending on [`OutlierPolicy`]).

use crate::benchmarks::{benchmark_for, is_inverse, must_be_non_negative, DEFAULT_BENCHMARK};
use crate::models::{DataPoint, DataSource, EnhancedIndicatorRecord, EnhancementMetadata};
use crate::quality::DataQuality;
use crate::settings::{HarmonizerSettings, OutlierPolicy};

/// Score returned when a benchmark collapses to a single point
pub const DEGENERATE_SCORE: f64 = 50.0;

const EXTREME_OUTLIER_PENALTY: f64 = 0.5;
const NEGATIVE_VALUE_PENALTY: f64 = 0.3;

/// Outlier detection needs at least this many values
const MIN_OUTLIER_SAMPLE: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct Harmonizer {
    settings: HarmonizerSettings,
}

impl Harmonizer {
    pub fn new(settings: HarmonizerSettings) -> Self {
        Self { settings }
    }

    /// Merge readings of one indicator.
    ///
    /// Empty input gives `None`; a single reading is passed through untouched.
    /// With several readings, at least one must carry a value.
    pub fn harmonize_indicator_data(&self, points: &[DataPoint]) -> Option<EnhancedIndicatorRecord> {
        match points {
            [] => None,
            [single] => Some(EnhancedIndicatorRecord::from_point(single)),
            _ => self.harmonize_many(points),
        }
    }

    fn harmonize_many(&self, points: &[DataPoint]) -> Option<EnhancedIndicatorRecord> {
        let indicator = points[0].indicator.clone();
        let valid: Vec<(f64, f64)> = points
            .iter()
            .filter_map(|p| p.valid_value().map(|v| (v, p.quality.overall_score)))
            .collect();

        if valid.is_empty() {
            tracing::warn!(indicator = %indicator, readings = points.len(), "No reading carries a value, nothing to harmonize");
            return None;
        }

        let values: Vec<f64> = valid.iter().map(|(v, _)| *v).collect();
        let outlier_detected = self.detect_outliers(&values);

        let averaged: Vec<(f64, f64)> = match self.settings.outlier_policy {
            OutlierPolicy::ExcludeAndReweight if outlier_detected => {
                let kept = self.without_outliers(&valid);
                tracing::info!(
                    indicator = %indicator,
                    excluded = valid.len() - kept.len(),
                    "Excluding outliers from harmonized value"
                );
                kept
            }
            _ => valid,
        };

        let value = weighted_average(&averaged);

        let quality = DataQuality::weighted_mean(
            points.iter().map(|p| (&p.quality, p.source.reliability)),
        )?
        .enhanced();

        let mut sources: Vec<DataSource> = Vec::with_capacity(points.len());
        for point in points {
            if !sources.iter().any(|s| s.id == point.source.id) {
                sources.push(point.source.clone());
            }
        }

        let last_updated = points.iter().map(|p| p.timestamp).max()?;

        if outlier_detected {
            tracing::info!(indicator = %indicator, readings = values.len(), "Outlier detected among readings");
        }
        tracing::debug!(
            indicator = %indicator,
            value = %value,
            overall_score = %quality.overall_score,
            "Readings harmonized"
        );

        Some(EnhancedIndicatorRecord {
            indicator,
            value: Some(value),
            original_value: values.first().copied(),
            is_ai_predicted: false,
            is_predicted_from_proxy: false,
            quality,
            sources,
            last_updated,
            metadata: EnhancementMetadata {
                prediction_method: None,
                proxy_indicators: Vec::new(),
                harmonization_applied: true,
                outlier_detected,
            },
        })
    }

    /// True when any value lies more than `outlier_sigma` population standard
    /// deviations from the mean. Needs at least three values.
    pub fn detect_outliers(&self, values: &[f64]) -> bool {
        let Some((mean, std_dev)) = mean_and_std_dev(values) else {
            return false;
        };
        let limit = self.settings.outlier_sigma * std_dev;
        values.iter().any(|v| (v - mean).abs() > limit)
    }

    fn without_outliers(&self, readings: &[(f64, f64)]) -> Vec<(f64, f64)> {
        let values: Vec<f64> = readings.iter().map(|(v, _)| *v).collect();
        let Some((mean, std_dev)) = mean_and_std_dev(&values) else {
            return readings.to_vec();
        };
        let limit = self.settings.outlier_sigma * std_dev;
        let kept: Vec<(f64, f64)> = readings
            .iter()
            .copied()
            .filter(|(v, _)| (v - mean).abs() <= limit)
            .collect();

        if kept.is_empty() {
            readings.to_vec()
        } else {
            kept
        }
    }

    /// Rescale a raw value onto 0–100 against the indicator's benchmark.
    ///
    /// Explicit bounds override the table; indicators without an entry use 0–100.
    /// For inverse indicators a lower raw value scores higher.
    pub fn normalize_to_standard_scale(
        &self,
        value: f64,
        indicator: &str,
        min_benchmark: Option<f64>,
        max_benchmark: Option<f64>,
    ) -> f64 {
        let table = benchmark_for(indicator).unwrap_or(DEFAULT_BENCHMARK);
        let mut min = min_benchmark.unwrap_or(table.min);
        let mut max = max_benchmark.unwrap_or(table.max);
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }

        if max == min {
            return DEGENERATE_SCORE;
        }
        if value.is_nan() {
            return 0.0;
        }

        let score = if is_inverse(indicator) {
            if value <= min {
                100.0
            } else if value >= max {
                0.0
            } else {
                100.0 * (1.0 - (value - min) / (max - min))
            }
        } else if value >= max {
            100.0
        } else if value <= min {
            0.0
        } else {
            100.0 * (value - min) / (max - min)
        };

        score.clamp(0.0, 100.0)
    }

    /// Null out values that can only be data errors and penalize the record's score.
    pub fn validate_and_clean(&self, record: EnhancedIndicatorRecord) -> EnhancedIndicatorRecord {
        let Some(value) = record.value else {
            return record;
        };
        let mut cleaned = record;

        if let Some(benchmark) = benchmark_for(&cleaned.indicator) {
            let (lo, hi) = benchmark.plausible_band();
            if !value.is_finite() || value < lo || value > hi {
                tracing::warn!(
                    indicator = %cleaned.indicator,
                    value = %value,
                    lower = %lo,
                    upper = %hi,
                    "Value outside plausible band, discarding"
                );
                cleaned = reject(cleaned, EXTREME_OUTLIER_PENALTY);
            }
        }

        if must_be_non_negative(&cleaned.indicator) && value < 0.0 {
            tracing::warn!(indicator = %cleaned.indicator, value = %value, "Negative value for non-negative indicator, discarding");
            cleaned = reject(cleaned, NEGATIVE_VALUE_PENALTY);
        }

        cleaned
    }
}

fn reject(mut record: EnhancedIndicatorRecord, penalty: f64) -> EnhancedIndicatorRecord {
    record.value = None;
    record.quality = record.quality.penalized(penalty);
    record.metadata.outlier_detected = true;
    record
}

/// Σ(value·weight)/Σweight, or the plain mean when every weight is zero
fn weighted_average(readings: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = readings.iter().map(|(_, w)| w.max(0.0)).sum();
    if total_weight > 0.0 {
        readings.iter().map(|(v, w)| v * w.max(0.0)).sum::<f64>() / total_weight
    } else {
        readings.iter().map(|(v, _)| v).sum::<f64>() / readings.len() as f64
    }
}

fn mean_and_std_dev(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < MIN_OUTLIER_SAMPLE {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RefreshFrequency, SourceType};
    use chrono::{Duration, TimeZone, Utc};

    fn point(source_id: &str, value: Option<f64>, score: f64, reliability: f64) -> DataPoint {
        DataPoint {
            indicator: "pm25_concentration".to_string(),
            value,
            timestamp: Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
            source: DataSource::new(source_id, source_id, SourceType::Sensor, RefreshFrequency::RealTime, reliability),
            quality: DataQuality::from_scores(score, score, score, score, score),
            metadata: None,
        }
    }

    fn record(indicator: &str, value: f64) -> EnhancedIndicatorRecord {
        let mut p = point("s", Some(value), 0.8, 0.9);
        p.indicator = indicator.to_string();
        EnhancedIndicatorRecord::from_point(&p)
    }

    #[test]
    fn test_empty_input_yields_none() {
        assert!(Harmonizer::default().harmonize_indicator_data(&[]).is_none());
    }

    #[test]
    fn test_single_reading_passes_through() {
        let p = point("a", Some(12.5), 0.7, 0.9);
        let record = Harmonizer::default().harmonize_indicator_data(&[p.clone()]).unwrap();

        assert_eq!(record.value, Some(12.5));
        assert_eq!(record.quality, p.quality);
        assert!(!record.quality.ai_enhanced);
        assert!(!record.metadata.harmonization_applied);
    }

    #[test]
    fn test_weighted_toward_higher_quality() {
        let points = [point("a", Some(10.0), 0.8, 0.9), point("b", Some(20.0), 0.9, 0.9)];
        let record = Harmonizer::default().harmonize_indicator_data(&points).unwrap();

        let value = record.value.unwrap();
        assert!((value - 26.0 / 1.7).abs() < 1e-9);
        assert!((value - 15.29).abs() < 0.01);
        assert!(record.quality.ai_enhanced);
        assert_eq!(record.quality.confidence, record.quality.overall_score);
        assert!(record.metadata.harmonization_applied);
        assert!(!record.metadata.outlier_detected);
        assert_eq!(record.original_value, Some(10.0));
        assert_eq!(record.sources.len(), 2);
    }

    #[test]
    fn test_quality_weighted_by_source_reliability() {
        let points = [point("a", Some(1.0), 1.0, 0.75), point("b", Some(2.0), 0.0, 0.25)];
        let record = Harmonizer::default().harmonize_indicator_data(&points).unwrap();
        assert!((record.quality.overall_score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_weights_fall_back_to_mean() {
        let points = [point("a", Some(10.0), 0.0, 0.0), point("b", Some(20.0), 0.0, 0.0)];
        let record = Harmonizer::default().harmonize_indicator_data(&points).unwrap();
        assert_eq!(record.value, Some(15.0));
    }

    #[test]
    fn test_null_readings_are_skipped_but_counted_in_quality() {
        let points = [point("a", None, 0.5, 0.9), point("b", Some(30.0), 0.9, 0.9)];
        let record = Harmonizer::default().harmonize_indicator_data(&points).unwrap();
        assert_eq!(record.value, Some(30.0));
        assert_eq!(record.original_value, Some(30.0));
        assert!((record.quality.overall_score - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_all_null_readings_yield_none() {
        let points = [point("a", None, 0.5, 0.9), point("b", None, 0.9, 0.9)];
        assert!(Harmonizer::default().harmonize_indicator_data(&points).is_none());
    }

    #[test]
    fn test_duplicate_sources_listed_once() {
        let mut late = point("a", Some(11.0), 0.8, 0.9);
        late.timestamp += Duration::minutes(5);
        let points = [point("a", Some(10.0), 0.8, 0.9), late.clone()];
        let record = Harmonizer::default().harmonize_indicator_data(&points).unwrap();
        assert_eq!(record.sources.len(), 1);
        assert_eq!(record.last_updated, late.timestamp);
    }

    #[test]
    fn test_outlier_detection() {
        let harmonizer = Harmonizer::default();
        assert!(harmonizer.detect_outliers(&[10.0, 10.1, 9.9, 10.0, 10.2, 9.8, 50.0]));
        assert!(!harmonizer.detect_outliers(&[10.0, 10.1, 9.9, 10.0, 10.2, 9.8]));
        assert!(!harmonizer.detect_outliers(&[1.0, 1000.0]));
        assert!(!harmonizer.detect_outliers(&[5.0, 5.0, 5.0]));
    }

    fn spiked_points() -> Vec<DataPoint> {
        let mut values = vec![10.0, 10.1, 9.9, 10.0, 10.2, 9.8];
        values.push(50.0);
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| point(&format!("s{i}"), Some(v), 0.8, 0.9))
            .collect()
    }

    #[test]
    fn test_outliers_flagged_not_excluded_by_default() {
        let record = Harmonizer::default().harmonize_indicator_data(&spiked_points()).unwrap();
        assert!(record.metadata.outlier_detected);
        let expected = (60.0 + 50.0) / 7.0;
        assert!((record.value.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_exclude_and_reweight_policy() {
        let harmonizer = Harmonizer::new(HarmonizerSettings {
            outlier_policy: OutlierPolicy::ExcludeAndReweight,
            ..HarmonizerSettings::default()
        });
        let record = harmonizer.harmonize_indicator_data(&spiked_points()).unwrap();
        assert!(record.metadata.outlier_detected);
        assert!((record.value.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_non_inverse() {
        let h = Harmonizer::default();
        assert_eq!(h.normalize_to_standard_scale(100.0, "literacy_rate", None, None), 100.0);
        assert_eq!(h.normalize_to_standard_scale(50.0, "literacy_rate", None, None), 50.0);
        assert_eq!(h.normalize_to_standard_scale(0.0, "literacy_rate", None, None), 0.0);
        assert_eq!(h.normalize_to_standard_scale(140.0, "literacy_rate", None, None), 100.0);
    }

    #[test]
    fn test_normalize_inverse() {
        let h = Harmonizer::default();
        assert_eq!(h.normalize_to_standard_scale(0.0, "pm25_concentration", None, None), 100.0);
        assert_eq!(h.normalize_to_standard_scale(75.0, "pm25_concentration", None, None), 0.0);
        let mid = h.normalize_to_standard_scale(37.5, "pm25_concentration", None, None);
        assert!((mid - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_overrides_and_degenerate_range() {
        let h = Harmonizer::default();
        assert_eq!(h.normalize_to_standard_scale(5.0, "literacy_rate", Some(0.0), Some(10.0)), 50.0);
        assert_eq!(h.normalize_to_standard_scale(5.0, "literacy_rate", Some(7.0), Some(7.0)), DEGENERATE_SCORE);
        assert_eq!(h.normalize_to_standard_scale(25.0, "bike_lanes_km", None, None), 25.0);
    }

    #[test]
    fn test_validate_keeps_plausible_values() {
        let cleaned = Harmonizer::default().validate_and_clean(record("pm25_concentration", 35.0));
        assert_eq!(cleaned.value, Some(35.0));
        assert!(!cleaned.metadata.outlier_detected);
        assert!((cleaned.quality.overall_score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_extreme_values() {
        let cleaned = Harmonizer::default().validate_and_clean(record("pm25_concentration", 400.0));
        assert_eq!(cleaned.value, None);
        assert!(cleaned.metadata.outlier_detected);
        assert!((cleaned.quality.overall_score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let cleaned = Harmonizer::default().validate_and_clean(record("literacy_rate", -5.0));
        assert_eq!(cleaned.value, None);
        assert!(cleaned.metadata.outlier_detected);
        assert!((cleaned.quality.overall_score - 0.24).abs() < 1e-12);
    }

    #[test]
    fn test_validate_applies_both_penalties() {
        let cleaned = Harmonizer::default().validate_and_clean(record("literacy_rate", -500.0));
        assert_eq!(cleaned.value, None);
        assert!((cleaned.quality.overall_score - 0.8 * 0.5 * 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_validate_leaves_unbenchmarked_signed_values() {
        let cleaned = Harmonizer::default().validate_and_clean(record("net_migration", -1200.0));
        assert_eq!(cleaned.value, Some(-1200.0));
    }
}
