//! Proxy-based prediction of missing indicators
//!
//! When no source has a reading, an indicator can still be estimated from other
//! indicators already known for the same city. Each predictable indicator has a
//! model description (kind, ordered proxies, accuracy) and a parameter set from a
//! [`ModelParameterStore`].

pub mod catalog;
pub mod parameters;

use std::sync::Arc;

pub use self::catalog::builtin_models;
pub use self::parameters::{ModelParameterStore, ModelParameters, StaticParameterStore};

use crate::benchmarks::must_be_non_negative;
use crate::clock::{Clock, SystemClock};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    EnhancedIndicatorRecord, EnhancementBatch, EnhancementMetadata, IndicatorValues, ModelKind,
    PredictionModel,
};
use crate::quality::{DataQuality, BASELINE_CONSISTENCY, DEFAULT_TIMELINESS};
use crate::settings::PredictorSettings;

pub struct Predictor {
    models: Vec<PredictionModel>,
    store: Arc<dyn ModelParameterStore>,
    clock: Arc<dyn Clock>,
    settings: PredictorSettings,
}

impl Predictor {
    /// Built-in catalog and coefficients
    pub fn new(settings: PredictorSettings) -> Self {
        Self {
            models: builtin_models(),
            store: Arc::new(StaticParameterStore::builtin()),
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_models(mut self, models: Vec<PredictionModel>) -> Self {
        self.models = models;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ModelParameterStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn get_available_models(&self) -> Vec<PredictionModel> {
        self.models.clone()
    }

    pub fn model_for(&self, indicator: &str) -> Option<&PredictionModel> {
        self.models.iter().find(|m| m.indicator == indicator)
    }

    /// Minimum number of proxies that must be present for `model`
    pub fn required_proxy_count(&self, model: &PredictionModel) -> usize {
        let total = model.proxy_indicators.len() as f64;
        // Tolerance keeps e.g. 0.6 * 5 from rounding up to 4
        ((self.settings.proxy_coverage_threshold * total) - 1e-9).ceil().max(0.0) as usize
    }

    pub fn can_predict(&self, indicator: &str, available_data: &IndicatorValues) -> bool {
        let Some(model) = self.model_for(indicator) else {
            return false;
        };
        if model.proxy_indicators.is_empty() {
            return false;
        }
        available_proxies(model, available_data).len() >= self.required_proxy_count(model)
    }

    /// Estimate `indicator` from its proxies.
    ///
    /// `Ok(None)` when no model is registered or too few proxies are present;
    /// `Err` only when the model itself cannot be evaluated.
    pub fn predict_missing_value(
        &self,
        indicator: &str,
        available_data: &IndicatorValues,
    ) -> PipelineResult<Option<EnhancedIndicatorRecord>> {
        let Some(model) = self.model_for(indicator) else {
            tracing::debug!(indicator = %indicator, "No prediction model registered");
            return Ok(None);
        };

        if !self.can_predict(indicator, available_data) {
            let declined = PipelineError::InsufficientProxyData {
                indicator: indicator.to_string(),
                available: available_proxies(model, available_data).len(),
                required: self.required_proxy_count(model),
            };
            tracing::info!(indicator = %indicator, reason = %declined, "Prediction declined");
            return Ok(None);
        }

        let parameters = self
            .store
            .parameters(indicator)
            .ok_or_else(|| PipelineError::UnknownModel(indicator.to_string()))?;

        let total = model.proxy_indicators.len();
        if parameters.arity() != Some(total) {
            return Err(PipelineError::Computation(format!(
                "parameters for {} do not match its {} proxies",
                indicator, total
            )));
        }

        let inputs: Vec<f64> = model
            .proxy_indicators
            .iter()
            .map(|proxy| present_value(available_data, proxy).unwrap_or(0.0))
            .collect();

        let value = match (model.kind, &parameters) {
            (ModelKind::LinearCombination, ModelParameters::Linear { intercept, weights }) => {
                let raw = linear(*intercept, weights, &inputs);
                if must_be_non_negative(indicator) {
                    raw.max(0.0)
                } else {
                    raw
                }
            }
            (ModelKind::EnsembleAverage, ModelParameters::Linear { intercept, weights }) => {
                ensemble(*intercept, weights, &inputs, self.settings.ensemble_size)?
            }
            (
                ModelKind::NeuralNetwork,
                ModelParameters::Network {
                    input_weights,
                    output_weights,
                    output_bias,
                },
            ) => network(input_weights, output_weights, *output_bias, &inputs),
            (kind, _) => {
                return Err(PipelineError::Computation(format!(
                    "{} model for {} has mismatched parameters",
                    kind, indicator
                )))
            }
        };

        if !value.is_finite() {
            return Err(PipelineError::Computation(format!(
                "{} prediction for {} is not finite",
                model.kind, indicator
            )));
        }

        let used: Vec<String> = available_proxies(model, available_data)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        let coverage = used.len() as f64 / total as f64;
        let confidence = model.accuracy * coverage.sqrt();

        let mut quality = DataQuality::from_scores(
            coverage,
            model.accuracy,
            BASELINE_CONSISTENCY,
            DEFAULT_TIMELINESS,
            model.accuracy,
        );
        quality.ai_enhanced = true;
        quality.confidence = confidence.clamp(0.0, 1.0);

        tracing::info!(
            indicator = %indicator,
            method = %model.kind,
            value = %value,
            confidence = %quality.confidence,
            proxies_used = used.len(),
            "Predicted missing indicator"
        );

        Ok(Some(EnhancedIndicatorRecord {
            indicator: indicator.to_string(),
            value: Some(value),
            original_value: None,
            is_ai_predicted: true,
            is_predicted_from_proxy: true,
            quality,
            sources: Vec::new(),
            last_updated: self.clock.now(),
            metadata: EnhancementMetadata {
                prediction_method: Some(model.kind),
                proxy_indicators: used,
                harmonization_applied: false,
                outlier_detected: false,
            },
        }))
    }

    /// Predict each indicator independently; a failure on one is recorded as
    /// `None` and does not affect the others.
    pub fn predict_missing_indicators(
        &self,
        indicators: &[String],
        available_data: &IndicatorValues,
    ) -> EnhancementBatch {
        indicators
            .iter()
            .map(|indicator| {
                let record = match self.predict_missing_value(indicator, available_data) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(indicator = %indicator, error = %e, "Prediction failed");
                        None
                    }
                };
                (indicator.clone(), record)
            })
            .collect()
    }
}

fn present_value(data: &IndicatorValues, indicator: &str) -> Option<f64> {
    data.get(indicator).copied().flatten().filter(|v| v.is_finite())
}

/// Proxies of `model` that carry a usable value, in model order
fn available_proxies(model: &PredictionModel, data: &IndicatorValues) -> Vec<(String, f64)> {
    model
        .proxy_indicators
        .iter()
        .filter_map(|proxy| present_value(data, proxy).map(|v| (proxy.clone(), v)))
        .collect()
}

fn linear(intercept: f64, weights: &[f64], inputs: &[f64]) -> f64 {
    intercept + weights.iter().zip(inputs).map(|(w, x)| w * x).sum::<f64>()
}

/// Average of `size` perturbed linear variants, variant i scaled by 1 + 0.1·(i+1)
fn ensemble(intercept: f64, weights: &[f64], inputs: &[f64], size: usize) -> PipelineResult<f64> {
    if size == 0 {
        return Err(PipelineError::Computation("ensemble size must be positive".to_string()));
    }
    let total: f64 = (0..size)
        .map(|i| {
            let scale = 1.0 + 0.1 * (i as f64 + 1.0);
            let scaled: Vec<f64> = weights.iter().map(|w| w * scale).collect();
            linear(intercept * scale, &scaled, inputs).max(0.0)
        })
        .sum();
    Ok(total / size as f64)
}

fn network(input_weights: &[f64], output_weights: &[f64], output_bias: f64, inputs: &[f64]) -> f64 {
    let output: f64 = input_weights
        .iter()
        .zip(output_weights)
        .zip(inputs)
        .map(|((w_in, w_out), x)| w_out * (w_in * x).max(0.0))
        .sum();
    (output + output_bias).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(entries: &[(&str, Option<f64>)]) -> IndicatorValues {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    fn predictor() -> Predictor {
        Predictor::new(PredictorSettings::default())
    }

    #[test]
    fn test_can_predict_with_all_proxies() {
        let available = data(&[
            ("co2_emissions", Some(10.0)),
            ("population", Some(1_000_000.0)),
            ("number_of_monitoring_stations", Some(5.0)),
        ]);
        assert!(predictor().can_predict("pm25_concentration", &available));
    }

    #[test]
    fn test_cannot_predict_unknown_indicator() {
        let available = data(&[("co2_emissions", Some(10.0))]);
        assert!(!predictor().can_predict("unknown_indicator", &available));
    }

    #[test]
    fn test_coverage_threshold_boundary() {
        let p = predictor();
        let two_of_three = data(&[("co2_emissions", Some(10.0)), ("population", Some(1e6))]);
        let one_of_three = data(&[("co2_emissions", Some(10.0))]);
        let null_proxy = data(&[("co2_emissions", Some(10.0)), ("population", None)]);

        assert!(p.can_predict("pm25_concentration", &two_of_three));
        assert!(!p.can_predict("pm25_concentration", &one_of_three));
        assert!(!p.can_predict("pm25_concentration", &null_proxy));
    }

    #[test]
    fn test_required_proxy_count() {
        let p = predictor();
        let three = p.model_for("pm25_concentration").unwrap();
        let four = p.model_for("life_expectancy").unwrap();
        let two = p.model_for("unemployment_rate").unwrap();
        assert_eq!(p.required_proxy_count(three), 2);
        assert_eq!(p.required_proxy_count(four), 3);
        assert_eq!(p.required_proxy_count(two), 2);
    }

    #[test]
    fn test_linear_prediction() {
        let available = data(&[
            ("co2_emissions", Some(10.0)),
            ("population", Some(1_000_000.0)),
            ("number_of_monitoring_stations", Some(5.0)),
        ]);
        let record = predictor()
            .predict_missing_value("pm25_concentration", &available)
            .unwrap()
            .unwrap();

        assert!((record.value.unwrap() - 29.5).abs() < 1e-9);
        assert!(record.is_ai_predicted);
        assert!(record.is_predicted_from_proxy);
        assert_eq!(record.original_value, None);
        assert_eq!(record.metadata.prediction_method, Some(ModelKind::LinearCombination));
        assert_eq!(record.metadata.proxy_indicators.len(), 3);
        assert!((record.quality.confidence - 0.78).abs() < 1e-12);
    }

    #[test]
    fn test_linear_prediction_floored_at_zero() {
        let available = data(&[
            ("co2_emissions", Some(0.0)),
            ("population", Some(0.0)),
            ("number_of_monitoring_stations", Some(100.0)),
        ]);
        let record = predictor()
            .predict_missing_value("pm25_concentration", &available)
            .unwrap()
            .unwrap();
        assert_eq!(record.value, Some(0.0));
    }

    #[test]
    fn test_partial_proxies_reduce_confidence() {
        let available = data(&[("co2_emissions", Some(10.0)), ("population", Some(1_000_000.0))]);
        let record = predictor()
            .predict_missing_value("pm25_concentration", &available)
            .unwrap()
            .unwrap();

        let expected = 0.78 * (2.0f64 / 3.0).sqrt();
        assert!((record.quality.confidence - expected).abs() < 1e-12);
        assert_eq!(
            record.metadata.proxy_indicators,
            vec!["co2_emissions".to_string(), "population".to_string()]
        );
        // Missing stations contribute nothing: 12 + 18 + 4
        assert!((record.value.unwrap() - 34.0).abs() < 1e-9);
    }

    #[test]
    fn test_ensemble_prediction() {
        let available = data(&[
            ("life_expectancy", Some(75.0)),
            ("gdp_per_capita", Some(20_000.0)),
            ("literacy_rate", Some(90.0)),
        ]);
        let record = predictor()
            .predict_missing_value("maternal_mortality", &available)
            .unwrap()
            .unwrap();

        // Base output 80; the five variants scale it by 1.1..=1.5, averaging 1.3
        assert!((record.value.unwrap() - 104.0).abs() < 1e-9);
        assert_eq!(record.metadata.prediction_method, Some(ModelKind::EnsembleAverage));
    }

    #[test]
    fn test_ensemble_floors_each_variant() {
        assert_eq!(ensemble(-10.0, &[1.0], &[2.0], 5).unwrap(), 0.0);
        assert!(ensemble(1.0, &[1.0], &[1.0], 0).is_err());
    }

    #[test]
    fn test_network_prediction() {
        let available = data(&[
            ("gdp_per_capita", Some(20_000.0)),
            ("literacy_rate", Some(90.0)),
            ("maternal_mortality", Some(100.0)),
            ("internet_access", Some(70.0)),
        ]);
        let record = predictor()
            .predict_missing_value("life_expectancy", &available)
            .unwrap()
            .unwrap();

        assert!((record.value.unwrap() - 77.1).abs() < 1e-9);
        assert_eq!(record.metadata.prediction_method, Some(ModelKind::NeuralNetwork));
    }

    #[test]
    fn test_network_relu_clips_negative_hidden_units() {
        assert_eq!(network(&[-1.0], &[1.0], 2.0, &[5.0]), 2.0);
        assert_eq!(network(&[1.0], &[-1.0], 2.0, &[5.0]), 0.0);
    }

    #[test]
    fn test_insufficient_proxies_yield_none() {
        let available = data(&[("gdp_per_capita", Some(20_000.0))]);
        let result = predictor().predict_missing_value("life_expectancy", &available).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_missing_parameters_are_an_error() {
        let p = predictor().with_store(Arc::new(StaticParameterStore::empty()));
        let available = data(&[("gdp_per_capita", Some(1.0)), ("mean_years_schooling", Some(1.0))]);
        assert!(matches!(
            p.predict_missing_value("unemployment_rate", &available),
            Err(PipelineError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_mismatched_parameters_are_an_error() {
        let mut store = StaticParameterStore::builtin();
        store.insert(
            "unemployment_rate",
            ModelParameters::Linear {
                intercept: 1.0,
                weights: vec![1.0],
            },
        );
        let p = predictor().with_store(Arc::new(store));
        let available = data(&[("gdp_per_capita", Some(1.0)), ("mean_years_schooling", Some(1.0))]);
        assert!(matches!(
            p.predict_missing_value("unemployment_rate", &available),
            Err(PipelineError::Computation(_))
        ));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let mut store = StaticParameterStore::builtin();
        store.insert(
            "unemployment_rate",
            ModelParameters::Network {
                input_weights: vec![1.0, 1.0],
                output_weights: vec![1.0, 1.0],
                output_bias: 0.0,
            },
        );
        let p = predictor().with_store(Arc::new(store));
        let available = data(&[
            ("gdp_per_capita", Some(20_000.0)),
            ("mean_years_schooling", Some(10.0)),
            ("internet_access", Some(70.0)),
        ]);
        let indicators = vec![
            "unemployment_rate".to_string(),
            "literacy_rate".to_string(),
            "unknown_indicator".to_string(),
        ];

        let batch = p.predict_missing_indicators(&indicators, &available);
        assert_eq!(batch.len(), 3);
        assert!(batch["unemployment_rate"].is_none());
        assert!(batch["literacy_rate"].is_some());
        assert!(batch["unknown_indicator"].is_none());
    }

    #[test]
    fn test_available_models() {
        let models = predictor().get_available_models();
        assert_eq!(models.len(), 6);
        assert!(models.iter().all(|m| m.accuracy > 0.0 && m.accuracy <= 1.0));
    }
}
