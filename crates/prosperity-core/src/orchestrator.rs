//! Sequences collection, harmonization and prediction for each indicator
//!
//! Per indicator: collect → harmonize → validate, or, when nothing was collected
//! and the caller supplied known values, predict from proxies. There is no retry
//! at this level; retries happen per source inside the collector.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::collector::Collector;
use crate::harmonizer::Harmonizer;
use crate::models::{EnhancedIndicatorRecord, EnhancementBatch, GeoLocation, IndicatorValues};
use crate::predictor::Predictor;
use crate::provider::ProviderSet;
use crate::registry::SourceRegistry;
use crate::settings::PipelineSettings;

#[derive(Clone)]
pub struct Orchestrator {
    collector: Arc<Collector>,
    harmonizer: Arc<Harmonizer>,
    predictor: Arc<Predictor>,
}

impl Orchestrator {
    pub fn new(collector: Arc<Collector>, harmonizer: Arc<Harmonizer>, predictor: Arc<Predictor>) -> Self {
        Self {
            collector,
            harmonizer,
            predictor,
        }
    }

    /// Wire the default registry, simulated providers and built-in models
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = SourceRegistry::with_defaults(clock.as_ref());
        let providers = ProviderSet::simulated(&settings.simulation);

        let collector = Collector::new(registry, providers, Arc::clone(&clock), settings.collector.clone());
        let harmonizer = Harmonizer::new(settings.harmonizer.clone());
        let predictor = Predictor::new(settings.predictor.clone()).with_clock(clock);

        Self::new(Arc::new(collector), Arc::new(harmonizer), Arc::new(predictor))
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn harmonizer(&self) -> &Harmonizer {
        &self.harmonizer
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn registry(&self) -> &SourceRegistry {
        self.collector.registry()
    }

    /// Best available record for one indicator, or `None` if neither collection
    /// nor prediction produced one.
    pub async fn get_enhanced_indicator_data(
        &self,
        indicator: &str,
        location: Option<GeoLocation>,
        existing_data: Option<&IndicatorValues>,
    ) -> Option<EnhancedIndicatorRecord> {
        self.get_enhanced_with_cancel(indicator, location, existing_data, &CancellationToken::new())
            .await
    }

    pub async fn get_enhanced_with_cancel(
        &self,
        indicator: &str,
        location: Option<GeoLocation>,
        existing_data: Option<&IndicatorValues>,
        cancel: &CancellationToken,
    ) -> Option<EnhancedIndicatorRecord> {
        let start = Instant::now();
        let points = self
            .collector
            .collect_with_cancel(indicator, location, cancel)
            .await;

        if !points.is_empty() {
            let record = self
                .harmonizer
                .harmonize_indicator_data(&points)
                .map(|record| self.harmonizer.validate_and_clean(record));

            tracing::info!(
                indicator = %indicator,
                readings = points.len(),
                has_value = record.as_ref().and_then(|r| r.value).is_some(),
                duration_ms = %start.elapsed().as_millis(),
                "Indicator enhanced from collected data"
            );
            return record;
        }

        let Some(existing) = existing_data else {
            tracing::info!(indicator = %indicator, "No data collected and no known values to predict from");
            return None;
        };

        match self.predictor.predict_missing_value(indicator, existing) {
            Ok(record) => {
                tracing::info!(
                    indicator = %indicator,
                    predicted = record.is_some(),
                    duration_ms = %start.elapsed().as_millis(),
                    "Indicator enhanced by prediction fallback"
                );
                record
            }
            Err(e) => {
                tracing::warn!(indicator = %indicator, error = %e, "Prediction fallback failed");
                None
            }
        }
    }

    /// Enhanced record for each of `indicators`, collected concurrently
    pub async fn assess_data_quality(
        &self,
        indicators: &[String],
        location: Option<GeoLocation>,
    ) -> EnhancementBatch {
        let records = join_all(
            indicators
                .iter()
                .map(|indicator| self.get_enhanced_indicator_data(indicator, location, None)),
        )
        .await;

        indicators.iter().cloned().zip(records).collect()
    }

    /// Predict indicators already known to be missing; no collection is attempted
    pub fn fill_missing_data(
        &self,
        missing_indicators: &[String],
        available_data: &IndicatorValues,
    ) -> EnhancementBatch {
        self.predictor
            .predict_missing_indicators(missing_indicators, available_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::{PipelineError, PipelineResult};
    use crate::models::{DataSource, SourceType};
    use crate::provider::DataProvider;
    use crate::settings::{CollectorSettings, PredictorSettings, SimulationSettings};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    const NAIROBI: GeoLocation = GeoLocation { lat: -1.2921, lon: 36.8219 };

    struct ConstantProvider(f64);

    #[async_trait]
    impl DataProvider for ConstantProvider {
        async fn fetch(&self, _: &DataSource, _: &str, _: Option<GeoLocation>) -> PipelineResult<Option<f64>> {
            Ok(Some(self.0))
        }
    }

    struct DownProvider;

    #[async_trait]
    impl DataProvider for DownProvider {
        async fn fetch(&self, source: &DataSource, _: &str, _: Option<GeoLocation>) -> PipelineResult<Option<f64>> {
            Err(PipelineError::SourceUnavailable {
                source_id: source.id.clone(),
                reason: "down".into(),
            })
        }
    }

    fn orchestrator(providers: ProviderSet) -> Orchestrator {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()));
        let registry = SourceRegistry::with_defaults(clock.as_ref());
        let settings = CollectorSettings {
            max_retries: 0,
            ..CollectorSettings::default()
        };
        let collector = Collector::new(registry, providers, Arc::clone(&clock), settings);
        let predictor = Predictor::new(PredictorSettings::default()).with_clock(clock);
        Orchestrator::new(Arc::new(collector), Arc::new(Harmonizer::default()), Arc::new(predictor))
    }

    fn all_down() -> ProviderSet {
        let mut set = ProviderSet::new();
        for t in [
            SourceType::Sensor,
            SourceType::Satellite,
            SourceType::Administrative,
            SourceType::GenericApi,
            SourceType::SocialMedia,
            SourceType::Manual,
        ] {
            set = set.with_provider(t, Arc::new(DownProvider));
        }
        set
    }

    fn pm25_proxies() -> IndicatorValues {
        [
            ("co2_emissions".to_string(), Some(10.0)),
            ("population".to_string(), Some(1_000_000.0)),
            ("number_of_monitoring_stations".to_string(), Some(5.0)),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_collected_readings_are_harmonized() {
        let providers = ProviderSet::new()
            .with_provider(SourceType::Sensor, Arc::new(ConstantProvider(20.0)))
            .with_provider(SourceType::Satellite, Arc::new(ConstantProvider(30.0)))
            .with_provider(SourceType::GenericApi, Arc::new(ConstantProvider(25.0)));

        let record = orchestrator(providers)
            .get_enhanced_indicator_data("pm25_concentration", Some(NAIROBI), None)
            .await
            .unwrap();

        let value = record.value.unwrap();
        assert!(value > 20.0 && value < 30.0);
        assert!(record.metadata.harmonization_applied);
        assert!(!record.is_ai_predicted);
        assert_eq!(record.sources.len(), 3);
        assert!(record.quality.ai_enhanced);
    }

    #[tokio::test]
    async fn test_implausible_collected_value_is_cleaned() {
        let providers = ProviderSet::new().with_provider(SourceType::Sensor, Arc::new(ConstantProvider(-40.0)));

        let record = orchestrator(providers)
            .get_enhanced_indicator_data("pm10_concentration", None, None)
            .await
            .unwrap();

        assert_eq!(record.value, None);
        assert!(record.metadata.outlier_detected);
    }

    #[tokio::test]
    async fn test_falls_back_to_prediction() {
        let record = orchestrator(all_down())
            .get_enhanced_indicator_data("pm25_concentration", Some(NAIROBI), Some(&pm25_proxies()))
            .await
            .unwrap();

        assert!(record.is_ai_predicted);
        assert!(record.is_predicted_from_proxy);
        assert!((record.value.unwrap() - 29.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_data_and_no_known_values_yields_none() {
        let record = orchestrator(all_down())
            .get_enhanced_indicator_data("pm25_concentration", Some(NAIROBI), None)
            .await;
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_unpredictable_indicator_yields_none() {
        let record = orchestrator(all_down())
            .get_enhanced_indicator_data("homicide_rate", None, Some(&pm25_proxies()))
            .await;
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_assess_data_quality_per_indicator() {
        let o = orchestrator(ProviderSet::simulated(&SimulationSettings {
            seed: Some(5),
            failure_rate: 0.0,
        }));
        let indicators = vec![
            "life_expectancy".to_string(),
            "literacy_rate".to_string(),
            "unknown_indicator".to_string(),
        ];

        let batch = o.assess_data_quality(&indicators, Some(NAIROBI)).await;
        assert_eq!(batch.len(), 3);
        assert!(batch["life_expectancy"].as_ref().and_then(|r| r.value).is_some());
        assert!(batch["literacy_rate"].is_some());
        assert!(batch["unknown_indicator"].is_none());
    }

    #[test]
    fn test_fill_missing_data_predicts_without_collecting() {
        let o = orchestrator(all_down());
        let batch = o.fill_missing_data(
            &["pm25_concentration".to_string(), "green_area_per_capita".to_string()],
            &pm25_proxies(),
        );
        assert!(batch["pm25_concentration"].is_some());
        assert!(batch["green_area_per_capita"].is_none());
    }

    #[tokio::test]
    async fn test_from_settings_wires_defaults() {
        let o = Orchestrator::from_settings(&PipelineSettings::default());
        assert_eq!(o.registry().get_active_sources().await.len(), 9);
        assert_eq!(o.predictor().get_available_models().len(), 6);
    }
}
