//! Catalog of data sources and the indicator → source mapping

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::models::{DataSource, RefreshFrequency, SourceType};

/// Sources in registration order. Mutation is append or overwrite-by-id only;
/// nothing is ever removed.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Arc<RwLock<Vec<DataSource>>>,
    indicator_sources: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl SourceRegistry {
    /// Registry with no sources and no indicator mapping
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in sources, each stamped as updated now
    pub fn with_defaults(clock: &dyn Clock) -> Self {
        let now = clock.now();
        let sources = default_sources()
            .into_iter()
            .map(|s| s.with_last_updated(now))
            .collect::<Vec<_>>();

        tracing::debug!(source_count = sources.len(), "Initializing source registry with defaults");

        Self {
            sources: Arc::new(RwLock::new(sources)),
            indicator_sources: Arc::new(RwLock::new(default_indicator_sources())),
        }
    }

    /// All sources with `is_active` set, in registration order
    pub async fn get_active_sources(&self) -> Vec<DataSource> {
        self.sources
            .read()
            .await
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect()
    }

    pub async fn all_sources(&self) -> Vec<DataSource> {
        self.sources.read().await.clone()
    }

    pub async fn get_source(&self, id: &str) -> Option<DataSource> {
        self.sources.read().await.iter().find(|s| s.id == id).cloned()
    }

    /// Insert a source, or overwrite the one with the same id in place
    pub async fn add_data_source(&self, source: DataSource) {
        let mut sources = self.sources.write().await;
        match sources.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => {
                tracing::info!(source_id = %source.id, "Overwriting registered data source");
                *existing = source;
            }
            None => {
                tracing::info!(source_id = %source.id, source_type = %source.source_type, "Registering data source");
                sources.push(source);
            }
        }
    }

    /// Bind an indicator to source ids, replacing any previous binding
    pub async fn map_indicator(&self, indicator: &str, source_ids: Vec<String>) {
        self.indicator_sources
            .write()
            .await
            .insert(indicator.to_string(), source_ids);
    }

    /// Append one source id to an indicator's binding if it is not already there
    pub async fn attach_source(&self, indicator: &str, source_id: &str) {
        let mut mapping = self.indicator_sources.write().await;
        let ids = mapping.entry(indicator.to_string()).or_default();
        if !ids.iter().any(|id| id == source_id) {
            ids.push(source_id.to_string());
        }
    }

    /// Active sources mapped to `indicator`. Unknown indicators and dangling
    /// source ids resolve to nothing.
    pub async fn sources_for_indicator(&self, indicator: &str) -> Vec<DataSource> {
        let ids = match self.indicator_sources.read().await.get(indicator) {
            Some(ids) => ids.clone(),
            None => {
                tracing::debug!(indicator = %indicator, "No sources mapped for indicator");
                return Vec::new();
            }
        };

        let sources = self.sources.read().await;
        ids.iter()
            .filter_map(|id| {
                let found = sources.iter().find(|s| &s.id == id);
                if found.is_none() {
                    tracing::debug!(indicator = %indicator, source_id = %id, "Mapped source is not registered");
                }
                found
            })
            .filter(|s| s.is_active)
            .cloned()
            .collect()
    }

    /// Indicators that have at least one mapped source id, sorted
    pub async fn mapped_indicators(&self) -> Vec<String> {
        let mut indicators: Vec<String> =
            self.indicator_sources.read().await.keys().cloned().collect();
        indicators.sort();
        indicators
    }
}

fn default_sources() -> Vec<DataSource> {
    use RefreshFrequency::*;
    use SourceType::*;

    vec![
        DataSource::new("air_quality_sensors", "Municipal Air Quality Sensor Network", Sensor, RealTime, 0.92),
        DataSource::new("sentinel5p_satellite", "Sentinel-5P Atmospheric Monitoring", Satellite, Daily, 0.85),
        DataSource::new("landsat_satellite", "Landsat Land Cover Analysis", Satellite, Weekly, 0.88),
        DataSource::new("national_statistics", "National Statistics Office", Administrative, Yearly, 0.95),
        DataSource::new("health_ministry", "Ministry of Health Registry", Administrative, Yearly, 0.93),
        DataSource::new("education_ministry", "Ministry of Education Census", Administrative, Yearly, 0.94),
        DataSource::new("open_data_portal", "City Open Data Portal", GenericApi, Monthly, 0.80),
        DataSource::new("citizen_reports", "Citizen Social Media Reports", SocialMedia, Hourly, 0.55),
        DataSource::new("world_bank_api", "World Bank Indicators API", GenericApi, Yearly, 0.90),
        DataSource::new("field_survey", "Manual Field Survey", Manual, Yearly, 0.70).inactive(),
    ]
}

fn default_indicator_sources() -> HashMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 14] = [
        ("pm25_concentration", &["air_quality_sensors", "sentinel5p_satellite", "open_data_portal"]),
        ("pm10_concentration", &["air_quality_sensors", "sentinel5p_satellite"]),
        ("co2_emissions", &["sentinel5p_satellite", "national_statistics", "world_bank_api"]),
        ("green_area_per_capita", &["landsat_satellite", "open_data_portal"]),
        ("life_expectancy", &["health_ministry", "world_bank_api"]),
        ("maternal_mortality", &["health_ministry", "world_bank_api"]),
        ("under_five_mortality", &["health_ministry", "world_bank_api"]),
        ("literacy_rate", &["education_ministry", "national_statistics", "field_survey"]),
        ("mean_years_schooling", &["education_ministry", "national_statistics"]),
        ("unemployment_rate", &["national_statistics", "open_data_portal"]),
        ("homicide_rate", &["national_statistics", "citizen_reports"]),
        ("internet_access", &["national_statistics", "world_bank_api", "open_data_portal"]),
        ("gdp_per_capita", &["national_statistics", "world_bank_api"]),
        ("population", &["national_statistics", "world_bank_api"]),
    ];

    table
        .into_iter()
        .map(|(indicator, ids)| {
            (
                indicator.to_string(),
                ids.iter().map(|id| id.to_string()).collect(),
            )
        })
        .collect()
}
