//! Built-in prediction model catalog

use chrono::{DateTime, TimeZone, Utc};

use crate::models::{ModelKind, PredictionModel};

fn trained_on() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn model(indicator: &str, kind: ModelKind, proxies: &[&str], accuracy: f64) -> PredictionModel {
    PredictionModel {
        indicator: indicator.to_string(),
        kind,
        proxy_indicators: proxies.iter().map(|p| p.to_string()).collect(),
        accuracy,
        last_trained: trained_on(),
    }
}

pub fn builtin_models() -> Vec<PredictionModel> {
    vec![
        model(
            "pm25_concentration",
            ModelKind::LinearCombination,
            &["co2_emissions", "population", "number_of_monitoring_stations"],
            0.78,
        ),
        model(
            "green_area_per_capita",
            ModelKind::EnsembleAverage,
            &["population_density", "gdp_per_capita", "urban_area_km2"],
            0.72,
        ),
        model(
            "life_expectancy",
            ModelKind::NeuralNetwork,
            &["gdp_per_capita", "literacy_rate", "maternal_mortality", "internet_access"],
            0.85,
        ),
        model(
            "literacy_rate",
            ModelKind::LinearCombination,
            &["mean_years_schooling", "internet_access", "gdp_per_capita"],
            0.80,
        ),
        model(
            "maternal_mortality",
            ModelKind::EnsembleAverage,
            &["life_expectancy", "gdp_per_capita", "literacy_rate"],
            0.70,
        ),
        model(
            "unemployment_rate",
            ModelKind::LinearCombination,
            &["gdp_per_capita", "mean_years_schooling"],
            0.65,
        ),
    ]
}
