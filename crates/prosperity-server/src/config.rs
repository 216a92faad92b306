use config::{Config, ConfigError, Environment, File};
use prosperity_core::{
    CollectorSettings, HarmonizerSettings, PipelineSettings, PredictorSettings, SimulationSettings,
};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub collector: CollectorSettings,
    #[serde(default)]
    pub harmonizer: HarmonizerSettings,
    #[serde(default)]
    pub predictor: PredictorSettings,
    #[serde(default)]
    pub simulation: SimulationSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Required `x-api-key` value; empty disables the check
    #[serde(default)]
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_key: String::new(),
        }
    }
}

/// Cache for collected indicator records
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_max_capacity() -> u64 {
    1000
}

fn default_ttl() -> u64 {
    300 // 5 minutes
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.api_key", "")?
            .set_default("cache.max_capacity", default_max_capacity() as i64)?
            .set_default("cache.ttl_seconds", default_ttl() as i64)?
            // Load from config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (PROSPERITY__SERVER__PORT, etc.)
            // Double underscore separates sections so keys like source_timeout_ms survive
            .add_source(
                Environment::with_prefix("PROSPERITY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            collector: self.collector.clone(),
            harmonizer: self.harmonizer.clone(),
            predictor: self.predictor.clone(),
            simulation: self.simulation.clone(),
        }
    }

    pub fn auth_enabled(&self) -> bool {
        !self.server.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:3000");
        assert!(!config.auth_enabled());
        assert_eq!(config.cache.ttl_seconds, 300);
        assert_eq!(config.pipeline_settings().predictor.proxy_coverage_threshold, 0.6);
    }
}
