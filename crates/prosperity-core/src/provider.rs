//! Provider contract between the collector and upstream data systems
//!
//! A provider turns (source, indicator, location) into one reading. The only
//! built-in implementation simulates upstream systems with readings drawn from a
//! plausible per-indicator range; real network clients plug in behind the same
//! trait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::benchmarks::simulated_range;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{DataSource, GeoLocation, SourceType};
use crate::settings::SimulationSettings;

#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetch the current reading. `Ok(None)` means the source answered but has
    /// no value for this indicator.
    async fn fetch(
        &self,
        source: &DataSource,
        indicator: &str,
        location: Option<GeoLocation>,
    ) -> PipelineResult<Option<f64>>;
}

const AUTOMATED_SOURCE_TYPES: [SourceType; 5] = [
    SourceType::Sensor,
    SourceType::Satellite,
    SourceType::SocialMedia,
    SourceType::Administrative,
    SourceType::GenericApi,
];

/// Provider per source type
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<SourceType, Arc<dyn DataProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A separately seeded simulated provider per automated source type, and a
    /// provider that refuses manual sources
    pub fn simulated(settings: &SimulationSettings) -> Self {
        let mut set = Self::new();
        for (offset, source_type) in AUTOMATED_SOURCE_TYPES.into_iter().enumerate() {
            let per_type = SimulationSettings {
                seed: settings.seed.map(|seed| seed.wrapping_add(offset as u64)),
                ..settings.clone()
            };
            set = set.with_provider(source_type, Arc::new(SimulatedProvider::new(&per_type)));
        }
        set.with_provider(SourceType::Manual, Arc::new(ManualEntryProvider))
    }

    pub fn with_provider(mut self, source_type: SourceType, provider: Arc<dyn DataProvider>) -> Self {
        self.providers.insert(source_type, provider);
        self
    }

    pub fn get(&self, source_type: SourceType) -> Option<Arc<dyn DataProvider>> {
        self.providers.get(&source_type).cloned()
    }
}

/// Deterministic-when-seeded stand-in for upstream systems
pub struct SimulatedProvider {
    rng: Mutex<SmallRng>,
    failure_rate: f64,
}

impl SimulatedProvider {
    pub fn new(settings: &SimulationSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            failure_rate: settings.failure_rate.clamp(0.0, 1.0),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(&SimulationSettings {
            seed: Some(seed),
            failure_rate: 0.0,
        })
    }
}

#[async_trait]
impl DataProvider for SimulatedProvider {
    async fn fetch(
        &self,
        source: &DataSource,
        indicator: &str,
        _location: Option<GeoLocation>,
    ) -> PipelineResult<Option<f64>> {
        let mut rng = self.rng.lock().map_err(|_| PipelineError::SourceUnavailable {
            source_id: source.id.clone(),
            reason: "simulated provider state poisoned".to_string(),
        })?;

        if self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate) {
            return Err(PipelineError::SourceUnavailable {
                source_id: source.id.clone(),
                reason: "simulated outage".to_string(),
            });
        }

        let (lo, hi) = simulated_range(indicator);
        let value = lo + rng.gen::<f64>() * (hi - lo);
        tracing::trace!(source_id = %source.id, indicator = %indicator, value = %value, "Simulated reading");
        Ok(Some(value))
    }
}

/// Manual sources are entered by field staff and never fetched automatically
pub struct ManualEntryProvider;

#[async_trait]
impl DataProvider for ManualEntryProvider {
    async fn fetch(
        &self,
        source: &DataSource,
        _indicator: &str,
        _location: Option<GeoLocation>,
    ) -> PipelineResult<Option<f64>> {
        Err(PipelineError::SourceUnavailable {
            source_id: source.id.clone(),
            reason: "manual sources are entered by field staff, not fetched".to_string(),
        })
    }
}
