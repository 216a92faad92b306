use moka::future::Cache;
use std::time::Duration;

use prosperity_core::{EnhancedIndicatorRecord, GeoLocation};

use crate::config::CacheConfig;

/// Cache key for a collected indicator at an optional location
///
/// Coordinates are keyed by their bit patterns so the key stays `Eq + Hash`.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CollectKey {
    indicator: String,
    location: Option<(u64, u64)>,
}

impl CollectKey {
    pub fn new(indicator: &str, location: Option<GeoLocation>) -> Self {
        Self {
            indicator: indicator.to_string(),
            location: location.map(|l| (l.lat.to_bits(), l.lon.to_bits())),
        }
    }
}

/// Collected-and-harmonized records, so repeated `collect` calls for the same
/// indicator and place do not fan out to every source again
#[derive(Clone)]
pub struct EnhancementCache {
    cache: Cache<CollectKey, EnhancedIndicatorRecord>,
}

impl EnhancementCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();

        Self { cache }
    }

    pub async fn get_collected(
        &self,
        indicator: &str,
        location: Option<GeoLocation>,
    ) -> Option<EnhancedIndicatorRecord> {
        self.cache.get(&CollectKey::new(indicator, location)).await
    }

    pub async fn set_collected(
        &self,
        indicator: &str,
        location: Option<GeoLocation>,
        record: EnhancedIndicatorRecord,
    ) {
        self.cache
            .insert(CollectKey::new(indicator, location), record)
            .await;
    }

    /// Drop everything, e.g. after the source registry changed
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
