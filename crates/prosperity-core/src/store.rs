//! Storage of produced indicator values per user
//!
//! The pipeline does not persist anything itself; callers hand produced values
//! to a [`RecordStore`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{PipelineError, PipelineResult};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Upsert the latest value of `indicator` for `user_id`
    async fn save(&self, user_id: &str, indicator: &str, value: f64) -> PipelineResult<()>;

    /// Latest value of every indicator saved for `user_id`
    async fn load_latest(&self, user_id: &str) -> PipelineResult<HashMap<String, f64>>;
}

#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<String, HashMap<String, f64>>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn save(&self, user_id: &str, indicator: &str, value: f64) -> PipelineResult<()> {
        if user_id.is_empty() || indicator.is_empty() {
            return Err(PipelineError::Store("user id and indicator are required".to_string()));
        }
        if !value.is_finite() {
            return Err(PipelineError::Store(format!("refusing to store non-finite value for {}", indicator)));
        }

        self.records
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .insert(indicator.to_string(), value);

        tracing::debug!(user_id = %user_id, indicator = %indicator, value = %value, "Stored indicator value");
        Ok(())
    }

    async fn load_latest(&self, user_id: &str) -> PipelineResult<HashMap<String, f64>> {
        Ok(self
            .records
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_overwrites_latest_value() {
        let store = InMemoryRecordStore::new();
        store.save("user-1", "literacy_rate", 91.0).await.unwrap();
        store.save("user-1", "literacy_rate", 92.5).await.unwrap();
        store.save("user-1", "pm25_concentration", 18.0).await.unwrap();

        let latest = store.load_latest("user-1").await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest["literacy_rate"], 92.5);
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_values() {
        let store = InMemoryRecordStore::new();
        assert!(store.load_latest("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_invalid_input() {
        let store = InMemoryRecordStore::new();
        assert!(store.save("", "literacy_rate", 1.0).await.is_err());
        assert!(store.save("user-1", "literacy_rate", f64::NAN).await.is_err());
    }
}
