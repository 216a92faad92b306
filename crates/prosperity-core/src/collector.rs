//! Fan-out collection of raw readings for one indicator
//!
//! Every active source mapped to the indicator is queried concurrently. Each
//! attempt is bounded by a timeout, retried with backoff on transient failures and
//! abandoned on cancellation. A failed source is logged and left out of the result;
//! it never fails the indicator as a whole.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{DataPoint, DataSource, GeoLocation};
use crate::provider::{DataProvider, ProviderSet};
use crate::quality::DataQuality;
use crate::registry::SourceRegistry;
use crate::settings::CollectorSettings;

#[derive(Clone)]
pub struct Collector {
    registry: SourceRegistry,
    providers: ProviderSet,
    clock: Arc<dyn Clock>,
    settings: CollectorSettings,
}

impl Collector {
    pub fn new(
        registry: SourceRegistry,
        providers: ProviderSet,
        clock: Arc<dyn Clock>,
        settings: CollectorSettings,
    ) -> Self {
        tracing::debug!(
            source_timeout_ms = settings.source_timeout_ms,
            max_retries = settings.max_retries,
            "Initializing Collector"
        );
        Self {
            registry,
            providers,
            clock,
            settings,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Collect one reading per reachable source for `indicator`
    pub async fn collect_indicator_data(
        &self,
        indicator: &str,
        location: Option<GeoLocation>,
    ) -> Vec<DataPoint> {
        self.collect_with_cancel(indicator, location, &CancellationToken::new())
            .await
    }

    /// Same as [`Collector::collect_indicator_data`], abandoning outstanding source
    /// attempts once `cancel` fires.
    pub async fn collect_with_cancel(
        &self,
        indicator: &str,
        location: Option<GeoLocation>,
        cancel: &CancellationToken,
    ) -> Vec<DataPoint> {
        let start = Instant::now();
        let sources = self.registry.sources_for_indicator(indicator).await;
        if sources.is_empty() {
            tracing::debug!(indicator = %indicator, "No active sources for indicator");
            return Vec::new();
        }

        let attempts = sources.into_iter().filter_map(|source| {
            if source.source_type.requires_location() && location.is_none() {
                let skipped = PipelineError::MissingPrerequisite(format!(
                    "{} source {} needs a city location",
                    source.source_type, source.id
                ));
                tracing::warn!(indicator = %indicator, source_id = %source.id, error = %skipped, "Skipping source");
                return None;
            }
            Some(self.collect_from_source(source, indicator, location, cancel))
        });

        let settled = join_all(attempts).await;
        let attempted = settled.len();

        let points: Vec<DataPoint> = settled
            .into_iter()
            .filter_map(|result| match result {
                Ok(point) => Some(point),
                Err(e) => {
                    tracing::warn!(indicator = %indicator, error = %e, "Source excluded from collection");
                    None
                }
            })
            .collect();

        tracing::info!(
            indicator = %indicator,
            attempted = attempted,
            collected = points.len(),
            duration_ms = %start.elapsed().as_millis(),
            "Collection finished"
        );

        points
    }

    async fn collect_from_source(
        &self,
        source: DataSource,
        indicator: &str,
        location: Option<GeoLocation>,
        cancel: &CancellationToken,
    ) -> PipelineResult<DataPoint> {
        let provider = self
            .providers
            .get(source.source_type)
            .ok_or_else(|| PipelineError::SourceUnavailable {
                source_id: source.id.clone(),
                reason: format!("no provider for {} sources", source.source_type),
            })?;

        let mut attempt: u32 = 0;
        let mut backoff = Duration::from_millis(self.settings.retry_backoff_ms);

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(PipelineError::Cancelled),
                r = self.fetch_bounded(provider.as_ref(), &source, indicator, location) => r,
            };

            match result {
                Ok(value) => return Ok(self.to_point(source, indicator, value, attempt + 1)),
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        source_id = %source.id,
                        attempt = attempt,
                        backoff_ms = %backoff.as_millis(),
                        error = %e,
                        "Retrying source"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_bounded(
        &self,
        provider: &dyn DataProvider,
        source: &DataSource,
        indicator: &str,
        location: Option<GeoLocation>,
    ) -> PipelineResult<Option<f64>> {
        let limit = Duration::from_millis(self.settings.source_timeout_ms);
        match tokio::time::timeout(limit, provider.fetch(source, indicator, location)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                source_id: source.id.clone(),
                after_ms: self.settings.source_timeout_ms,
            }),
        }
    }

    fn to_point(
        &self,
        source: DataSource,
        indicator: &str,
        value: Option<f64>,
        attempts: u32,
    ) -> DataPoint {
        let now = self.clock.now();
        let value = value.filter(|v| v.is_finite());
        let quality = DataQuality::for_reading(&source, value.is_some(), now);

        DataPoint {
            indicator: indicator.to_string(),
            value,
            timestamp: now,
            metadata: Some(json!({
                "sourceType": source.source_type,
                "attempts": attempts,
            })),
            source,
            quality,
        }
    }
}
