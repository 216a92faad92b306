//! Error types for the data-enhancement pipeline

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Source {source_id} unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("Source {source_id} timed out after {after_ms}ms")]
    Timeout { source_id: String, after_ms: u64 },

    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("Insufficient proxy data for {indicator}: {available} of {required} required proxies available")]
    InsufficientProxyData {
        indicator: String,
        available: usize,
        required: usize,
    },

    #[error("No prediction model registered for {0}")]
    UnknownModel(String),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Collection cancelled")]
    Cancelled,

    #[error("Record store error: {0}")]
    Store(String),
}

impl PipelineError {
    /// Only transient source failures are worth another attempt; everything else
    /// is deterministic given the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::SourceUnavailable { .. } | PipelineError::Timeout { .. }
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_source_failures_are_retryable() {
        assert!(PipelineError::SourceUnavailable {
            source_id: "open_data_portal".into(),
            reason: "503".into(),
        }
        .is_retryable());
        assert!(PipelineError::Timeout {
            source_id: "open_data_portal".into(),
            after_ms: 5000,
        }
        .is_retryable());
        assert!(!PipelineError::MissingPrerequisite("location".into()).is_retryable());
        assert!(!PipelineError::Computation("NaN".into()).is_retryable());
        assert!(!PipelineError::Cancelled.is_retryable());
    }
}
