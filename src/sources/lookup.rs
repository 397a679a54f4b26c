//! Lookup adapter: retry, timeout and concurrency policy around a source.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::models::CandidateRecord;
use crate::sources::{MetadataSource, SourceError};
use crate::utils::{with_retry, RetryConfig};

/// Normalized lookup failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct LookupError {
    /// Whether the failure was transient (retries were attempted and exhausted)
    pub retryable: bool,
    pub reason: String,
}

impl LookupError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            retryable: true,
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            retryable: false,
            reason: reason.into(),
        }
    }
}

impl From<SourceError> for LookupError {
    fn from(err: SourceError) -> Self {
        Self {
            retryable: err.is_transient(),
            reason: err.to_string(),
        }
    }
}

/// Uniform search-by-text and fetch-by-DOI over a [`MetadataSource`].
///
/// Calls beyond the concurrency ceiling wait for a permit rather than fail.
/// A permit is held for the whole lookup, retries and backoff included.
#[derive(Debug, Clone)]
pub struct LookupAdapter {
    source: Arc<dyn MetadataSource>,
    retry: RetryConfig,
    rows: usize,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl LookupAdapter {
    pub fn with_policy(
        source: Arc<dyn MetadataSource>,
        retry: RetryConfig,
        rows: usize,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            source,
            retry,
            rows: rows.max(1),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn source(&self) -> &Arc<dyn MetadataSource> {
        &self.source
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Ranked candidates for free text; empty if the provider has none
    pub async fn lookup_by_text(&self, text: &str) -> Result<Vec<CandidateRecord>, LookupError> {
        let _permit = self.acquire().await?;
        let source = Arc::clone(&self.source);
        let rows = self.rows;

        with_retry(self.retry, || {
            let source = Arc::clone(&source);
            async move { source.search(text, rows).await }
        })
        .await
        .map_err(|err| self.normalize(err, text))
    }

    /// Exact record for a DOI, `None` when the provider does not know it
    pub async fn lookup_by_doi(&self, doi: &str) -> Result<Option<CandidateRecord>, LookupError> {
        let _permit = self.acquire().await?;
        let source = Arc::clone(&self.source);

        with_retry(self.retry, || {
            let source = Arc::clone(&source);
            async move { source.get_by_doi(doi).await }
        })
        .await
        .map_err(|err| self.normalize(err, doi))
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, LookupError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| LookupError::permanent("lookup adapter is shut down"))
    }

    fn normalize(&self, err: SourceError, what: &str) -> LookupError {
        tracing::warn!("{} lookup for '{}' failed: {}", self.source.name(), what, err);
        let reason = format!("{}: {}", self.source.name(), err);
        LookupError {
            retryable: err.is_transient(),
            reason,
        }
    }
}
