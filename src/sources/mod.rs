//! Metadata sources and the lookup adapter in front of them.
//!
//! A [`MetadataSource`] talks to one bibliographic provider and reports
//! provider-level [`SourceError`]s. The [`LookupAdapter`] wraps a source with
//! the retry, timeout and concurrency policy, and normalizes every failure to
//! a [`LookupError`] before it reaches the rest of the pipeline.
//!
//! # Implementing a New Source
//!
//! 1. Create a struct that implements `MetadataSource`
//! 2. Map the provider's records into [`CandidateRecord`], dropping entries
//!    without a DOI or a title
//! 3. Classify HTTP failures: 5xx and transport errors as transient, 4xx as
//!    permanent

mod crossref;
mod lookup;
pub mod mock;

pub use crossref::{CrossRefSource, CROSSREF_API_BASE};
pub use lookup::{LookupAdapter, LookupError};
pub use mock::MockSource;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::CandidateRecord;

/// A bibliographic metadata provider
#[async_trait]
pub trait MetadataSource: Send + Sync + std::fmt::Debug {
    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Free-text bibliographic search, ranked by provider relevance
    async fn search(&self, text: &str, rows: usize) -> Result<Vec<CandidateRecord>, SourceError>;

    /// Exact lookup by DOI; `Ok(None)` when the DOI is unknown
    async fn get_by_doi(&self, doi: &str) -> Result<Option<CandidateRecord>, SourceError>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// An attempt exceeded its time budget
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// 5xx from the provider
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Non-retryable 4xx from the provider
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider responded with something we could not decode
    #[error("Parse error: {0}")]
    Parse(String),
}

impl SourceError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Network(_) | SourceError::Timeout(_) | SourceError::Server { .. }
        )
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            SourceError::RateLimit
        } else if status.is_server_error() {
            SourceError::Server {
                status: status.as_u16(),
                message,
            }
        } else {
            SourceError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Network(format!("timeout: {}", err))
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::from_status(status, err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}
