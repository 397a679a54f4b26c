//! Error taxonomy for reference validation.
//!
//! [`ItemError`]s belong to one reference and are captured into that item's
//! result. [`RequestError`]s reject a whole call before (or instead of) the
//! pipeline running.

use serde::Serialize;
use thiserror::Error;

use crate::models::ScoredCandidate;
use crate::sources::LookupError;

/// Failure of a single reference inside the pipeline
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemError {
    /// Nothing usable (author, year, title or DOI) could be read from the input
    #[error("no author, year, title or DOI could be read from the reference")]
    ParseYieldedNoFields,

    /// A caller-supplied DOI is not shaped like `10.<registrant>/<suffix>`
    #[error("invalid DOI syntax: {doi}")]
    InvalidDoiSyntax { doi: String },

    /// The metadata service could not be reached or refused the request
    #[error("metadata lookup failed: {reason}")]
    LookupFailed { retryable: bool, reason: String },
}

impl From<LookupError> for ItemError {
    fn from(err: LookupError) -> Self {
        ItemError::LookupFailed {
            retryable: err.retryable,
            reason: err.reason,
        }
    }
}

/// Failure of a whole call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("unsupported citation style '{0}' (expected 'apa' or 'harvard')")]
    UnsupportedStyle(String),

    #[error("unsupported format type '{0}' (expected 'markdown' or 'text')")]
    UnsupportedFormat(String),

    /// Neither a reference string nor a DOI was given
    #[error("either 'reference' or 'doi' must be provided")]
    MissingInput,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The single reference failed inside the pipeline
    #[error(transparent)]
    Item(#[from] ItemError),

    /// The single reference matched nothing
    #[error("no matching record found for '{0}'")]
    NoMatch(String),

    /// The single reference matched several records equally well
    #[error("reference is ambiguous: {} candidates scored within the ambiguity band", .0.len())]
    Ambiguous(Vec<ScoredCandidate>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_conversion() {
        let err: ItemError = LookupError::transient("HTTP 503").into();
        assert_eq!(
            err,
            ItemError::LookupFailed {
                retryable: true,
                reason: "HTTP 503".to_string()
            }
        );
        assert_eq!(err.to_string(), "metadata lookup failed: HTTP 503");
    }

    #[test]
    fn test_item_error_kind_tags() {
        let value = serde_json::to_value(ItemError::InvalidDoiSyntax {
            doi: "10.12".to_string(),
        })
        .unwrap();
        assert_eq!(value["kind"], "invalid_doi_syntax");
        assert_eq!(value["doi"], "10.12");

        let value = serde_json::to_value(ItemError::ParseYieldedNoFields).unwrap();
        assert_eq!(value["kind"], "parse_yielded_no_fields");
    }
}
