//! The reference validation pipeline and batch orchestration.
//!
//! Each reference runs parse, lookup, score and format in order. Batches fan
//! the pipeline out over all inputs; the lookup adapter's permits bound how
//! many provider calls run at once, and every item keeps its own result.

use futures_util::future::join_all;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{ItemError, RequestError};
use crate::matching::{MatchScorer, ReferenceParser};
use crate::models::{
    AmbiguousCandidate, BatchItemResult, BatchReport, CandidateRecord, CitationStyle, FormatType,
    MatchResult, MatchedReference, ReferenceMetadata, ReferenceQuery, Verdict,
};
use crate::sources::{CrossRefSource, LookupAdapter, MetadataSource};
use crate::utils::{format_citation, normalize_doi};

/// Validates free-text references and DOIs against a metadata source
#[derive(Debug, Clone)]
pub struct ReferenceValidator {
    lookup: LookupAdapter,
    scorer: MatchScorer,
    parser: ReferenceParser,
    max_candidates: usize,
}

impl ReferenceValidator {
    pub fn new(lookup: LookupAdapter, scorer: MatchScorer) -> Self {
        Self {
            lookup,
            scorer,
            parser: ReferenceParser::new(),
            max_candidates: 5,
        }
    }

    /// Validator against CrossRef, configured from `config`
    pub fn from_config(config: &Config) -> Result<Self, RequestError> {
        config.validate()?;
        let source = CrossRefSource::with_settings(
            config.crossref.base_url.clone(),
            config.crossref.mailto.as_deref(),
            config.crossref.timeout(),
        )
        .map_err(|e| RequestError::InvalidConfig(e.to_string()))?;

        Self::with_source(Arc::new(source), config)
    }

    /// Validator over any source, with the policy from `config`
    pub fn with_source(source: Arc<dyn MetadataSource>, config: &Config) -> Result<Self, RequestError> {
        let lookup = LookupAdapter::with_policy(
            source,
            config.retry_config(),
            config.crossref.rows,
            config.batch.max_concurrent,
        );
        let scorer = MatchScorer::new(config.match_config()?);

        Ok(Self::new(lookup, scorer).with_max_candidates(config.matching.max_candidates))
    }

    pub fn with_parser(mut self, parser: ReferenceParser) -> Self {
        self.parser = parser;
        self
    }

    /// Only the provider's top `max_candidates` results are scored
    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates.max(1);
        self
    }

    /// Run lookup and scoring for a parsed query.
    ///
    /// A DOI is tried first and any record it fetches is an exact match; when
    /// the provider does not know it and the query has other fields, the
    /// free-text search is used instead.
    pub async fn resolve(&self, query: &ReferenceQuery) -> Result<MatchResult, ItemError> {
        if !query.has_fields() {
            return Err(ItemError::ParseYieldedNoFields);
        }

        if let Some(doi) = &query.doi {
            // The provider may answer an alias DOI with the primary record
            if let Some(record) = self.lookup.lookup_by_doi(doi).await? {
                return Ok(MatchResult::Matched {
                    record,
                    confidence: 1.0,
                });
            }
            tracing::debug!("DOI {} unknown to {}", doi, self.lookup.source().name());
            if !query.has_text_fields() {
                return Ok(MatchResult::NotFound);
            }
        }

        let mut candidates = self.lookup.lookup_by_text(query.search_text()).await?;
        candidates.truncate(self.max_candidates);
        tracing::debug!("{} candidates for '{}'", candidates.len(), query.raw_text);

        Ok(self.scorer.score(query, &candidates))
    }

    /// Validate one free-text reference (or bare DOI)
    pub async fn validate_reference(
        &self,
        reference: &str,
        style: CitationStyle,
        format: FormatType,
    ) -> Result<Verdict, ItemError> {
        let query = self.parser.parse(reference);
        let result = self.resolve(&query).await?;
        Ok(verdict(result, style, format))
    }

    /// Validate every input; `result[i]` always belongs to `inputs[i]`
    pub async fn validate_batch(
        &self,
        inputs: &[String],
        style: CitationStyle,
        format: FormatType,
    ) -> Vec<BatchItemResult> {
        tracing::info!(
            "Validating {} references (max {} concurrent lookups)",
            inputs.len(),
            self.lookup.max_concurrent()
        );

        let items = inputs.iter().enumerate().map(|(index, input)| async move {
            let outcome = self.validate_reference(input, style, format).await;
            if let Err(err) = &outcome {
                tracing::warn!("Reference {} failed: {}", index, err);
            }
            BatchItemResult::new(index, input.as_str(), outcome)
        });

        join_all(items).await
    }

    /// Batch operation with caller-supplied style and format names
    pub async fn validate_references(
        &self,
        references: &[String],
        style: &str,
        format_type: &str,
    ) -> Result<BatchReport, RequestError> {
        let style: CitationStyle = style.parse()?;
        let format: FormatType = format_type.parse()?;

        let results = self.validate_batch(references, style, format).await;
        let report = BatchReport::new(results);
        tracing::info!(
            "Validated {} references: {} matched, {} ambiguous, {} not found, {} failed",
            report.summary.total,
            report.summary.matched,
            report.summary.ambiguous,
            report.summary.not_found,
            report.summary.failed
        );
        Ok(report)
    }

    /// Format a single reference; `doi` wins when both inputs are given
    pub async fn format_reference(
        &self,
        reference: Option<&str>,
        doi: Option<&str>,
        style: &str,
        format_type: &str,
    ) -> Result<MatchedReference, RequestError> {
        let style: CitationStyle = style.parse()?;
        let format: FormatType = format_type.parse()?;

        let reference = reference.map(str::trim).filter(|r| !r.is_empty());
        let doi = doi.map(str::trim).filter(|d| !d.is_empty());

        let (query, input) = match (doi, reference) {
            (Some(doi), _) => (ReferenceQuery::from_doi(normalize_doi(doi)?), doi),
            (None, Some(reference)) => (self.parser.parse(reference), reference),
            (None, None) => return Err(RequestError::MissingInput),
        };

        match self.resolve(&query).await? {
            MatchResult::Matched { record, confidence } => {
                Ok(matched_reference(&record, confidence, style, format))
            }
            MatchResult::Ambiguous { candidates } => Err(RequestError::Ambiguous(candidates)),
            MatchResult::NotFound => Err(RequestError::NoMatch(input.to_string())),
        }
    }
}

/// Render a scoring result into the verdict returned to callers
pub fn verdict(result: MatchResult, style: CitationStyle, format: FormatType) -> Verdict {
    match result {
        MatchResult::Matched { record, confidence } => {
            Verdict::Matched(matched_reference(&record, confidence, style, format))
        }
        MatchResult::Ambiguous { candidates } => Verdict::Ambiguous(
            candidates
                .iter()
                .map(|c| AmbiguousCandidate {
                    doi: c.record.doi_url(),
                    title: c.record.title.clone(),
                    score: c.score.composite,
                    formatted: format_citation(&c.record, style, format).text,
                })
                .collect(),
        ),
        MatchResult::NotFound => Verdict::NotFound,
    }
}

fn matched_reference(
    record: &CandidateRecord,
    confidence: f64,
    style: CitationStyle,
    format: FormatType,
) -> MatchedReference {
    let citation = format_citation(record, style, format);
    MatchedReference {
        formatted: citation.text.clone(),
        confidence,
        doi: record.doi_url(),
        citation,
        metadata: ReferenceMetadata::from(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MockSource, SourceError};

    fn bharadwaj() -> CandidateRecord {
        CandidateRecord::new(
            "10.2307/3250983",
            "A Resource-Based Perspective on Information Technology Capability and Firm Performance: An Empirical Investigation",
        )
        .author("Anandhi S.", "Bharadwaj")
        .year(2000)
        .container_title("MIS Quarterly")
        .volume("24")
        .issue("1")
        .pages("169-196")
    }

    fn validator(mock: Arc<MockSource>) -> ReferenceValidator {
        let mut config = Config::default();
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 5;
        ReferenceValidator::with_source(mock, &config)
            .unwrap()
            .with_parser(ReferenceParser::with_current_year(2026))
    }

    #[tokio::test]
    async fn test_doi_lookup_bypasses_search() {
        let mock = Arc::new(MockSource::new());
        mock.add_record(bharadwaj());

        let verdict = validator(mock.clone())
            .validate_reference("doi:10.2307/3250983", CitationStyle::Apa, FormatType::Text)
            .await
            .unwrap();

        match verdict {
            Verdict::Matched(matched) => {
                assert_eq!(matched.confidence, 1.0);
                assert_eq!(matched.doi, "https://doi.org/10.2307/3250983");
            }
            other => panic!("Expected match, got {:?}", other),
        }
        assert_eq!(mock.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_embedded_doi_falls_back_to_search() {
        let mock = Arc::new(MockSource::new());
        mock.add_record(bharadwaj());

        let reference = "Bharadwaj (2000) A resource-based perspective on information technology capability 10.9999/stale";
        let verdict = validator(mock.clone())
            .validate_reference(reference, CitationStyle::Harvard, FormatType::Text)
            .await
            .unwrap();

        assert!(matches!(verdict, Verdict::Matched(_)));
        assert_eq!(mock.doi_calls(), 1);
        assert_eq!(mock.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_author_year_venue_is_not_found_with_defaults() {
        let mock = Arc::new(MockSource::new());
        mock.add_record(bharadwaj());

        // author 1.0 * 0.4 + year 1.0 * 0.2 + title 0.0 * 0.4 = 0.6 < floor 0.65
        let verdict = validator(mock)
            .validate_reference("Bharadwaj 2000 MIS Quarterly", CitationStyle::Apa, FormatType::Text)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::NotFound);
    }

    #[tokio::test]
    async fn test_garbage_reference_is_an_item_error() {
        let mock = Arc::new(MockSource::new());
        let err = validator(mock.clone())
            .validate_reference(" ;; ", CitationStyle::Apa, FormatType::Text)
            .await
            .unwrap_err();

        assert_eq!(err, ItemError::ParseYieldedNoFields);
        assert_eq!(mock.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_format_reference_inputs() {
        let mock = Arc::new(MockSource::new());
        mock.add_record(bharadwaj());
        let validator = validator(mock);

        assert_eq!(
            validator.format_reference(None, Some("  "), "apa", "text").await,
            Err(RequestError::MissingInput)
        );
        assert!(matches!(
            validator.format_reference(None, Some("10.12"), "apa", "text").await,
            Err(RequestError::Item(ItemError::InvalidDoiSyntax { .. }))
        ));
        assert_eq!(
            validator.format_reference(None, Some("10.2307/3250983"), "mla", "text").await,
            Err(RequestError::UnsupportedStyle("mla".to_string()))
        );
        assert!(matches!(
            validator.format_reference(None, Some("10.1234/unknown"), "apa", "text").await,
            Err(RequestError::NoMatch(_))
        ));

        // DOI takes precedence over the reference text
        let matched = validator
            .format_reference(Some("Nonsense 1999"), Some("https://doi.org/10.2307/3250983"), "harvard", "markdown")
            .await
            .unwrap();
        assert_eq!(matched.citation.style, CitationStyle::Harvard);
        assert!(matched.formatted.contains("*MIS Quarterly*"));
    }

    #[tokio::test]
    async fn test_lookup_failures_stay_per_item() {
        let mock = Arc::new(MockSource::new());
        mock.add_record(bharadwaj());
        mock.fail_search(
            "Broken 1999 reference",
            SourceError::Api {
                status: 400,
                message: "bad query".to_string(),
            },
        );

        let inputs = vec![
            "Broken 1999 reference".to_string(),
            "10.2307/3250983".to_string(),
        ];
        let results = validator(mock)
            .validate_batch(&inputs, CitationStyle::Apa, FormatType::Text)
            .await;

        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0].outcome,
            Err(ItemError::LookupFailed { retryable: false, .. })
        ));
        assert_eq!(results[1].status(), "matched");
    }

    #[tokio::test]
    async fn test_alias_doi_fetch_is_exact_match() {
        let mut server = mockito::Server::new_async().await;
        let alias = server
            .mock("GET", "/works/10.1234%2Falias")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "status": "ok",
                    "message": {
                        "DOI": "10.5555/primary",
                        "title": ["Primary Record"],
                        "author": [{"given": "Ann", "family": "Author"}],
                        "issued": {"date-parts": [[2011]]}
                    }
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let mut config = Config::default();
        config.crossref.base_url = server.url();
        let validator = ReferenceValidator::from_config(&config).unwrap();

        let matched = validator
            .format_reference(None, Some("10.1234/alias"), "apa", "text")
            .await
            .unwrap();
        assert_eq!(matched.confidence, 1.0);
        assert_eq!(matched.doi, "https://doi.org/10.5555/primary");
        assert_eq!(matched.formatted, "Author, A. (2011). Primary Record. https://doi.org/10.5555/primary");

        alias.assert_async().await;
    }
}
