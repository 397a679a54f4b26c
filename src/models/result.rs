//! Match verdicts and per-item batch results.

use serde::{Serialize, Serializer};

use crate::error::ItemError;
use crate::models::{CandidateRecord, FormattedCitation};

/// Sub-scores and weighted composite for one candidate, all in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MatchScore {
    pub author: f64,
    pub year: f64,
    pub title: f64,
    pub composite: f64,
}

/// A candidate paired with how well it matched the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub record: CandidateRecord,
    pub score: MatchScore,
}

/// Outcome of scoring a query against its candidates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchResult {
    /// One candidate cleared the threshold with no close contender
    Matched {
        record: CandidateRecord,
        confidence: f64,
    },
    /// Several candidates are too close to pick; sorted by score, then DOI
    Ambiguous { candidates: Vec<ScoredCandidate> },
    /// Nothing scored high enough
    NotFound,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    /// Confidence of a match, if any
    pub fn confidence(&self) -> Option<f64> {
        match self {
            MatchResult::Matched { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }
}

/// Structured metadata echoed back with a matched reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceMetadata {
    pub title: String,
    /// Authors as "Family, Given"
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
}

impl From<&CandidateRecord> for ReferenceMetadata {
    fn from(record: &CandidateRecord) -> Self {
        Self {
            title: record.title.clone(),
            authors: record.authors.iter().map(|a| a.display_name()).collect(),
            year: record.year,
            journal: record.container_title.clone(),
            volume: record.volume.clone(),
            issue: record.issue.clone(),
            pages: record.pages.clone(),
        }
    }
}

/// A reference that resolved to exactly one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedReference {
    pub formatted: String,
    pub confidence: f64,
    /// DOI resolver URL
    pub doi: String,
    pub citation: FormattedCitation,
    pub metadata: ReferenceMetadata,
}

/// One of several close candidates, rendered so the caller can choose
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousCandidate {
    pub doi: String,
    pub title: String,
    pub score: f64,
    pub formatted: String,
}

/// Final verdict for a single reference
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Matched(MatchedReference),
    Ambiguous(Vec<AmbiguousCandidate>),
    NotFound,
}

/// Result for the input at `index`
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItemResult {
    pub index: usize,
    pub original: String,
    pub outcome: Result<Verdict, ItemError>,
}

impl BatchItemResult {
    pub fn new(index: usize, original: impl Into<String>, outcome: Result<Verdict, ItemError>) -> Self {
        Self {
            index,
            original: original.into(),
            outcome,
        }
    }

    /// Short status label ("matched", "ambiguous", "not_found", "error")
    pub fn status(&self) -> &'static str {
        match &self.outcome {
            Ok(Verdict::Matched(_)) => "matched",
            Ok(Verdict::Ambiguous(_)) => "ambiguous",
            Ok(Verdict::NotFound) => "not_found",
            Err(_) => "error",
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum OutcomeRef<'a> {
    Matched(&'a MatchedReference),
    Ambiguous {
        candidates: &'a [AmbiguousCandidate],
    },
    NotFound,
    Error {
        error: &'a ItemError,
        message: String,
    },
}

#[derive(Serialize)]
struct ItemRef<'a> {
    index: usize,
    original: &'a str,
    #[serde(flatten)]
    outcome: OutcomeRef<'a>,
}

impl Serialize for BatchItemResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let outcome = match &self.outcome {
            Ok(Verdict::Matched(matched)) => OutcomeRef::Matched(matched),
            Ok(Verdict::Ambiguous(candidates)) => OutcomeRef::Ambiguous { candidates },
            Ok(Verdict::NotFound) => OutcomeRef::NotFound,
            Err(error) => OutcomeRef::Error {
                error,
                message: format!("reference {}: {}", self.index, error),
            },
        };

        ItemRef {
            index: self.index,
            original: &self.original,
            outcome,
        }
        .serialize(serializer)
    }
}

/// Per-verdict counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub matched: usize,
    pub ambiguous: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[BatchItemResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match &result.outcome {
                Ok(Verdict::Matched(_)) => summary.matched += 1,
                Ok(Verdict::Ambiguous(_)) => summary.ambiguous += 1,
                Ok(Verdict::NotFound) => summary.not_found += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Full response of a batch validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: Vec<BatchItemResult>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn new(results: Vec<BatchItemResult>) -> Self {
        let summary = BatchSummary::from_results(&results);
        Self { results, summary }
    }
}
