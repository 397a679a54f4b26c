//! Core data models for reference lookups, matches and citations.

mod citation;
mod reference;
mod result;

pub use citation::{CitationStyle, FormatType, FormattedCitation};
pub use reference::{Author, CandidateRecord, ReferenceQuery};
pub use result::{
    AmbiguousCandidate, BatchItemResult, BatchReport, BatchSummary, MatchResult, MatchScore,
    MatchedReference, ReferenceMetadata, ScoredCandidate, Verdict,
};
