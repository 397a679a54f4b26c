//! Reference parsing and candidate scoring.
//!
//! - [`ReferenceParser`]: free text to [`ReferenceQuery`](crate::models::ReferenceQuery)
//! - [`MatchScorer`]: query plus candidates to [`MatchResult`](crate::models::MatchResult)

mod parser;
mod scorer;

pub use parser::ReferenceParser;
pub use scorer::{
    author_similarity, title_similarity, title_tokens, year_similarity, MatchConfig, MatchScorer,
    MatchWeights,
};
