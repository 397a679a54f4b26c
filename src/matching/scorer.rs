//! Similarity scoring and match classification.

use std::collections::{BTreeSet, HashSet};

use strsim::normalized_levenshtein;

use crate::error::RequestError;
use crate::models::{Author, CandidateRecord, MatchResult, MatchScore, ReferenceQuery, ScoredCandidate};

/// Slack for comparing composite scores against thresholds
const SCORE_EPSILON: f64 = 1e-9;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "by", "for", "from", "in", "into", "is", "its", "of",
    "on", "or", "the", "to", "via", "with",
];

/// Weights of the three sub-scores; must sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchWeights {
    pub author: f64,
    pub year: f64,
    pub title: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            author: 0.4,
            year: 0.2,
            title: 0.4,
        }
    }
}

impl MatchWeights {
    pub fn sum(&self) -> f64 {
        self.author + self.year + self.title
    }
}

/// Tunable thresholds for classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    pub weights: MatchWeights,
    /// Minimum composite score for a match
    pub match_threshold: f64,
    /// Score gap under which two candidates are too close to call
    pub ambiguity_band: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: MatchWeights::default(),
            match_threshold: 0.75,
            ambiguity_band: 0.1,
        }
    }
}

impl MatchConfig {
    /// Build a validated configuration
    pub fn new(
        weights: MatchWeights,
        match_threshold: f64,
        ambiguity_band: f64,
    ) -> Result<Self, RequestError> {
        let config = Self {
            weights,
            match_threshold,
            ambiguity_band,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        let w = &self.weights;
        if [w.author, w.year, w.title].iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(RequestError::InvalidConfig(
                "match weights must each be within [0, 1]".to_string(),
            ));
        }
        if (w.sum() - 1.0).abs() > 1e-6 {
            return Err(RequestError::InvalidConfig(format!(
                "match weights must sum to 1.0 (got {:.4})",
                w.sum()
            )));
        }
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(RequestError::InvalidConfig(
                "match_threshold must be within [0, 1]".to_string(),
            ));
        }
        if !(0.0..=self.match_threshold).contains(&self.ambiguity_band) {
            return Err(RequestError::InvalidConfig(
                "ambiguity_band must be within [0, match_threshold]".to_string(),
            ));
        }
        Ok(())
    }

    /// Scores below this are never considered
    pub fn floor(&self) -> f64 {
        self.match_threshold - self.ambiguity_band
    }
}

/// Compares parsed queries against candidate records
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchScorer {
    config: MatchConfig,
}

impl MatchScorer {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Classify the candidates for a query.
    ///
    /// A candidate carrying the query's DOI is an exact match with confidence
    /// 1.0 and bypasses fuzzy scoring.
    pub fn score(&self, query: &ReferenceQuery, candidates: &[CandidateRecord]) -> MatchResult {
        if let Some(doi) = &query.doi {
            if let Some(record) = candidates.iter().find(|c| c.doi.eq_ignore_ascii_case(doi)) {
                return MatchResult::Matched {
                    record: record.clone(),
                    confidence: 1.0,
                };
            }
        }

        let ranked = self.rank(query, candidates);
        let Some(top) = ranked.first() else {
            return MatchResult::NotFound;
        };

        let floor = self.config.floor();
        let band = self.config.ambiguity_band;
        let top_score = top.score.composite;

        if top_score + SCORE_EPSILON < floor {
            tracing::debug!(top_score, floor, "Best candidate below floor");
            return MatchResult::NotFound;
        }

        if let Some(second) = ranked.get(1) {
            let second_score = second.score.composite;
            if second_score + SCORE_EPSILON >= floor && top_score - second_score <= band + SCORE_EPSILON {
                let candidates: Vec<ScoredCandidate> = ranked
                    .into_iter()
                    .take_while(|c| {
                        top_score - c.score.composite <= band + SCORE_EPSILON
                            && c.score.composite + SCORE_EPSILON >= floor
                    })
                    .collect();
                tracing::debug!(count = candidates.len(), top_score, "Ambiguous match");
                return MatchResult::Ambiguous { candidates };
            }
        }

        if top_score + SCORE_EPSILON >= self.config.match_threshold {
            MatchResult::Matched {
                record: top.record.clone(),
                confidence: top_score,
            }
        } else {
            tracing::debug!(
                top_score,
                threshold = self.config.match_threshold,
                "Best candidate below match threshold"
            );
            MatchResult::NotFound
        }
    }

    /// Score every candidate, best first; ties broken by DOI.
    /// Repeated DOIs keep only their first occurrence.
    pub fn rank(&self, query: &ReferenceQuery, candidates: &[CandidateRecord]) -> Vec<ScoredCandidate> {
        let mut seen = HashSet::new();
        let mut ranked: Vec<ScoredCandidate> = candidates
            .iter()
            .filter(|c| seen.insert(c.doi.to_lowercase()))
            .map(|record| ScoredCandidate {
                record: record.clone(),
                score: self.score_candidate(query, record),
            })
            .collect();

        ranked.sort_by(|a, b| {
            rank_key(b.score.composite)
                .cmp(&rank_key(a.score.composite))
                .then_with(|| a.record.doi.cmp(&b.record.doi))
        });
        ranked
    }

    /// Sub-scores and weighted composite for one record
    pub fn score_candidate(&self, query: &ReferenceQuery, record: &CandidateRecord) -> MatchScore {
        let author = author_similarity(query.author_surname.as_deref(), &record.authors);
        let year = year_similarity(query.year, record.year);
        let title = title_similarity(query.title_fragment.as_deref(), &record.title);

        let w = &self.config.weights;
        let composite = (w.author * author + w.year * year + w.title * title).clamp(0.0, 1.0);

        MatchScore {
            author,
            year,
            title,
            composite,
        }
    }
}

/// Composite snapped to `SCORE_EPSILON` steps so that rounding noise ties
fn rank_key(composite: f64) -> i64 {
    (composite / SCORE_EPSILON).round() as i64
}

/// Best similarity between the surname and any author's family name.
///
/// Exact (case-insensitive) matches on the whole family name or one of its
/// parts score 1.0, otherwise normalized Levenshtein similarity.
pub fn author_similarity(surname: Option<&str>, authors: &[Author]) -> f64 {
    let Some(surname) = surname.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) else {
        return 0.0;
    };

    authors
        .iter()
        .map(|author| {
            let family = author.family.trim().to_lowercase();
            let parts: Vec<&str> = family
                .split(|c: char| c.is_whitespace() || c == '-')
                .filter(|p| !p.is_empty())
                .collect();
            if family == surname || parts.iter().any(|p| *p == surname) {
                return 1.0;
            }
            std::iter::once(family.as_str())
                .chain(parts.iter().copied())
                .map(|p| normalized_levenshtein(&surname, p))
                .fold(0.0, f64::max)
        })
        .fold(0.0_f64, f64::max)
        .clamp(0.0, 1.0)
}

/// 1.0 for the same year, 0.5 one year apart, otherwise 0.0
pub fn year_similarity(query_year: Option<i32>, record_year: Option<i32>) -> f64 {
    match (query_year, record_year) {
        (Some(q), Some(r)) if q == r => 1.0,
        (Some(q), Some(r)) if (q - r).abs() == 1 => 0.5,
        _ => 0.0,
    }
}

/// Share of the query's title tokens that appear in the record title
pub fn title_similarity(fragment: Option<&str>, title: &str) -> f64 {
    let Some(fragment) = fragment else {
        return 0.0;
    };

    let query_tokens = title_tokens(fragment);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let title_tokens = title_tokens(title);

    let shared = query_tokens.intersection(&title_tokens).count();
    (shared as f64 / query_tokens.len() as f64).clamp(0.0, 1.0)
}

/// Lowercase alphanumeric tokens with stopwords and bare numbers removed
pub fn title_tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::ReferenceParser;

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
        .pages("169")
    }

    fn query(author: &str, year: i32, title: &str) -> ReferenceQuery {
        ReferenceQuery {
            raw_text: format!("{} {} {}", author, year, title),
            author_surname: Some(author.to_string()),
            year: Some(year),
            title_fragment: Some(title.to_string()),
            doi: None,
        }
    }

    #[test]
    fn test_author_venue_only_reference_is_not_found() {
        // author=1.0, year=1.0, title=0.0 -> 0.6, below the 0.65 floor
        let query = ReferenceParser::with_current_year(2026).parse("Bharadwaj 2000 MIS Quarterly");
        let scorer = MatchScorer::default();

        let score = scorer.score_candidate(&query, &bharadwaj());
        assert_eq!(score.author, 1.0);
        assert_eq!(score.year, 1.0);
        assert_eq!(score.title, 0.0);
        assert!((score.composite - 0.6).abs() < 1e-9);

        assert_eq!(scorer.score(&query, &[bharadwaj()]), MatchResult::NotFound);
    }

    #[test]
    fn test_full_reference_matches() {
        let query = query("Bharadwaj", 2000, "resource-based perspective on information technology capability");
        let result = MatchScorer::default().score(&query, &[bharadwaj()]);

        match result {
            MatchResult::Matched { record, confidence } => {
                assert_eq!(record.doi, "10.2307/3250983");
                assert!((confidence - 1.0).abs() < 1e-9);
            }
            other => panic!("Expected Matched, got {:?}", other),
        }
    }

    #[test]
    fn test_doi_match_bypasses_scoring() {
        let query = ReferenceQuery::from_doi("10.2307/3250983");
        let result = MatchScorer::default().score(&query, &[bharadwaj()]);
        assert_eq!(
            result,
            MatchResult::Matched {
                record: bharadwaj(),
                confidence: 1.0
            }
        );
    }

    #[test]
    fn test_close_candidates_are_ambiguous() {
        let survey = CandidateRecord::new("10.1/survey", "A survey of graph neural networks")
            .author("Jane", "Smith")
            .year(2020);
        let short = CandidateRecord::new("10.1/short", "Graph neural networks")
            .author("John", "Smith")
            .year(2020);

        let query = query("Smith", 2020, "graph neural networks survey");
        let result = MatchScorer::default().score(&query, &[short.clone(), survey.clone()]);

        match result {
            MatchResult::Ambiguous { candidates } => {
                assert_eq!(candidates.len(), 2);
                assert_eq!(candidates[0].record, survey);
                assert_eq!(candidates[1].record, short);
                assert!((candidates[1].score.composite - 0.9).abs() < 1e-9);
            }
            other => panic!("Expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_clear_winner_matches_despite_runner_up() {
        let survey = CandidateRecord::new("10.1/survey", "A survey of graph neural networks")
            .author("Jane", "Smith")
            .year(2020);
        let older = CandidateRecord::new("10.1/older", "Graph neural networks")
            .author("John", "Smith")
            .year(2017);

        let query = query("Smith", 2020, "graph neural networks survey");
        let result = MatchScorer::default().score(&query, &[older, survey]);

        assert!((result.confidence().unwrap() - 1.0).abs() < 1e-9);
        match result {
            MatchResult::Matched { record, .. } => assert_eq!(record.doi, "10.1/survey"),
            other => panic!("Expected Matched, got {:?}", other),
        }
    }

    #[test]
    fn test_ties_sorted_by_doi() {
        let b = CandidateRecord::new("10.1/b", "Graph neural networks").author("", "Smith").year(2020);
        let a = CandidateRecord::new("10.1/a", "Graph neural networks").author("", "Smith").year(2020);

        let query = query("Smith", 2020, "graph neural networks");
        match MatchScorer::default().score(&query, &[b, a]) {
            MatchResult::Ambiguous { candidates } => {
                let dois: Vec<&str> = candidates.iter().map(|c| c.record.doi.as_str()).collect();
                assert_eq!(dois, vec!["10.1/a", "10.1/b"]);
            }
            other => panic!("Expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_near_equal_scores_tie_break_on_doi() {
        // 0.4 + 0.2 * 0.5 + 0.4 and 0.4 + 0.2 + 0.4 * 0.75 differ only by
        // floating-point rounding
        let a = CandidateRecord::new("10.1/a", "alpha beta gamma delta").author("", "Smith").year(2019);
        let b = CandidateRecord::new("10.1/b", "alpha beta gamma").author("", "Smith").year(2020);

        let query = query("Smith", 2020, "alpha beta gamma delta");
        let scorer = MatchScorer::default();
        let score_a = scorer.score_candidate(&query, &a).composite;
        let score_b = scorer.score_candidate(&query, &b).composite;
        assert!((score_a - score_b).abs() < 1e-9);

        match scorer.score(&query, &[b, a]) {
            MatchResult::Ambiguous { candidates } => {
                let dois: Vec<&str> = candidates.iter().map(|c| c.record.doi.as_str()).collect();
                assert_eq!(dois, vec!["10.1/a", "10.1/b"]);
            }
            other => panic!("Expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_weak_single_candidate_is_not_found() {
        // 0.4 + 0.0 + 0.3 = 0.7: above the floor, below the threshold
        let record = CandidateRecord::new("10.1/x", "Graph neural networks").author("", "Smith").year(2010);
        let query = query("Smith", 2020, "graph neural networks survey");
        let score = MatchScorer::default().score_candidate(&query, &record);
        assert!((score.composite - 0.7).abs() < 1e-9);
        assert_eq!(MatchScorer::default().score(&query, &[record]), MatchResult::NotFound);
    }

    #[test]
    fn test_no_candidates() {
        let query = query("Smith", 2020, "anything");
        assert_eq!(MatchScorer::default().score(&query, &[]), MatchResult::NotFound);
    }

    #[test]
    fn test_duplicate_dois_are_collapsed() {
        let record = bharadwaj();
        let query = query("Bharadwaj", 2000, "resource-based perspective");
        let ranked = MatchScorer::default().rank(&query, &[record.clone(), record]);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_author_similarity() {
        let authors = vec![Author::new("Anandhi", "Bharadwaj"), Author::new("Jan", "van der Berg")];
        assert_eq!(author_similarity(Some("BHARADWAJ"), &authors), 1.0);
        assert_eq!(author_similarity(Some("Berg"), &authors), 1.0);

        let misspelled = author_similarity(Some("Bharadwaja"), &authors);
        assert!(misspelled > 0.85 && misspelled < 1.0);

        assert_eq!(author_similarity(None, &authors), 0.0);
        assert_eq!(author_similarity(Some("Smith"), &[]), 0.0);
    }

    #[test]
    fn test_year_similarity() {
        assert_eq!(year_similarity(Some(2000), Some(2000)), 1.0);
        assert_eq!(year_similarity(Some(2000), Some(2001)), 0.5);
        assert_eq!(year_similarity(Some(2001), Some(2000)), 0.5);
        assert_eq!(year_similarity(Some(2000), Some(2003)), 0.0);
        assert_eq!(year_similarity(None, Some(2000)), 0.0);
        assert_eq!(year_similarity(Some(2000), None), 0.0);
    }

    #[test]
    fn test_title_similarity() {
        assert_eq!(title_similarity(Some("The Graph of Networks"), "graph networks"), 1.0);
        assert_eq!(title_similarity(Some("graph trees"), "Graph networks"), 0.5);
        assert_eq!(title_similarity(Some("the of and"), "anything"), 0.0);
        assert_eq!(title_similarity(None, "anything"), 0.0);
    }

    #[test]
    fn test_scores_stay_bounded() {
        let scorer = MatchScorer::default();
        let records = [
            bharadwaj(),
            CandidateRecord::new("10.1/empty", "x"),
            CandidateRecord::new("10.1/other", "Something unrelated entirely").author("Q", "Zzyzx").year(1700),
        ];
        let queries = [
            query("Bharadwaj", 2000, "resource-based perspective perspective perspective"),
            ReferenceQuery::default(),
            query("", 1500, "!!!"),
        ];

        for q in &queries {
            for r in &records {
                let s = scorer.score_candidate(q, r);
                for v in [s.author, s.year, s.title, s.composite] {
                    assert!((0.0..=1.0).contains(&v), "score {} out of bounds", v);
                }
            }
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(MatchConfig::default().validate().is_ok());
        assert!((MatchConfig::default().weights.sum() - 1.0).abs() < 1e-12);

        let unbalanced = MatchWeights {
            author: 0.5,
            year: 0.2,
            title: 0.4,
        };
        assert!(matches!(
            MatchConfig::new(unbalanced, 0.75, 0.1),
            Err(RequestError::InvalidConfig(_))
        ));
        assert!(MatchConfig::new(MatchWeights::default(), 1.5, 0.1).is_err());
        assert!(MatchConfig::new(MatchWeights::default(), 0.75, 0.9).is_err());

        let retuned = MatchConfig::new(
            MatchWeights {
                author: 0.5,
                year: 0.3,
                title: 0.2,
            },
            0.75,
            0.1,
        )
        .unwrap();
        // With author/year weighted up the author+venue reference clears the threshold
        let query = ReferenceParser::with_current_year(2026).parse("Bharadwaj 2000 MIS Quarterly");
        assert!(MatchScorer::new(retuned).score(&query, &[bharadwaj()]).is_matched());
    }
}
