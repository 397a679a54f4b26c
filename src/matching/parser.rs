//! Heuristic decomposition of free-text references.
//!
//! There is no grammar here: a handful of ordered rules pull out a year, a
//! surname candidate and a title fragment, and anything unrecognized is
//! dropped. Parsing never fails.
//!
//! 1. A 4-digit token in `[1500, current year + 1]` is the year.
//! 2. The first capitalized word before the year is the author surname; with
//!    no year, the first word is used.
//! 3. What is left, minus initials and author connectors ahead of the year, is
//!    the title fragment.
//!
//! A reference that is itself a DOI skips all of this. A DOI embedded in a
//! longer reference is lifted out and the rest is still parsed.

use chrono::Datelike;

use crate::models::ReferenceQuery;
use crate::utils::{find_doi, looks_like_doi, normalize_doi};

const MIN_YEAR: i32 = 1500;

/// Reference string parser
#[derive(Debug, Clone, Copy)]
pub struct ReferenceParser {
    current_year: i32,
}

impl Default for ReferenceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceParser {
    /// Parser that accepts years up to next year
    pub fn new() -> Self {
        Self::with_current_year(chrono::Utc::now().year())
    }

    /// Parser pinned to a given "current" year
    pub fn with_current_year(current_year: i32) -> Self {
        Self { current_year }
    }

    /// Parse a reference into best-effort fields
    pub fn parse(&self, raw_text: &str) -> ReferenceQuery {
        let text = raw_text.trim();
        let mut query = ReferenceQuery {
            raw_text: text.to_string(),
            ..ReferenceQuery::default()
        };

        if looks_like_doi(text) {
            query.doi = normalize_doi(text).ok();
            return query;
        }

        let remainder = match find_doi(text) {
            Some((doi, range)) => {
                query.doi = Some(doi);
                format!("{} {}", &text[..range.start], &text[range.end..])
            }
            None => text.to_string(),
        };

        let tokens: Vec<&str> = remainder.split_whitespace().collect();
        let cores: Vec<&str> = tokens.iter().map(|t| token_core(t)).collect();

        let year_idx = cores.iter().position(|c| self.parse_year(c).is_some());
        query.year = year_idx.and_then(|i| self.parse_year(cores[i]));

        let author_idx = match year_idx {
            Some(y) => cores[..y].iter().position(|c| is_capitalized_word(c)),
            None => cores.iter().position(|c| is_word(c)),
        };
        query.author_surname = author_idx.map(|i| cores[i].to_string());

        // Initials, connectors and co-authors belong to the author list, not the title
        let in_author_list = |i: usize| {
            is_initials(tokens[i]) || is_connector(tokens[i]) || is_coauthor(&tokens, &cores, i)
        };
        let author_list_end = match (year_idx, author_idx) {
            (Some(y), _) => y,
            (None, Some(a)) => a + 1 + (a + 1..tokens.len()).take_while(|&i| in_author_list(i)).count(),
            (None, None) => 0,
        };

        let title_tokens: Vec<&str> = tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                Some(*i) != year_idx
                    && Some(*i) != author_idx
                    && !(*i < author_list_end && in_author_list(*i))
            })
            .map(|(_, token)| *token)
            .collect();

        let fragment = title_tokens.join(" ");
        let fragment = fragment.trim_matches(|c: char| !c.is_alphanumeric());
        if !fragment.is_empty() {
            query.title_fragment = Some(fragment.to_string());
        }

        query
    }

    fn parse_year(&self, core: &str) -> Option<i32> {
        if core.len() != 4 || !core.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let year: i32 = core.parse().ok()?;
        (MIN_YEAR..=self.current_year + 1)
            .contains(&year)
            .then_some(year)
    }
}

/// Token with surrounding punctuation removed ("(2000)." -> "2000")
fn token_core(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

fn is_word(core: &str) -> bool {
    core.chars().any(char::is_alphabetic)
}

fn is_capitalized_word(core: &str) -> bool {
    let starts_upper = core.chars().next().is_some_and(char::is_uppercase);
    starts_upper
        && core.chars().count() > 1
        && core
            .chars()
            .all(|c| c.is_alphabetic() || matches!(c, '-' | '\'' | '\u{2019}'))
}

/// "A.", "A.B.", "J.-P." and bare single capitals
fn is_initials(token: &str) -> bool {
    let t = token.trim_matches(|c: char| matches!(c, ',' | ';' | '(' | ')'));
    if t.is_empty() {
        return false;
    }

    let parts: Vec<&str> = t.split(['.', '-']).filter(|p| !p.is_empty()).collect();
    !parts.is_empty()
        && parts
            .iter()
            .all(|p| p.chars().count() == 1 && p.chars().all(char::is_uppercase))
        && (t.contains('.') || parts.len() == 1)
}

/// A surname followed by initials, as in "Jones, K."
fn is_coauthor(tokens: &[&str], cores: &[&str], i: usize) -> bool {
    is_capitalized_word(cores[i]) && tokens.get(i + 1).is_some_and(|next| is_initials(next))
}

fn is_connector(token: &str) -> bool {
    let core = token_core(token).to_lowercase();
    token.trim() == "&" || matches!(core.as_str(), "and" | "et" | "al")
}
