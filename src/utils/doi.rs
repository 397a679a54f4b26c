//! DOI normalization and extraction.
//!
//! DOIs have the format "10.xxxx/xxxxxx" where xxxx is a registrant code
//! (optionally with dotted sub-parts) and xxxxxx is an item suffix.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::ItemError;

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi.org/",
    "doi:",
];

static DOI_EXACT: OnceLock<Regex> = OnceLock::new();
static DOI_EMBEDDED: OnceLock<Regex> = OnceLock::new();

fn exact_pattern() -> &'static Regex {
    DOI_EXACT.get_or_init(|| {
        Regex::new(r"^10\.\d{4,9}(?:\.\d+)*/\S+$").expect("static DOI pattern is valid")
    })
}

fn embedded_pattern() -> &'static Regex {
    DOI_EMBEDDED.get_or_init(|| {
        Regex::new(r#"(?i)\b10\.\d{4,9}(?:\.\d+)*/[^\s"<>]+"#).expect("static DOI pattern is valid")
    })
}

/// Validate and canonicalize a DOI.
///
/// Accepts bare DOIs as well as `doi:` and resolver-URL forms; returns the
/// lowercase bare DOI.
pub fn normalize_doi(doi: &str) -> Result<String, ItemError> {
    let invalid = || ItemError::InvalidDoiSyntax {
        doi: doi.trim().to_string(),
    };

    let lowered = doi.trim().to_lowercase();
    let mut bare = lowered.as_str();
    for prefix in DOI_PREFIXES {
        if let Some(rest) = bare.strip_prefix(prefix) {
            bare = rest.trim_start();
            break;
        }
    }
    let bare = trim_trailing_punctuation(bare);

    if bare.is_empty() || bare.contains("..") || !exact_pattern().is_match(bare) {
        return Err(invalid());
    }

    Ok(bare.to_string())
}

/// Whether the whole string is a DOI (in any accepted form)
pub fn looks_like_doi(text: &str) -> bool {
    normalize_doi(text).is_ok()
}

/// Find a DOI embedded anywhere in a reference string.
///
/// Returns the normalized DOI and the byte range of the match in `text`.
pub fn find_doi(text: &str) -> Option<(String, std::ops::Range<usize>)> {
    let found = embedded_pattern().find(text)?;
    let trimmed = trim_trailing_punctuation(found.as_str());
    let doi = normalize_doi(trimmed).ok()?;

    // Swallow a resolver prefix immediately in front of the DOI
    let mut start = found.start();
    let before = text[..start].to_lowercase();
    for prefix in DOI_PREFIXES {
        if before.ends_with(prefix) {
            start -= prefix.len();
            break;
        }
    }

    Some((doi, start..found.start() + trimmed.len()))
}

/// Strip sentence punctuation that commonly trails a DOI in running text.
/// A closing bracket is kept when the DOI itself opened one.
fn trim_trailing_punctuation(doi: &str) -> &str {
    let mut end = doi.len();
    loop {
        let current = &doi[..end];
        let Some(last) = current.chars().last() else {
            break;
        };
        let strip = match last {
            '.' | ',' | ';' | ':' | '\'' => true,
            ')' => current.matches('(').count() < current.matches(')').count(),
            ']' => current.matches('[').count() < current.matches(']').count(),
            _ => false,
        };
        if !strip {
            break;
        }
        end -= last.len_utf8();
    }
    &doi[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_doi_valid() {
        assert_eq!(normalize_doi("10.2307/3250983").unwrap(), "10.2307/3250983");
        assert_eq!(normalize_doi("10.1038/Nature12345").unwrap(), "10.1038/nature12345");
        assert_eq!(normalize_doi("doi:10.1234/abc123").unwrap(), "10.1234/abc123");
        assert_eq!(normalize_doi("DOI: 10.1234/abc123").unwrap(), "10.1234/abc123");
        assert_eq!(
            normalize_doi("https://doi.org/10.1234/abc123").unwrap(),
            "10.1234/abc123"
        );
        assert_eq!(
            normalize_doi("http://dx.doi.org/10.1000.10/xyz.").unwrap(),
            "10.1000.10/xyz"
        );
    }

    #[test]
    fn test_normalize_doi_invalid() {
        assert!(normalize_doi("").is_err());
        assert!(normalize_doi("10.1234").is_err()); // No slash
        assert!(normalize_doi("9.1234/abc").is_err()); // Doesn't start with 10
        assert!(normalize_doi("10.12/abc").is_err()); // Registrant too short
        assert!(normalize_doi("10.1234/").is_err()); // Empty suffix
        assert!(normalize_doi("10.1234/../abc").is_err()); // Path traversal
        assert!(normalize_doi("10.1234/has space").is_err());

        match normalize_doi(" 10.12 ") {
            Err(ItemError::InvalidDoiSyntax { doi }) => assert_eq!(doi, "10.12"),
            other => panic!("Expected InvalidDoiSyntax, got {:?}", other),
        }
    }

    #[test]
    fn test_looks_like_doi() {
        assert!(looks_like_doi("10.2307/3250983"));
        assert!(!looks_like_doi("Bharadwaj 2000 MIS Quarterly"));
        assert!(!looks_like_doi("see 10.2307/3250983"));
    }

    #[test]
    fn test_find_embedded_doi() {
        let text = "Bharadwaj, A. (2000). MIS Quarterly, 24(1), 169-196. https://doi.org/10.2307/3250983.";
        let (doi, range) = find_doi(text).unwrap();
        assert_eq!(doi, "10.2307/3250983");
        assert_eq!(&text[range], "https://doi.org/10.2307/3250983");

        let (doi, _) = find_doi("Wiley (1999) doi:10.1002/(SICI)1097-0258(19990115)18:1<1::AID>3.0.CO;2-2").unwrap();
        assert!(doi.starts_with("10.1002/(sici)"));

        assert!(find_doi("no identifier here 2000").is_none());
    }

    #[test]
    fn test_trailing_bracket_handling() {
        let (doi, _) = find_doi("(see 10.1000/abc(1)).").unwrap();
        assert_eq!(doi, "10.1000/abc(1)");
    }
}
