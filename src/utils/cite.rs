//! Citation formatting in APA 7th and Harvard styles.
//!
//! Rendering is a pure function of the record, style and format. Missing
//! volume, issue, pages, venue or DOI drop out together with their
//! punctuation.

use crate::models::{Author, CandidateRecord, CitationStyle, FormatType, FormattedCitation};

/// APA lists at most this many authors before eliding
const APA_MAX_AUTHORS: usize = 20;

/// Format a record as a citation in the specified style
pub fn format_citation(
    record: &CandidateRecord,
    style: CitationStyle,
    format: FormatType,
) -> FormattedCitation {
    let text = match style {
        CitationStyle::Apa => format_apa(record, format),
        CitationStyle::Harvard => format_harvard(record, format),
    };

    FormattedCitation {
        text,
        style,
        format,
    }
}

/// Format: Author, A. A., & Author, B. B. (Year). Title. Journal, volume(issue), pages. https://doi.org/DOI
fn format_apa(record: &CandidateRecord, format: FormatType) -> String {
    let year = year_label(record.year);
    let title = as_sentence(&record.title);

    let mut citation = match format_authors_apa(&record.authors) {
        Some(authors) => format!("{} ({}). {}", authors, year, title),
        None => format!("{} ({}).", title, year),
    };

    let mut source = Vec::new();
    if let Some(journal) = non_empty(&record.container_title) {
        source.push(emphasize(journal, format));
    }
    if let Some(volume) = non_empty(&record.volume) {
        let mut part = emphasize(volume, format);
        if let Some(issue) = non_empty(&record.issue) {
            part.push_str(&format!("({})", issue));
        }
        source.push(part);
    }
    if let Some(pages) = non_empty(&record.pages) {
        source.push(pages.to_string());
    }
    if !source.is_empty() {
        citation.push(' ');
        citation.push_str(&source.join(", "));
        citation.push('.');
    }

    if !record.doi.trim().is_empty() {
        citation.push(' ');
        citation.push_str(&record.doi_url());
    }

    citation
}

/// Format: Author, A.B. (Year) 'Title', Journal, vol. volume, no. issue, pp. pages, doi: DOI
fn format_harvard(record: &CandidateRecord, format: FormatType) -> String {
    let year = year_label(record.year);
    let title = record.title.trim().trim_end_matches('.');

    let head = match format_authors_harvard(&record.authors) {
        Some(authors) => format!("{} ({}) '{}'", authors, year, title),
        None => format!("'{}' ({})", title, year),
    };

    let mut parts = vec![head];
    if let Some(journal) = non_empty(&record.container_title) {
        parts.push(emphasize(journal, format));
    }
    if let Some(volume) = non_empty(&record.volume) {
        parts.push(format!("vol. {}", volume));
    }
    if let Some(issue) = non_empty(&record.issue) {
        parts.push(format!("no. {}", issue));
    }
    if let Some(pages) = non_empty(&record.pages) {
        let prefix = if pages.contains(['-', '\u{2013}', ',']) { "pp." } else { "p." };
        parts.push(format!("{} {}", prefix, pages));
    }

    let has_doi = !record.doi.trim().is_empty();
    if has_doi {
        parts.push(format!("doi: {}", record.doi));
    }

    let mut citation = parts.join(", ");
    if !has_doi {
        citation.push('.');
    }
    citation
}

/// "Last, F. M." joined APA-style, or `None` without authors
fn format_authors_apa(authors: &[Author]) -> Option<String> {
    let formatted: Vec<String> = authors.iter().map(|a| format_author(a, " ")).collect();

    match formatted.len() {
        0 => None,
        1 => Some(formatted[0].clone()),
        n if n <= APA_MAX_AUTHORS => {
            let (last, rest) = formatted.split_last()?;
            Some(format!("{}, & {}", rest.join(", "), last))
        }
        _ => {
            let last = formatted.last()?;
            Some(format!("{}, . . . {}", formatted[..APA_MAX_AUTHORS - 1].join(", "), last))
        }
    }
}

/// "Last, F.M." joined with "and" before the final author
fn format_authors_harvard(authors: &[Author]) -> Option<String> {
    let formatted: Vec<String> = authors.iter().map(|a| format_author(a, "")).collect();

    match formatted.split_last() {
        None => None,
        Some((only, [])) => Some(only.clone()),
        Some((last, rest)) => Some(format!("{} and {}", rest.join(", "), last)),
    }
}

fn format_author(author: &Author, separator: &str) -> String {
    let family = author.family.trim();
    let initials = initials(&author.given);
    if initials.is_empty() {
        family.to_string()
    } else {
        format!("{}, {}", family, initials.join(separator))
    }
}

/// First letter of each given name, period-terminated ("Jean-Paul" -> "J.-P.")
fn initials(given: &str) -> Vec<String> {
    given
        .split(|c: char| c.is_whitespace() || c == '.')
        .filter(|name| !name.is_empty())
        .filter_map(|name| {
            let parts: Vec<String> = name
                .split('-')
                .filter_map(|part| part.chars().find(|c| c.is_alphabetic()))
                .map(|c| format!("{}.", c.to_uppercase()))
                .collect();
            (!parts.is_empty()).then(|| parts.join("-"))
        })
        .collect()
}

fn year_label(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string())
}

/// Title with exactly one terminal punctuation mark
fn as_sentence(title: &str) -> String {
    let title = title.trim().trim_end_matches('.');
    if title.ends_with('?') || title.ends_with('!') {
        title.to_string()
    } else {
        format!("{}.", title)
    }
}

fn emphasize(text: &str, format: FormatType) -> String {
    match format {
        FormatType::Markdown => format!("*{}*", text),
        FormatType::Text => text.to_string(),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
