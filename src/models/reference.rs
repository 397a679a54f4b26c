//! Reference query and candidate metadata records.

use serde::{Deserialize, Serialize};

/// Best-effort fields recovered from a free-text reference string.
///
/// Built by [`crate::matching::ReferenceParser`]; never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceQuery {
    /// Original input as given by the caller (trimmed)
    pub raw_text: String,

    /// Candidate first-author surname
    pub author_surname: Option<String>,

    /// Publication year
    pub year: Option<i32>,

    /// Whatever text is left once author and year are removed
    pub title_fragment: Option<String>,

    /// Normalized DOI, when the input is or contains one
    pub doi: Option<String>,
}

impl ReferenceQuery {
    /// Build a query that only carries an exact identifier.
    pub fn from_doi(doi: impl Into<String>) -> Self {
        let doi = doi.into();
        Self {
            raw_text: doi.clone(),
            doi: Some(doi),
            ..Self::default()
        }
    }

    /// Whether the parser recovered anything usable for a lookup
    pub fn has_fields(&self) -> bool {
        self.doi.is_some() || self.has_text_fields()
    }

    /// Whether there is anything to run a free-text search with
    pub fn has_text_fields(&self) -> bool {
        self.author_surname.is_some() || self.year.is_some() || self.title_fragment.is_some()
    }

    /// Text sent to the provider's bibliographic search
    pub fn search_text(&self) -> &str {
        &self.raw_text
    }
}

/// One author of a candidate record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Given names (may be empty for organisations)
    #[serde(default)]
    pub given: String,

    /// Family name (or the organisation name)
    pub family: String,
}

impl Author {
    pub fn new(given: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            given: given.into(),
            family: family.into(),
        }
    }

    /// "Family, Given" display form, or just the family name
    pub fn display_name(&self) -> String {
        if self.given.trim().is_empty() {
            self.family.clone()
        } else {
            format!("{}, {}", self.family, self.given)
        }
    }
}

/// A bibliographic record returned by the metadata service.
///
/// Every record that leaves the source layer has a non-empty DOI and title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub doi: String,
    pub title: String,
    pub authors: Vec<Author>,
    pub year: Option<i32>,
    /// Journal or venue
    pub container_title: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    /// Provider-side relevance, advisory only
    #[serde(default)]
    pub score: f64,
}

impl CandidateRecord {
    /// Create a record with the required fields
    pub fn new(doi: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            doi: doi.into(),
            title: title.into(),
            authors: Vec::new(),
            year: None,
            container_title: None,
            volume: None,
            issue: None,
            pages: None,
            score: 0.0,
        }
    }

    pub fn author(mut self, given: impl Into<String>, family: impl Into<String>) -> Self {
        self.authors.push(Author::new(given, family));
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn container_title(mut self, container: impl Into<String>) -> Self {
        self.container_title = Some(container.into());
        self
    }

    pub fn volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    pub fn issue(mut self, issue: impl Into<String>) -> Self {
        self.issue = Some(issue.into());
        self
    }

    pub fn pages(mut self, pages: impl Into<String>) -> Self {
        self.pages = Some(pages.into());
        self
    }

    /// Resolver URL for this record's DOI
    pub fn doi_url(&self) -> String {
        format!("https://doi.org/{}", self.doi)
    }
}
