//! Utility modules supporting reference validation.
//!
//! - [`format_citation`]: Render a record as an APA 7th or Harvard citation
//! - [`normalize_doi`], [`find_doi`], [`looks_like_doi`]: DOI handling
//! - [`HttpClient`]: Shared reqwest client with timeouts and user agent
//! - [`RetryConfig`]: Configuration for retry logic with exponential backoff
//! - [`with_retry`]: Execute an operation with automatic retry on transient errors
//!
//! # Citation Formatting
//!
//! ```rust
//! use crossref_mcp::models::{CandidateRecord, CitationStyle, FormatType};
//! use crossref_mcp::utils::format_citation;
//!
//! let record = CandidateRecord::new("10.1/x", "Title")
//!     .author("Ann", "Author")
//!     .year(2000);
//! let citation = format_citation(&record, CitationStyle::Apa, FormatType::Text);
//! assert_eq!(citation.text, "Author, A. (2000). Title. https://doi.org/10.1/x");
//! ```

mod cite;
mod doi;
mod http;
mod retry;

pub use cite::format_citation;
pub use doi::{find_doi, looks_like_doi, normalize_doi};
pub use http::{polite_user_agent, HttpClient, DEFAULT_USER_AGENT};
pub use retry::{with_retry, RetryConfig};
