//! # CrossRef MCP
//!
//! A Model Context Protocol (MCP) server that validates free-text academic
//! references and DOIs against CrossRef and renders the matched records as
//! APA 7th or Harvard citations.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (ReferenceQuery, CandidateRecord, MatchResult, etc.)
//! - [`matching`]: Reference parsing and candidate scoring
//! - [`sources`]: Metadata sources and the retrying lookup adapter
//! - [`validator`]: The parse, lookup, score and format pipeline plus batching
//! - [`mcp`]: MCP protocol implementation and server
//! - [`utils`]: Citation formatting, DOI handling, HTTP and retry utilities
//! - [`config`]: Configuration management
//! - [`error`]: Per-item and per-call error types

pub mod config;
pub mod error;
pub mod matching;
pub mod mcp;
pub mod models;
pub mod sources;
pub mod utils;
pub mod validator;

// Re-export commonly used types
pub use error::{ItemError, RequestError};
pub use models::{CandidateRecord, CitationStyle, FormatType, MatchResult, ReferenceQuery};
pub use sources::{CrossRefSource, MetadataSource};
pub use validator::ReferenceValidator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
