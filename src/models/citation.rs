//! Citation style, presentation format and rendered citations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RequestError;

/// Citation style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    /// APA 7th edition
    #[default]
    Apa,
    /// Harvard (author-date)
    Harvard,
}

impl CitationStyle {
    /// Identifier used on the wire ("apa", "harvard")
    pub fn id(&self) -> &'static str {
        match self {
            CitationStyle::Apa => "apa",
            CitationStyle::Harvard => "harvard",
        }
    }
}

impl FromStr for CitationStyle {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "apa" => Ok(CitationStyle::Apa),
            "harvard" => Ok(CitationStyle::Harvard),
            _ => Err(RequestError::UnsupportedStyle(s.to_string())),
        }
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationStyle::Apa => write!(f, "APA 7th"),
            CitationStyle::Harvard => write!(f, "Harvard"),
        }
    }
}

/// Presentation of the rendered citation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    /// Container title (and APA volume) wrapped in `*...*`
    #[default]
    Markdown,
    /// No markup at all
    Text,
}

impl FormatType {
    pub fn id(&self) -> &'static str {
        match self {
            FormatType::Markdown => "markdown",
            FormatType::Text => "text",
        }
    }
}

impl FromStr for FormatType {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(FormatType::Markdown),
            "text" | "plain" => Ok(FormatType::Text),
            _ => Err(RequestError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A citation rendered from one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedCitation {
    pub text: String,
    pub style: CitationStyle,
    pub format: FormatType,
}

impl fmt::Display for FormattedCitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
