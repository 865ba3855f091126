//! Output formats and the extraction result type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest extraction result accepted, in characters.
pub const MAX_EXTRACTION_CHARS: usize = 100_000;

/// Largest clipboard payload accepted, in characters.
pub const MAX_CLIPBOARD_CHARS: usize = 1_000_000;

/// Target representation for copied equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    MathML,
    #[serde(alias = "tex")]
    LaTeX,
    #[serde(alias = "text")]
    Unicode,
    #[serde(alias = "ascii")]
    AsciiMath,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::MathML, Format::LaTeX, Format::Unicode, Format::AsciiMath];

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Format::MathML => "mathml",
            Format::LaTeX => "latex",
            Format::Unicode => "unicode",
            Format::AsciiMath => "asciimath",
        }
    }

    /// Display name for user-facing text.
    pub fn label(self) -> &'static str {
        match self {
            Format::MathML => "MathML",
            Format::LaTeX => "LaTeX",
            Format::Unicode => "Unicode",
            Format::AsciiMath => "AsciiMath",
        }
    }

    /// Parse a format name, substituting the default for anything unknown.
    pub fn parse_lenient(name: &str) -> Format {
        name.parse().unwrap_or_else(|e: Error| {
            tracing::warn!(error = %e, "falling back to {}", Format::default());
            Format::default()
        })
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mathml" => Ok(Format::MathML),
            "latex" | "tex" => Ok(Format::LaTeX),
            "unicode" | "text" => Ok(Format::Unicode),
            "asciimath" | "ascii" => Ok(Format::AsciiMath),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// Content extracted from one equation.
///
/// Construction enforces the content bounds: never empty after trimming and
/// never over [`MAX_EXTRACTION_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    content: String,
    format: Format,
}

impl ExtractionResult {
    pub fn new(content: impl Into<String>, format: Format) -> Result<Self> {
        let content = content.into();
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyContent);
        }
        let len = trimmed.chars().count();
        if len > MAX_EXTRACTION_CHARS {
            return Err(Error::ContentTooLarge {
                len,
                max: MAX_EXTRACTION_CHARS,
            });
        }
        let content = if trimmed.len() == content.len() {
            content
        } else {
            trimmed.to_string()
        };
        Ok(Self { content, format })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("MathML".parse::<Format>().unwrap(), Format::MathML);
        assert_eq!("tex".parse::<Format>().unwrap(), Format::LaTeX);
        assert_eq!(" Unicode ".parse::<Format>().unwrap(), Format::Unicode);
        assert_eq!("ascii".parse::<Format>().unwrap(), Format::AsciiMath);
        assert!(matches!("svg".parse::<Format>(), Err(Error::UnknownFormat(_))));
        assert_eq!(Format::parse_lenient("svg"), Format::MathML);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Format::MathML).unwrap(), "\"mathml\"");
        assert_eq!(serde_json::to_string(&Format::AsciiMath).unwrap(), "\"asciimath\"");
        let f: Format = serde_json::from_str("\"tex\"").unwrap();
        assert_eq!(f, Format::LaTeX);
    }

    #[test]
    fn test_result_rejects_empty_and_oversized() {
        assert!(matches!(
            ExtractionResult::new("  \n ", Format::LaTeX),
            Err(Error::EmptyContent)
        ));
        let big = "x".repeat(150_000);
        assert!(matches!(
            ExtractionResult::new(big, Format::Unicode),
            Err(Error::ContentTooLarge { len: 150_000, max: MAX_EXTRACTION_CHARS })
        ));
    }

    #[test]
    fn test_result_trims() {
        let r = ExtractionResult::new("  x^2 ", Format::LaTeX).unwrap();
        assert_eq!(r.content(), "x^2");
        assert_eq!(r.format(), Format::LaTeX);
    }
}
