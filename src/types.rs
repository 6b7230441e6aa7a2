//! Shared option and diagnostic types

use crate::header::OfxHeader;
use crate::tree::ElementTree;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Options for parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Encoding label overriding the one the header declares.
    pub encoding: Option<String>,
    /// Fail on the first isolated conversion error instead of recording it.
    pub strict: bool,
    /// Parse multiple files on the rayon pool
    pub parallel: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            strict: false,
            parallel: true,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Header plus raw element tree, before any typed conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfxDocument {
    pub header: OfxHeader,
    pub tree: ElementTree,
}

/// Recoverable oddity noticed while converting a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Child element the aggregate does not declare; it was skipped.
    UnknownElement {
        aggregate: String,
        element: String,
        path: String,
    },
    /// Code outside the documented value set; kept as `Unknown`.
    UnknownCode {
        field: String,
        value: String,
        path: String,
    },
    /// Second occurrence of a singular child; only the first is kept.
    DuplicateElement {
        aggregate: String,
        element: String,
        path: String,
    },
    /// More than one member of a mutually exclusive group appeared.
    ConflictingElements {
        aggregate: String,
        elements: Vec<String>,
        path: String,
    },
    ValueTooLong {
        field: String,
        length: usize,
        max: usize,
        path: String,
    },
}

impl Warning {
    pub fn path(&self) -> &str {
        match self {
            Warning::UnknownElement { path, .. }
            | Warning::UnknownCode { path, .. }
            | Warning::DuplicateElement { path, .. }
            | Warning::ConflictingElements { path, .. }
            | Warning::ValueTooLong { path, .. } => path,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnknownElement { aggregate, element, path } => {
                write!(f, "{path}: unknown element {element} in {aggregate}")
            }
            Warning::UnknownCode { field, value, path } => {
                write!(f, "{path}: unknown code {value:?} for {field}")
            }
            Warning::DuplicateElement { aggregate, element, path } => {
                write!(f, "{path}: duplicate {element} in {aggregate}, keeping the first")
            }
            Warning::ConflictingElements { aggregate, elements, path } => {
                write!(f, "{path}: {aggregate} contains conflicting {}", elements.join(" and "))
            }
            Warning::ValueTooLong { field, length, max, path } => {
                write!(f, "{path}: {field} is {length} characters, longer than {max}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = ParseOptions::new();
        assert!(options.parallel);
        assert!(!options.strict);
        assert_eq!(options.encoding, None);

        let options = ParseOptions::strict().with_encoding("cp1252").with_parallel(false);
        assert!(options.strict);
        assert!(!options.parallel);
        assert_eq!(options.encoding.as_deref(), Some("cp1252"));
    }

    #[test]
    fn test_warning_serialization() {
        let warning = Warning::UnknownElement {
            aggregate: "STMTTRN".into(),
            element: "INTU.XID".into(),
            path: "OFX/BANKMSGSRSV1/STMTTRNRS/STMTRS/BANKTRANLIST/STMTTRN".into(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "unknown_element");
        assert_eq!(json["element"], "INTU.XID");
        assert!(warning.to_string().contains("unknown element INTU.XID"));
        assert!(warning.path().ends_with("STMTTRN"));
    }
}
