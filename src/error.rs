//! Error types for the OFX parser

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid OFX header: {0}")]
    Header(#[from] HeaderError),

    #[error("Malformed markup at line {line} (byte {offset}): {message}")]
    MalformedMarkup {
        message: String,
        offset: usize,
        line: usize,
    },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Incomplete OFX response: {0}")]
    IncompleteResponse(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Problems with the document preamble. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("required directive {0} is missing")]
    MissingDirective(String),

    #[error("directive {directive} has invalid value {value:?}")]
    InvalidValue { directive: String, value: String },

    #[error("unsupported OFX version {0}")]
    UnsupportedVersion(String),

    #[error("unsupported text encoding {0:?}")]
    UnsupportedEncoding(String),

    #[error("{0}")]
    Malformed(String),
}

/// Failure to turn one element node into a typed aggregate.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionError {
    #[error("{path}: {aggregate} is missing required field {field}")]
    MissingField {
        aggregate: String,
        field: String,
        path: String,
    },

    #[error("{path}: {aggregate}.{field} value {value:?} is not a valid {expected}")]
    FieldType {
        aggregate: String,
        field: String,
        value: String,
        expected: String,
        path: String,
    },

    #[error("no aggregate definition for {0}")]
    UnknownAggregate(String),
}

impl ConversionError {
    pub(crate) fn missing(aggregate: &str, field: &str, path: &str) -> Self {
        ConversionError::MissingField {
            aggregate: aggregate.to_string(),
            field: field.to_string(),
            path: path.to_string(),
        }
    }

    pub(crate) fn field_type(
        aggregate: &str,
        field: &str,
        value: &str,
        expected: &str,
        path: &str,
    ) -> Self {
        ConversionError::FieldType {
            aggregate: aggregate.to_string(),
            field: field.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
            path: path.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
