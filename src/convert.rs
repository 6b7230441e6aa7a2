//! Schema-driven conversion from element nodes to generic aggregates
//!
//! One walk serves every aggregate: each child node is looked up in the
//! parent's [`AggregateDef`], coerced to the declared kind and collected in
//! document order. Typed models are then read off the resulting
//! [`Aggregate`] values.
//!
//! Failures inside an item of a repeated child (one transaction, one
//! position, one security) drop that item and are recorded; the rest of the
//! document is still converted. Failures in singular children propagate to
//! the nearest repeated ancestor, or to the root, where they are fatal.

use crate::codes::OfxCode;
use crate::datetime::OfxDateTime;
use crate::error::ConversionError;
use crate::schema::{AggregateDef, FieldKind, FieldSpec, Registry};
use crate::tree::{ElementTree, Node, NodeId};
use crate::types::Warning;
use rust_decimal::Decimal;
use serde::Serialize;
use std::borrow::Cow;
use std::str::FromStr;
use tracing::{trace, warn};

/// Converted value of one child.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Bool(bool),
    DateTime(OfxDateTime),
    /// Raw code string; typed on access.
    Code(String),
    Aggregate(Box<Aggregate>),
}

/// An aggregate whose children have been validated and coerced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub tag: String,
    /// Location in the document, e.g. `OFX/SIGNONMSGSRSV1/SONRS`.
    pub path: String,
    /// Children in document order; repeated children appear once per item.
    pub fields: Vec<(String, FieldValue)>,
}

type FieldResult<T> = std::result::Result<T, ConversionError>;

impl Aggregate {
    pub fn get(&self, tag: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == tag)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.get(tag).is_some()
    }

    pub fn text(&self, tag: &str) -> Option<&str> {
        match self.get(tag)? {
            FieldValue::Text(text) | FieldValue::Code(text) => Some(text),
            _ => None,
        }
    }

    pub fn integer(&self, tag: &str) -> Option<i64> {
        match self.get(tag)? {
            FieldValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn decimal(&self, tag: &str) -> Option<Decimal> {
        match self.get(tag)? {
            FieldValue::Decimal(value) => Some(*value),
            _ => None,
        }
    }

    pub fn bool(&self, tag: &str) -> Option<bool> {
        match self.get(tag)? {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn datetime(&self, tag: &str) -> Option<&OfxDateTime> {
        match self.get(tag)? {
            FieldValue::DateTime(value) => Some(value),
            _ => None,
        }
    }

    pub fn code<C: OfxCode>(&self, tag: &str) -> Option<C> {
        match self.get(tag)? {
            FieldValue::Code(code) => Some(C::from_code(code)),
            _ => None,
        }
    }

    pub fn aggregate(&self, tag: &str) -> Option<&Aggregate> {
        match self.get(tag)? {
            FieldValue::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    /// Every child aggregate in document order, with its tag.
    pub fn aggregates(&self) -> impl Iterator<Item = (&str, &Aggregate)> {
        self.fields.iter().filter_map(|(tag, value)| match value {
            FieldValue::Aggregate(agg) => Some((tag.as_str(), agg.as_ref())),
            _ => None,
        })
    }

    /// Child aggregates named `tag`, in document order.
    pub fn all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Aggregate> + 'a {
        self.aggregates()
            .filter(move |(name, _)| *name == tag)
            .map(|(_, agg)| agg)
    }

    fn missing(&self, tag: &str) -> ConversionError {
        ConversionError::missing(&self.tag, tag, &self.path)
    }

    pub fn req_text(&self, tag: &str) -> FieldResult<&str> {
        self.text(tag).ok_or_else(|| self.missing(tag))
    }

    pub fn req_integer(&self, tag: &str) -> FieldResult<i64> {
        self.integer(tag).ok_or_else(|| self.missing(tag))
    }

    pub fn req_decimal(&self, tag: &str) -> FieldResult<Decimal> {
        self.decimal(tag).ok_or_else(|| self.missing(tag))
    }

    pub fn req_datetime(&self, tag: &str) -> FieldResult<&OfxDateTime> {
        self.datetime(tag).ok_or_else(|| self.missing(tag))
    }

    pub fn req_code<C: OfxCode>(&self, tag: &str) -> FieldResult<C> {
        self.code(tag).ok_or_else(|| self.missing(tag))
    }

    pub fn req_aggregate(&self, tag: &str) -> FieldResult<&Aggregate> {
        self.aggregate(tag).ok_or_else(|| self.missing(tag))
    }
}

/// Parse an OFX amount: optional sign, `.` or `,` as decimal separator.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    let text = text.strip_prefix('+').unwrap_or(text);
    if text.contains('_') {
        return None;
    }
    let normalized: Cow<'_, str> = if text.contains(',') && !text.contains('.') {
        Cow::Owned(text.replacen(',', ".", 1))
    } else {
        Cow::Borrowed(text)
    };
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

/// Walks element trees against a [`Registry`], collecting diagnostics.
pub struct Converter<'r> {
    registry: &'r Registry,
    strict: bool,
    warnings: Vec<Warning>,
    errors: Vec<ConversionError>,
}

impl<'r> Converter<'r> {
    pub fn new(registry: &'r Registry, strict: bool) -> Self {
        Self {
            registry,
            strict,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn errors(&self) -> &[ConversionError] {
        &self.errors
    }

    pub fn into_diagnostics(self) -> (Vec<Warning>, Vec<ConversionError>) {
        (self.warnings, self.errors)
    }

    /// Record a failure of one repeated item, or return it in strict mode.
    pub fn isolate(&mut self, err: ConversionError) -> FieldResult<()> {
        if self.strict {
            return Err(err);
        }
        warn!(error = %err, "dropping item that failed conversion");
        self.errors.push(err);
        Ok(())
    }

    /// Convert the aggregate rooted at `id`.
    pub fn convert(&mut self, tree: &ElementTree, id: NodeId) -> FieldResult<Aggregate> {
        let node = tree.node(id);
        let def = self
            .registry
            .lookup(node.tag())
            .ok_or_else(|| ConversionError::UnknownAggregate(node.tag().to_string()))?;
        let path = tree.path(id);
        let mut fields: Vec<(String, FieldValue)> = Vec::with_capacity(node.children().len());

        for (child_id, child) in tree.children(id) {
            let Some(spec) = def.field(child.tag()) else {
                warn!(aggregate = def.tag, element = child.tag(), "skipping unknown element");
                self.warnings.push(Warning::UnknownElement {
                    aggregate: def.tag.to_string(),
                    element: child.tag().to_string(),
                    path: path.clone(),
                });
                continue;
            };

            if spec.kind == FieldKind::Unsupported {
                trace!(element = spec.tag, "skipping unsupported element");
                continue;
            }

            if !spec.is_repeated() && fields.iter().any(|(tag, _)| tag == spec.tag) {
                self.warnings.push(Warning::DuplicateElement {
                    aggregate: def.tag.to_string(),
                    element: spec.tag.to_string(),
                    path: path.clone(),
                });
                continue;
            }

            let value = if spec.kind == FieldKind::Aggregate {
                let converted = match child.text() {
                    Some("") => continue,
                    Some(text) => Err(ConversionError::field_type(
                        def.tag,
                        spec.tag,
                        text,
                        "aggregate",
                        &path,
                    )),
                    None => self.convert(tree, child_id),
                };
                match converted {
                    Ok(agg) => FieldValue::Aggregate(Box::new(agg)),
                    Err(err) if spec.is_repeated() => {
                        self.isolate(err)?;
                        continue;
                    }
                    Err(err) => return Err(err),
                }
            } else {
                match self.coerce_leaf(def, spec, child, &path)? {
                    Some(value) => value,
                    None => continue,
                }
            };
            fields.push((spec.tag.to_string(), value));
        }

        if let Some(spec) = def
            .required_fields()
            .find(|spec| !fields.iter().any(|(tag, _)| tag == spec.tag))
        {
            return Err(ConversionError::missing(def.tag, spec.tag, &path));
        }

        for group in def.exclusive {
            let present: Vec<String> = group
                .iter()
                .filter(|tag| fields.iter().any(|(name, _)| name == *tag))
                .map(|tag| tag.to_string())
                .collect();
            if present.len() > 1 {
                self.warnings.push(Warning::ConflictingElements {
                    aggregate: def.tag.to_string(),
                    elements: present,
                    path: path.clone(),
                });
            }
        }

        Ok(Aggregate {
            tag: def.tag.to_string(),
            path,
            fields,
        })
    }

    /// `None` means the element is present but empty, which counts as absent.
    fn coerce_leaf(
        &mut self,
        def: &AggregateDef,
        spec: &FieldSpec,
        child: &Node,
        path: &str,
    ) -> FieldResult<Option<FieldValue>> {
        let Some(text) = child.text() else {
            return Err(ConversionError::field_type(
                def.tag,
                spec.tag,
                &format!("<{}> aggregate", spec.tag),
                spec.kind.describe(),
                path,
            ));
        };
        if text.is_empty() {
            return Ok(None);
        }
        let invalid = || ConversionError::field_type(def.tag, spec.tag, text, spec.kind.describe(), path);

        let value = match spec.kind {
            FieldKind::Text(max) => {
                if let Some(max) = max {
                    let length = text.chars().count();
                    if length > max {
                        self.warnings.push(Warning::ValueTooLong {
                            field: spec.tag.to_string(),
                            length,
                            max,
                            path: path.to_string(),
                        });
                    }
                }
                FieldValue::Text(text.to_string())
            }
            FieldKind::Integer => {
                let digits = text.strip_prefix('+').unwrap_or(text);
                FieldValue::Integer(digits.parse().map_err(|_| invalid())?)
            }
            FieldKind::Decimal => FieldValue::Decimal(parse_decimal(text).ok_or_else(invalid)?),
            FieldKind::Bool => match text {
                "Y" => FieldValue::Bool(true),
                "N" => FieldValue::Bool(false),
                _ => return Err(invalid()),
            },
            FieldKind::DateTime => {
                FieldValue::DateTime(OfxDateTime::parse(text).map_err(|_| invalid())?)
            }
            FieldKind::Code(codes) => {
                if !codes.contains(&text) {
                    self.warnings.push(Warning::UnknownCode {
                        field: spec.tag.to_string(),
                        value: text.to_string(),
                        path: path.to_string(),
                    });
                }
                FieldValue::Code(text.to_string())
            }
            FieldKind::Aggregate | FieldKind::Unsupported => return Ok(None),
        };
        Ok(Some(value))
    }
}
