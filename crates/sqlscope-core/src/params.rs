//! Host parameter shapes and property-path binding
//!
//! A host hands over its statement parameters in one of a small closed set of
//! shapes: a scalar, an enumeration constant, an indexed sequence, an
//! associative map, or a structured record. Records expose their fields through
//! [`ParamRecord::fields`] instead of runtime reflection.
//!
//! Property paths use the same syntax as mapper templates:
//!
//! - `user.address.city` - nested record or map access
//! - `list[0].name` - indexed access followed by a field
//! - `map.key` - map-keyed access
//!
//! [`BoundStatement::bind`] resolves every parameter mapping of a statement
//! into positional [`Value`]s, preserving type fidelity: UUIDs stay opaque,
//! enumerations bind by name, and a declared [`ParamType`] coerces textual
//! scalars into the right SQL type.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::Value;

/// Top-level aliases a mapper may use to address a sequence parameter
const SEQUENCE_ALIASES: [&str; 3] = ["list", "collection", "array"];

/// Errors that can occur while resolving or binding parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindError {
    /// The property path could not be parsed.
    #[error("invalid property path `{0}`")]
    InvalidPath(String),

    /// A record has no field with the requested name.
    #[error("no property `{property}` on record `{record}`")]
    UnknownProperty { record: String, property: String },

    /// An index was past the end of a sequence.
    #[error("index {index} out of bounds for `{path}` (length {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    /// Indexed access on a value that is neither a sequence nor a map.
    #[error("`{0}` is not indexable")]
    NotIndexable(String),

    /// Field access on a scalar value.
    #[error("`{0}` has no properties")]
    NotNavigable(String),

    /// A mapping resolved to a composite value that cannot be bound.
    #[error("`{0}` resolved to a composite value, expected a scalar")]
    NotScalar(String),
}

/// Result type for parameter binding operations.
pub type BindResult<T> = Result<T, BindError>;

/// Structured parameter types expose their fields through this capability.
pub trait ParamRecord: Send + Sync + fmt::Debug {
    /// Record name used in error messages
    fn type_name(&self) -> &str {
        "record"
    }

    /// All readable fields, in declaration order
    fn fields(&self) -> Vec<(String, ParamValue)>;

    /// Look up a single field
    fn field(&self, name: &str) -> Option<ParamValue> {
        self.fields()
            .into_iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

/// A host parameter value
#[derive(Debug, Clone)]
pub enum ParamValue {
    Null,
    Scalar(Value),
    /// Enumeration constant, bound by name
    Enum(String),
    Sequence(Vec<ParamValue>),
    Map(IndexMap<String, ParamValue>),
    Record(Arc<dyn ParamRecord>),
}

impl ParamValue {
    /// Wrap a record implementation
    pub fn record(record: impl ParamRecord + 'static) -> Self {
        ParamValue::Record(Arc::new(record))
    }

    /// Build a map parameter from `(key, value)` pairs
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        ParamValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// True for values that bind directly (null, scalar, enum)
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            ParamValue::Null | ParamValue::Scalar(_) | ParamValue::Enum(_)
        )
    }

    /// Walk the value depth-first, reporting every node with its path
    pub fn walk<V: ParamVisitor + ?Sized>(&self, visitor: &mut V) {
        self.walk_at("", visitor);
    }

    fn walk_at<V: ParamVisitor + ?Sized>(&self, path: &str, visitor: &mut V) {
        match self {
            ParamValue::Null => visitor.visit_null(path),
            ParamValue::Scalar(value) => visitor.visit_scalar(path, value),
            ParamValue::Enum(name) => visitor.visit_enum(path, name),
            ParamValue::Sequence(items) => {
                visitor.enter_sequence(path, items.len());
                for (index, item) in items.iter().enumerate() {
                    item.walk_at(&format!("{path}[{index}]"), visitor);
                }
            }
            ParamValue::Map(entries) => {
                visitor.enter_map(path, entries.len());
                for (key, value) in entries {
                    value.walk_at(&join_field(path, key), visitor);
                }
            }
            ParamValue::Record(record) => {
                visitor.enter_record(path, record.type_name());
                for (name, value) in record.fields() {
                    value.walk_at(&join_field(path, &name), visitor);
                }
            }
        }
    }

    /// Expand nested sequences, maps and records into `path -> leaf` entries.
    ///
    /// A bare scalar flattens to a single entry with an empty path.
    pub fn flatten(&self) -> IndexMap<String, ParamValue> {
        let mut collector = LeafCollector::default();
        self.walk(&mut collector);
        collector.leaves
    }

    /// Resolve a property path against this value
    pub fn resolve(&self, path: &str) -> BindResult<ParamValue> {
        let segments = parse_path(path)?;
        resolve_segments(self, &segments, path)
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        if value.is_null() {
            ParamValue::Null
        } else {
            ParamValue::Scalar(value)
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Scalar(Value::String(value.to_string()))
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Scalar(Value::String(value))
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Scalar(Value::Int32(value))
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Scalar(Value::Int64(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Scalar(Value::Float64(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Scalar(Value::Bool(value))
    }
}

impl From<Uuid> for ParamValue {
    fn from(value: Uuid) -> Self {
        ParamValue::Scalar(Value::Uuid(value))
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

/// Visitor over the closed set of parameter shapes.
///
/// Leaf callbacks are required; container callbacks default to no-ops.
pub trait ParamVisitor {
    fn visit_null(&mut self, path: &str);

    fn visit_scalar(&mut self, path: &str, value: &Value);

    fn visit_enum(&mut self, path: &str, name: &str);

    fn enter_sequence(&mut self, _path: &str, _len: usize) {}

    fn enter_map(&mut self, _path: &str, _len: usize) {}

    fn enter_record(&mut self, _path: &str, _type_name: &str) {}
}

#[derive(Default)]
struct LeafCollector {
    leaves: IndexMap<String, ParamValue>,
}

impl ParamVisitor for LeafCollector {
    fn visit_null(&mut self, path: &str) {
        self.leaves.insert(path.to_string(), ParamValue::Null);
    }

    fn visit_scalar(&mut self, path: &str, value: &Value) {
        self.leaves
            .insert(path.to_string(), ParamValue::Scalar(value.clone()));
    }

    fn visit_enum(&mut self, path: &str, name: &str) {
        self.leaves
            .insert(path.to_string(), ParamValue::Enum(name.to_string()));
    }
}

fn join_field(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
}

fn parse_path(path: &str) -> BindResult<Vec<Segment>> {
    let invalid = || BindError::InvalidPath(path.to_string());
    if path.trim().is_empty() {
        return Err(invalid());
    }

    let mut segments = Vec::new();
    let mut name = String::new();
    let mut chars = path.chars().peekable();
    // Set after `]` so that `a[0].b` and `a[0][1]` parse but `a[0]b` does not
    let mut after_index = false;

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if name.is_empty() && !after_index {
                    return Err(invalid());
                }
                if !name.is_empty() {
                    segments.push(Segment::Field(std::mem::take(&mut name)));
                }
                after_index = false;
                if chars.peek().is_none() {
                    return Err(invalid());
                }
            }
            '[' => {
                if !name.is_empty() {
                    segments.push(Segment::Field(std::mem::take(&mut name)));
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        _ => return Err(invalid()),
                    }
                }
                let index = digits.parse::<usize>().map_err(|_| invalid())?;
                segments.push(Segment::Index(index));
                after_index = true;
            }
            ']' => return Err(invalid()),
            other => {
                if after_index {
                    return Err(invalid());
                }
                name.push(other);
            }
        }
    }

    if !name.is_empty() {
        segments.push(Segment::Field(name));
    }
    Ok(segments)
}

/// Walk `segments` from `root`, borrowing through maps and sequences.
///
/// Only record fields are materialized along the way; the leaf is cloned
/// once at the end.
fn resolve_segments(root: &ParamValue, segments: &[Segment], path: &str) -> BindResult<ParamValue> {
    let mut current = Cow::Borrowed(root);
    let mut walked = String::new();

    for segment in segments {
        current = match (segment, current) {
            (_, Cow::Borrowed(ParamValue::Null)) | (_, Cow::Owned(ParamValue::Null)) => {
                return Ok(ParamValue::Null);
            }
            (segment, Cow::Borrowed(value)) => step(segment, value, &walked, path)?,
            (segment, Cow::Owned(value)) => {
                Cow::Owned(step(segment, &value, &walked, path)?.into_owned())
            }
        };

        match segment {
            Segment::Field(name) => walked = join_field(&walked, name),
            Segment::Index(index) => walked.push_str(&format!("[{index}]")),
        }
    }

    Ok(current.into_owned())
}

fn step<'a>(
    segment: &Segment,
    value: &'a ParamValue,
    walked: &str,
    path: &str,
) -> BindResult<Cow<'a, ParamValue>> {
    const NULL: &ParamValue = &ParamValue::Null;

    Ok(match (segment, value) {
        (Segment::Field(name), ParamValue::Map(entries)) => {
            Cow::Borrowed(entries.get(name).unwrap_or(NULL))
        }
        (Segment::Field(name), ParamValue::Record(record)) => {
            Cow::Owned(record.field(name).ok_or_else(|| BindError::UnknownProperty {
                record: record.type_name().to_string(),
                property: name.clone(),
            })?)
        }
        (Segment::Index(index), ParamValue::Sequence(items)) => {
            Cow::Borrowed(items.get(*index).ok_or_else(|| BindError::IndexOutOfBounds {
                path: path.to_string(),
                index: *index,
                len: items.len(),
            })?)
        }
        (Segment::Index(index), ParamValue::Map(entries)) => {
            Cow::Borrowed(entries.get(&index.to_string()).unwrap_or(NULL))
        }
        (Segment::Index(_), _) => return Err(BindError::NotIndexable(display_path(walked, path))),
        (Segment::Field(_), _) => return Err(BindError::NotNavigable(display_path(walked, path))),
    })
}

fn display_path(walked: &str, full: &str) -> String {
    if walked.is_empty() {
        full.to_string()
    } else {
        walked.to_string()
    }
}

/// Declared SQL type of a parameter mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Varchar,
    Integer,
    BigInt,
    Double,
    Boolean,
    Uuid,
    Date,
    Timestamp,
    Other,
}

impl ParamType {
    /// Coerce a resolved scalar into this declared type when it parses,
    /// leaving it unchanged otherwise.
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ParamType::Uuid, Value::String(s)) => Uuid::parse_str(&s)
                .map(Value::Uuid)
                .unwrap_or(Value::String(s)),
            (ParamType::Integer, Value::Int64(v)) => i32::try_from(v)
                .map(Value::Int32)
                .unwrap_or(Value::Int64(v)),
            (ParamType::Integer, Value::String(s)) => s
                .trim()
                .parse::<i32>()
                .map(Value::Int32)
                .unwrap_or(Value::String(s)),
            (ParamType::BigInt, Value::Int16(v)) => Value::Int64(v as i64),
            (ParamType::BigInt, Value::Int32(v)) => Value::Int64(v as i64),
            (ParamType::BigInt, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int64)
                .unwrap_or(Value::String(s)),
            (ParamType::Double, Value::Float32(v)) => Value::Float64(v as f64),
            (ParamType::Double, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float64)
                .unwrap_or(Value::String(s)),
            (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => Value::String(s),
            },
            (ParamType::Date, Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(Value::Date)
                .unwrap_or(Value::String(s)),
            (ParamType::Timestamp, Value::String(s)) => parse_timestamp(s.trim())
                .map(Value::DateTime)
                .unwrap_or(Value::String(s)),
            (ParamType::Varchar, Value::Uuid(u)) => Value::String(u.to_string()),
            (_, value) => value,
        }
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// One `?` placeholder of a statement and the property that feeds it
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMapping {
    pub property: String,
    pub param_type: Option<ParamType>,
}

impl ParameterMapping {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            param_type: None,
        }
    }

    pub fn with_type(mut self, param_type: ParamType) -> Self {
        self.param_type = Some(param_type);
        self
    }
}

/// A statement as the host executed it: SQL text with positional
/// placeholders, the mappings feeding them, and the parameter object.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    pub sql: String,
    pub mappings: Vec<ParameterMapping>,
    pub parameter: ParamValue,
    /// Extra named values generated while rendering the statement
    /// (e.g. loop variables), consulted before the parameter object.
    pub additional: IndexMap<String, ParamValue>,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            mappings: Vec::new(),
            parameter: ParamValue::Null,
            additional: IndexMap::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: impl Into<ParamValue>) -> Self {
        self.parameter = parameter.into();
        self
    }

    pub fn with_mapping(mut self, mapping: ParameterMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Add an untyped mapping for `property`
    pub fn with_property(self, property: impl Into<String>) -> Self {
        self.with_mapping(ParameterMapping::new(property))
    }

    pub fn with_additional(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.additional.insert(name.into(), value.into());
        self
    }

    /// Resolve one property path the way the host's templating would.
    pub fn resolve(&self, property: &str) -> BindResult<ParamValue> {
        let segments = parse_path(property)?;

        if let Some(Segment::Field(head)) = segments.first()
            && let Some(value) = self.additional.get(head)
        {
            return resolve_segments(value, &segments[1..], property);
        }

        match &self.parameter {
            // A bare scalar answers to any property name
            leaf if leaf.is_leaf() => Ok(leaf.clone()),
            ParamValue::Sequence(_) => {
                let rest = match segments.first() {
                    Some(Segment::Field(head)) if SEQUENCE_ALIASES.contains(&head.as_str()) => {
                        &segments[1..]
                    }
                    _ => &segments[..],
                };
                resolve_segments(&self.parameter, rest, property)
            }
            other => resolve_segments(other, &segments, property),
        }
    }

    /// Resolve and coerce every mapping into positional values.
    pub fn bind(&self) -> BindResult<Vec<Value>> {
        self.mappings
            .iter()
            .map(|mapping| {
                let value = match self.resolve(&mapping.property)? {
                    ParamValue::Null => Value::Null,
                    ParamValue::Scalar(value) => value,
                    ParamValue::Enum(name) => Value::String(name),
                    other => {
                        tracing::debug!(
                            property = %mapping.property,
                            kind = ?other,
                            "parameter resolved to a composite value"
                        );
                        return Err(BindError::NotScalar(mapping.property.clone()));
                    }
                };
                Ok(match mapping.param_type {
                    Some(param_type) => param_type.coerce(value),
                    None => value,
                })
            })
            .collect()
    }
}
