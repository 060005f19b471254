//! Request-value parsing shared by the relational and document filters.

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;

use crate::metadata::{FieldType, MetadataRegistry};
use crate::property;

/// Properties a filter is enabled for, each with an optional setting
/// (search strategy, default direction, ...). `None` means every mapped,
/// non-nested property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterProperties(Option<Vec<(String, Option<String>)>>);

impl FilterProperties {
    pub fn all() -> Self {
        Self(None)
    }

    pub fn only(properties: &[&str]) -> Self {
        Self(Some(properties.iter().map(|p| (p.to_string(), None)).collect()))
    }

    /// Add (or enable) a property with a setting.
    pub fn with(mut self, property: &str, setting: &str) -> Self {
        let entries = self.0.get_or_insert_with(Vec::new);
        entries.retain(|(p, _)| p != property);
        entries.push((property.to_string(), Some(setting.to_string())));
        self
    }

    pub fn is_whitelist(&self) -> bool {
        self.0.is_some()
    }

    /// Whether `property` may be filtered on `resource`.
    pub fn is_enabled(&self, registry: &MetadataRegistry, resource: &str, property: &str) -> bool {
        match &self.0 {
            None => !property::is_property_nested(registry, resource, property),
            Some(entries) => entries.iter().any(|(p, _)| p == property),
        }
    }

    pub fn setting(&self, property: &str) -> Option<&str> {
        self.0
            .as_ref()?
            .iter()
            .find(|(p, _)| p == property)
            .and_then(|(_, setting)| setting.as_deref())
    }
}

impl Serialize for FilterProperties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            None => serializer.serialize_none(),
            Some(entries) => serializer.collect_map(entries.iter().map(|(p, s)| (p, s))),
        }
    }
}

struct PropertiesVisitor;

impl<'de> Visitor<'de> for PropertiesVisitor {
    type Value = FilterProperties;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a property list or a property => setting mapping")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(FilterProperties::all())
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(FilterProperties::all())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        while let Some(property) = seq.next_element::<String>()? {
            entries.push((property, None));
        }
        Ok(FilterProperties(Some(entries)))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        while let Some((property, setting)) = map.next_entry::<String, Option<String>>()? {
            entries.push((property, setting));
        }
        Ok(FilterProperties(Some(entries)))
    }
}

impl<'de> Deserialize<'de> for FilterProperties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PropertiesVisitor)
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

/// Scalar request values as strings; arrays are flattened one level.
pub fn scalar_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_array() && !v.is_object())
            .flat_map(scalar_values)
            .collect(),
        Value::Null | Value::Object(_) => Vec::new(),
    }
}

/// Identifier from an IRI-like value (`/books/12` gives `12`).
pub fn extract_identifier(value: &str) -> String {
    if !value.contains('/') {
        return value.to_string();
    }
    value
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(value)
        .to_string()
}

/// `true`/`1` and `false`/`0`; anything else is not a boolean.
pub fn parse_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Number::from(i));
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Convert a request string into a JSON value of the field's type.
pub fn typed_value(field_type: Option<FieldType>, raw: &str) -> Option<Value> {
    match field_type {
        Some(FieldType::Integer) => raw.trim().parse::<i64>().ok().map(Value::from),
        Some(FieldType::Float) => parse_number(raw).map(Value::Number),
        Some(FieldType::Boolean) => parse_boolean(&Value::String(raw.to_string())).map(Value::Bool),
        _ => Some(Value::String(raw.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Search strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Exact,
    Partial,
    Start,
    End,
    WordStart,
}

/// A strategy plus case sensitivity (`i` prefix, e.g. `ipartial`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMode {
    pub strategy: SearchStrategy,
    pub case_insensitive: bool,
}

impl Default for SearchMode {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::Exact,
            case_insensitive: false,
        }
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (case_insensitive, name) = match lower.strip_prefix('i') {
            Some(rest) if !rest.is_empty() => (true, rest),
            _ => (false, lower.as_str()),
        };
        let strategy = match name {
            "exact" => SearchStrategy::Exact,
            "partial" => SearchStrategy::Partial,
            "start" => SearchStrategy::Start,
            "end" => SearchStrategy::End,
            "word_start" => SearchStrategy::WordStart,
            other => return Err(format!("unknown search strategy '{other}'")),
        };
        Ok(Self {
            strategy,
            case_insensitive,
        })
    }
}

// ---------------------------------------------------------------------------
// Range conditions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOperator {
    Lt,
    Lte,
    Gt,
    Gte,
    Between,
}

impl FromStr for RangeOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lt" => Ok(RangeOperator::Lt),
            "lte" => Ok(RangeOperator::Lte),
            "gt" => Ok(RangeOperator::Gt),
            "gte" => Ok(RangeOperator::Gte),
            "between" => Ok(RangeOperator::Between),
            other => Err(format!("unknown range operator '{other}'")),
        }
    }
}

/// A validated numeric range restriction.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeCondition {
    Compare(RangeOperator, Number),
    Between(Number, Number),
    Equal(Number),
}

impl RangeCondition {
    /// Parse `raw` for `operator`; `None` when the bound is not numeric.
    pub fn parse(operator: RangeOperator, raw: &str) -> Option<Self> {
        if operator != RangeOperator::Between {
            return parse_number(raw).map(|n| RangeCondition::Compare(operator, n));
        }
        let (low, high) = raw.split_once("..")?;
        let (low, high) = (parse_number(low)?, parse_number(high)?);
        if low == high {
            return Some(RangeCondition::Equal(low));
        }
        Some(RangeCondition::Between(low, high))
    }
}
