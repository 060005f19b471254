//! Resolved collection operation handed to the query pipeline.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction '{other}'")),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SortDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// One `(property, direction)` pair of a default order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEntry {
    pub property: String,
    pub direction: SortDirection,
}

/// Ordered default sort declared on an operation.
///
/// Accepts a mapping `{title: ASC, "author.name": DESC}`, a bare list
/// `[title, id]`, or a mapping with positional keys `{0: title}`; bare and
/// positional entries sort ascending. Declaration order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultOrder(Vec<OrderEntry>);

impl DefaultOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, property: &str, direction: SortDirection) -> Self {
        self.0.push(OrderEntry {
            property: property.to_string(),
            direction,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderEntry> {
        self.0.iter()
    }
}

impl Serialize for DefaultOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.property, &entry.direction)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OrderKey {
    Index(u64),
    Name(String),
}

struct DefaultOrderVisitor;

impl<'de> Visitor<'de> for DefaultOrderVisitor {
    type Value = DefaultOrder;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a property list or a property => direction mapping")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut order = DefaultOrder::new();
        while let Some(property) = seq.next_element::<String>()? {
            order = order.then(&property, SortDirection::Asc);
        }
        Ok(order)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut order = DefaultOrder::new();
        while let Some(key) = map.next_key::<OrderKey>()? {
            let value: String = map.next_value()?;
            let positional = match &key {
                OrderKey::Index(_) => true,
                OrderKey::Name(name) => name.parse::<u64>().is_ok(),
            };
            if positional {
                order = order.then(&value, SortDirection::Asc);
            } else if let OrderKey::Name(property) = key {
                let direction = value.parse().map_err(de::Error::custom)?;
                order = order.then(&property, direction);
            }
        }
        Ok(order)
    }
}

impl<'de> Deserialize<'de> for DefaultOrder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DefaultOrderVisitor)
    }
}

/// Pagination settings declared on an operation. Unset values fall back to
/// the global [`PaginationOptions`](crate::pagination::PaginationOptions).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationPagination {
    pub enabled: Option<bool>,
    pub client_enabled: Option<bool>,
    pub items_per_page: Option<i64>,
    pub client_items_per_page: Option<bool>,
    pub maximum_items_per_page: Option<i64>,
    pub partial: Option<bool>,
    pub client_partial: Option<bool>,
    /// Force (or forbid) DISTINCT root handling for to-many joins.
    pub fetch_join_collection: Option<bool>,
    /// Force (or forbid) selecting ORDER BY expressions alongside DISTINCT.
    pub use_output_walkers: Option<bool>,
}

/// A resolved collection operation. Immutable for the duration of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Resource (entity) name.
    pub resource: String,

    #[serde(default = "default_operation_name")]
    pub name: String,

    /// Declared filter identifiers, applied in order.
    #[serde(default)]
    pub filters: Vec<String>,

    #[serde(default)]
    pub order: DefaultOrder,

    #[serde(default)]
    pub pagination: OperationPagination,
}

fn default_operation_name() -> String {
    "get_collection".to_string()
}

impl Operation {
    /// Create a collection operation for `resource` with no filters or order.
    pub fn collection(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            name: default_operation_name(),
            filters: Vec::new(),
            order: DefaultOrder::new(),
            pagination: OperationPagination::default(),
        }
    }

    pub fn with_filters(mut self, filters: &[&str]) -> Self {
        self.filters = filters.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_order(mut self, order: DefaultOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_pagination(mut self, pagination: OperationPagination) -> Self {
        self.pagination = pagination;
        self
    }
}
