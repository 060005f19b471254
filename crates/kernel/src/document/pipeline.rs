//! Aggregation pipeline for document collections.
//!
//! Stages are kept typed until rendering so extensions can look for earlier
//! `$sort` or `$lookup` stages by index.

use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::error::QueryResult;
use crate::metadata::{EntityMetadata, MetadataRegistry};
use crate::operation::SortDirection;

/// Field stamped with the page offset after the `$facet` stage.
pub const FIRST_RESULT_FIELD: &str = "__api_first_result__";
/// Field stamped with the page size after the `$facet` stage.
pub const MAX_RESULTS_FIELD: &str = "__api_max_results__";
/// A field no document carries; matching on it yields an empty page.
pub const LIMIT_ZERO_MARKER_FIELD: &str = "__api_limit_zero_marker__";
pub const LIMIT_ZERO_MARKER: &str = "limit0";

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Map<String, Value>),
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
    /// Flattens a lookup array; `preserve_empty` keeps documents with no match.
    Unwind {
        path: String,
        preserve_empty: bool,
    },
    Sort(Vec<(String, SortDirection)>),
    Skip(u64),
    Limit(u64),
    Count(String),
    Facet(Vec<(String, Vec<Stage>)>),
    AddFields(Map<String, Value>),
}

impl Stage {
    pub fn is_sort(&self) -> bool {
        matches!(self, Stage::Sort(_))
    }

    pub fn to_document(&self) -> Value {
        match self {
            Stage::Match(filter) => json!({ "$match": filter }),
            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => json!({
                "$lookup": {
                    "from": from,
                    "localField": local_field,
                    "foreignField": foreign_field,
                    "as": as_field,
                }
            }),
            Stage::Unwind {
                path,
                preserve_empty: false,
            } => json!({ "$unwind": path }),
            Stage::Unwind {
                path,
                preserve_empty: true,
            } => json!({ "$unwind": { "path": path, "preserveNullAndEmptyArrays": true } }),
            Stage::Sort(fields) => {
                let sort: Map<String, Value> = fields
                    .iter()
                    .map(|(field, direction)| {
                        let order = match direction {
                            SortDirection::Asc => 1,
                            SortDirection::Desc => -1,
                        };
                        (field.clone(), Value::from(order))
                    })
                    .collect();
                json!({ "$sort": sort })
            }
            Stage::Skip(n) => json!({ "$skip": n }),
            Stage::Limit(n) => json!({ "$limit": n }),
            Stage::Count(field) => json!({ "$count": field }),
            Stage::Facet(facets) => {
                let facet: Map<String, Value> = facets
                    .iter()
                    .map(|(name, stages)| {
                        (
                            name.clone(),
                            Value::Array(stages.iter().map(Stage::to_document).collect()),
                        )
                    })
                    .collect();
                json!({ "$facet": facet })
            }
            Stage::AddFields(fields) => json!({ "$addFields": fields }),
        }
    }
}

/// Mutable aggregation for one collection request.
#[derive(Debug, Clone)]
pub struct Pipeline {
    metadata: Arc<MetadataRegistry>,
    resource: String,
    collection: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(metadata: Arc<MetadataRegistry>, resource: &str) -> QueryResult<Self> {
        let collection = metadata.require(resource)?.source();
        Ok(Self {
            metadata,
            resource: resource.to_string(),
            collection,
            stages: Vec::new(),
        })
    }

    pub fn metadata(&self) -> &MetadataRegistry {
        &self.metadata
    }

    pub fn registry(&self) -> Arc<MetadataRegistry> {
        Arc::clone(&self.metadata)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Stage at `index`; `None` past the end.
    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    /// `{$match: {path: condition}}`.
    pub fn add_match(&mut self, path: &str, condition: Value) {
        let mut filter = Map::new();
        filter.insert(path.to_string(), condition);
        self.stages.push(Stage::Match(filter));
    }

    pub fn has_lookup(&self, as_field: &str) -> bool {
        self.stages
            .iter()
            .any(|stage| matches!(stage, Stage::Lookup { as_field: a, .. } if a == as_field))
    }

    /// Replace the sort stage with `fields`, or append one.
    pub fn set_sort(&mut self, fields: &[(String, SortDirection)]) {
        let sort = Stage::Sort(fields.to_vec());
        match self.stages.iter_mut().find(|stage| stage.is_sort()) {
            Some(existing) => *existing = sort,
            None => self.stages.push(sort),
        }
    }

    pub fn to_documents(&self) -> Vec<Value> {
        self.stages.iter().map(Stage::to_document).collect()
    }
}

/// Stored name of `field` on `entity`: identifiers live in `_id`.
pub fn document_field(entity: &EntityMetadata, field: &str) -> String {
    if field == entity.identifier() {
        "_id".to_string()
    } else {
        field.to_string()
    }
}
