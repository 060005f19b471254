//! Resource metadata consumed by the query pipeline.
//!
//! Metadata is loaded by an outer layer (attributes, YAML, ...) and handed
//! over as a [`MetadataRegistry`]. Both backend families read the same
//! description:
//! - fields: scalar properties with a coarse type
//! - relations: associations (relational), references (document) and
//!   embedded objects

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{QueryError, QueryResult};

/// Scalar field types known to the filters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    Uuid,
}

impl FieldType {
    /// Whether range comparisons make sense for this type.
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }
}

/// Relation cardinality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

/// How a document reference is persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreAs {
    /// Bare identifier of the target document.
    #[default]
    Id,
    /// `{id: ...}` object.
    Ref,
    /// `{$ref, $id}` database reference.
    DbRef,
    /// `{$ref, $id, $db}` database reference.
    DbRefWithDb,
}

/// A traversable relation from one entity to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    /// Target entity name.
    pub target: String,

    #[serde(default)]
    pub cardinality: Cardinality,

    /// Embedded object stored inline (no join / lookup needed).
    #[serde(default)]
    pub embedded: bool,

    /// Owning-side column holding the target identifier (default `<relation>_id`).
    pub join_column: Option<String>,

    /// Relation on the target that owns this association.
    pub mapped_by: Option<String>,

    /// Inverse side without an owning counterpart on this entity.
    #[serde(default)]
    pub inverse: bool,

    /// Reference storage (document backend only).
    #[serde(default)]
    pub store_as: StoreAs,
}

impl Relation {
    pub fn to_one(target: &str) -> Self {
        Self {
            target: target.to_string(),
            cardinality: Cardinality::One,
            embedded: false,
            join_column: None,
            mapped_by: None,
            inverse: false,
            store_as: StoreAs::Id,
        }
    }

    pub fn to_many(target: &str, mapped_by: &str) -> Self {
        Self {
            cardinality: Cardinality::Many,
            mapped_by: Some(mapped_by.to_string()),
            inverse: true,
            ..Self::to_one(target)
        }
    }

    pub fn embedded(target: &str) -> Self {
        Self {
            embedded: true,
            ..Self::to_one(target)
        }
    }

    pub fn with_join_column(mut self, column: &str) -> Self {
        self.join_column = Some(column.to_string());
        self
    }

    pub fn with_store_as(mut self, store_as: StoreAs) -> Self {
        self.store_as = store_as;
        self
    }

    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    pub fn is_owning_side(&self) -> bool {
        !self.inverse && self.mapped_by.is_none()
    }

    /// Column on the owning entity referencing the target.
    pub fn local_column(&self, relation_name: &str) -> String {
        self.join_column
            .clone()
            .unwrap_or_else(|| format!("{relation_name}_id"))
    }
}

/// Mapping of one entity (table or collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity / resource name (e.g. "Book").
    pub name: String,

    /// Table or collection name; defaults to the lowercased entity name.
    pub source: Option<String>,

    #[serde(default = "default_identifiers")]
    pub identifiers: Vec<String>,

    #[serde(default)]
    pub fields: BTreeMap<String, FieldType>,

    #[serde(default)]
    pub relations: BTreeMap<String, Relation>,
}

fn default_identifiers() -> Vec<String> {
    vec!["id".to_string()]
}

impl EntityMetadata {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: None,
            identifiers: default_identifiers(),
            fields: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn with_identifiers(mut self, identifiers: &[&str]) -> Self {
        self.identifiers = identifiers.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.insert(name.to_string(), field_type);
        self
    }

    pub fn with_relation(mut self, name: &str, relation: Relation) -> Self {
        self.relations.insert(name.to_string(), relation);
        self
    }

    /// Table or collection backing this entity.
    pub fn source(&self) -> String {
        self.source
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }

    /// First identifier; composite identifiers are reported by the query checker.
    pub fn identifier(&self) -> &str {
        self.identifiers.first().map(String::as_str).unwrap_or("id")
    }

    pub fn has_composite_identifier(&self) -> bool {
        self.identifiers.len() > 1
    }

    /// Identifiers count as fields even when not listed explicitly.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.identifiers.iter().any(|i| i == name)
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        match self.fields.get(name) {
            Some(t) => Some(*t),
            None if self.identifiers.iter().any(|i| i == name) => Some(FieldType::Integer),
            None => None,
        }
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Association, reference or embedded object.
    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn is_embedded(&self, name: &str) -> bool {
        self.relations.get(name).is_some_and(|r| r.embedded)
    }
}

/// Registry of entity metadata, keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: HashMap<String, EntityMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity, replacing any previous mapping with the same name.
    pub fn register(&mut self, entity: EntityMetadata) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn get(&self, name: &str) -> Option<&EntityMetadata> {
        self.entities.get(name)
    }

    /// Look up an entity that must exist.
    pub fn require(&self, name: &str) -> QueryResult<&EntityMetadata> {
        self.get(name)
            .ok_or_else(|| QueryError::ResourceNotFound(name.to_string()))
    }

    /// Target metadata of `relation` on `entity`.
    pub fn relation_target(&self, entity: &EntityMetadata, relation: &str) -> Option<&EntityMetadata> {
        entity.relation(relation).and_then(|r| self.get(&r.target))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<EntityMetadata> for MetadataRegistry {
    fn from_iter<I: IntoIterator<Item = EntityMetadata>>(iter: I) -> Self {
        let mut registry = Self::new();
        for entity in iter {
            registry.register(entity);
        }
        registry
    }
}
