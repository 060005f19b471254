//! Dotted property path resolution against entity metadata.

use crate::metadata::{EntityMetadata, FieldType, MetadataRegistry};

/// A dotted property split into relation segments and a trailing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    /// Relations traversed from the root entity, in order.
    pub associations: Vec<String>,
    /// Leaf field (may still contain dots when it is not a relation path).
    pub field: String,
}

impl PropertyPath {
    pub fn is_nested(&self) -> bool {
        !self.associations.is_empty()
    }
}

/// Split `path` into relation segments and a field.
///
/// Segments are consumed while they name a relation on the entity reached so
/// far; the first other segment starts the field. A path made only of
/// relations gives up its last segment as the field. Returns `None` when the
/// resource is unknown so callers can skip the property.
pub fn split_property(
    registry: &MetadataRegistry,
    resource: &str,
    path: &str,
) -> Option<PropertyPath> {
    let mut metadata = registry.get(resource)?;
    let parts: Vec<&str> = path.split('.').collect();
    let mut slice = 0;

    for part in &parts {
        match registry.relation_target(metadata, part) {
            Some(target) => {
                metadata = target;
                slice += 1;
            }
            None => break,
        }
    }

    if slice == parts.len() {
        slice -= 1;
    }

    Some(PropertyPath {
        associations: parts[..slice].iter().map(|s| s.to_string()).collect(),
        field: parts[slice..].join("."),
    })
}

/// Metadata of the entity reached by walking `associations` from `resource`.
pub fn nested_metadata<'r>(
    registry: &'r MetadataRegistry,
    resource: &str,
    associations: &[String],
) -> Option<&'r EntityMetadata> {
    let mut metadata = registry.get(resource)?;
    for association in associations {
        metadata = registry.relation_target(metadata, association)?;
    }
    Some(metadata)
}

/// Whether the first segment of a dotted path is a relation.
pub fn is_property_nested(registry: &MetadataRegistry, resource: &str, path: &str) -> bool {
    let Some((head, _)) = path.split_once('.') else {
        return false;
    };
    registry
        .get(resource)
        .is_some_and(|metadata| metadata.has_relation(head))
}

/// Whether the first segment of a dotted path is an embedded object.
pub fn is_property_embedded(registry: &MetadataRegistry, resource: &str, path: &str) -> bool {
    let Some((head, _)) = path.split_once('.') else {
        return false;
    };
    registry
        .get(resource)
        .is_some_and(|metadata| metadata.is_embedded(head))
}

/// Whether `path` resolves to a field (or a relation when `allow_association`).
pub fn is_property_mapped(
    registry: &MetadataRegistry,
    resource: &str,
    path: &str,
    allow_association: bool,
) -> bool {
    let Some(parts) = split_property(registry, resource, path) else {
        return false;
    };
    let Some(metadata) = nested_metadata(registry, resource, &parts.associations) else {
        return false;
    };
    metadata.has_field(&parts.field) || (allow_association && metadata.has_relation(&parts.field))
}

/// Type of the field a property path resolves to.
pub fn field_type(registry: &MetadataRegistry, resource: &str, path: &str) -> Option<FieldType> {
    let parts = split_property(registry, resource, path)?;
    nested_metadata(registry, resource, &parts.associations)?.field_type(&parts.field)
}
