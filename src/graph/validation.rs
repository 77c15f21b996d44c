use super::{Edge, Vertex};
use thiserror::Error;

/// Edge label the platform reserves for its own type relationships.
pub const RESERVED_EDGE_LABEL: &str = "is";

/// Keys the platform stamps onto vertices itself.
const RESERVED_VERTEX_KEYS: &[&str] = &[
    "id",
    "__endpoint",
    "__search",
    "__partitionKey",
    "__tenantId",
    "__configId",
    "__ruleId",
    "__canonicalType",
    "__timestamp",
];

/// Keys the platform stamps onto edges itself.
const RESERVED_EDGE_KEYS: &[&str] = &[
    "id",
    "__partitionKey",
    "__tenantId",
    "__configId",
    "__ruleId",
    "__timestamp",
];

/// Wire names of the named `Vertex` fields; a property may not reuse them.
const VERTEX_FIELD_NAMES: &[&str] = &["sourceId", "name", "sourceType", "sourceName", "type"];

/// Wire names of the named `Edge` fields.
const EDGE_FIELD_NAMES: &[&str] = &["outV", "inV", "label"];

/// Payload contract violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadValidationError {
    #[error("vertex {index} is missing required field '{field}'")]
    MissingVertexField { index: usize, field: &'static str },

    #[error("vertex {index} uses reserved property '{key}'")]
    ReservedVertexKey { index: usize, key: String },

    #[error("vertex {index} has property '{key}' that shadows a vertex field")]
    VertexFieldShadowed { index: usize, key: String },

    #[error("edge {index} is missing required field '{field}'")]
    MissingEdgeField { index: usize, field: &'static str },

    #[error("edge {index} uses reserved label 'is'")]
    ReservedEdgeLabel { index: usize },

    #[error("edge {index} uses reserved property '{key}'")]
    ReservedEdgeKey { index: usize, key: String },

    #[error("edge {index} has property '{key}' that shadows an edge field")]
    EdgeFieldShadowed { index: usize, key: String },
}

/// Validates vertices and edges against the payload contract.
///
/// Rules:
/// - Vertices: `sourceId`, `name`, `sourceType`, `sourceName` non-empty
/// - Edges: `outV`, `inV`, `label` non-empty, label is not "is"
/// - Neither may carry platform-reserved properties, or properties named
///   like one of their own fields (they would appear twice on the wire)
pub fn validate_payload(vertices: &[Vertex], edges: &[Edge]) -> Result<(), PayloadValidationError> {
    for (index, vertex) in vertices.iter().enumerate() {
        validate_vertex(index, vertex)?;
    }
    for (index, edge) in edges.iter().enumerate() {
        validate_edge(index, edge)?;
    }
    Ok(())
}

fn validate_vertex(index: usize, vertex: &Vertex) -> Result<(), PayloadValidationError> {
    let required = [
        ("sourceId", &vertex.source_id),
        ("name", &vertex.name),
        ("sourceType", &vertex.source_type),
        ("sourceName", &vertex.source_name),
    ];
    if let Some(&(field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
        return Err(PayloadValidationError::MissingVertexField { index, field });
    }

    if let Some(key) = first_reserved_key(vertex.properties.keys(), RESERVED_VERTEX_KEYS) {
        return Err(PayloadValidationError::ReservedVertexKey { index, key });
    }

    if let Some(key) = first_reserved_key(vertex.properties.keys(), VERTEX_FIELD_NAMES) {
        return Err(PayloadValidationError::VertexFieldShadowed { index, key });
    }

    Ok(())
}

fn validate_edge(index: usize, edge: &Edge) -> Result<(), PayloadValidationError> {
    let required = [("outV", &edge.out_v), ("inV", &edge.in_v), ("label", &edge.label)];
    if let Some(&(field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
        return Err(PayloadValidationError::MissingEdgeField { index, field });
    }

    if edge.label == RESERVED_EDGE_LABEL {
        return Err(PayloadValidationError::ReservedEdgeLabel { index });
    }

    if let Some(key) = first_reserved_key(edge.properties.keys(), RESERVED_EDGE_KEYS) {
        return Err(PayloadValidationError::ReservedEdgeKey { index, key });
    }

    if let Some(key) = first_reserved_key(edge.properties.keys(), EDGE_FIELD_NAMES) {
        return Err(PayloadValidationError::EdgeFieldShadowed { index, key });
    }

    Ok(())
}

fn first_reserved_key<'a>(
    mut keys: impl Iterator<Item = &'a String>,
    reserved: &[&str],
) -> Option<String> {
    keys.find(|key| reserved.contains(&key.as_str())).cloned()
}
