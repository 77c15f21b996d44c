use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod validation;
#[cfg(test)]
mod tests;

pub use validation::{validate_payload, PayloadValidationError, RESERVED_EDGE_LABEL};

/// A graph node produced by an import.
///
/// The four identity fields are required by the platform. Anything else a
/// plugin wants to attach (e.g. `appType`) goes into `properties` and is
/// flattened into the JSON object on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vertex {
    /// Identifier of the object in the source system
    pub source_id: String,

    /// Display name
    pub name: String,

    /// Source-specific type of the object (e.g. "myBuildingType")
    pub source_type: String,

    /// Identifies the plugin instance that produced the vertex
    pub source_name: String,

    /// Platform type (e.g. "app", "host")
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertex_type: Option<String>,

    /// Additional plugin-defined properties
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Vertex {
    pub fn new(
        source_id: impl Into<String>,
        name: impl Into<String>,
        source_type: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            name: name.into(),
            source_type: source_type.into(),
            source_name: source_name.into(),
            vertex_type: None,
            properties: Map::new(),
        }
    }

    pub fn with_type(mut self, vertex_type: impl Into<String>) -> Self {
        self.vertex_type = Some(vertex_type.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A directed relationship between two vertices, referenced by `sourceId`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "outV")]
    pub out_v: String,

    #[serde(rename = "inV")]
    pub in_v: String,

    /// Relationship label; must not be the reserved value "is"
    pub label: String,

    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Edge {
    pub fn new(
        label: impl Into<String>,
        out_v: impl Into<String>,
        in_v: impl Into<String>,
    ) -> Self {
        Self {
            out_v: out_v.into(),
            in_v: in_v.into(),
            label: label.into(),
            properties: Map::new(),
        }
    }
}

/// Vertices and edges accumulated across one or more import ticks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPayload {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl ImportPayload {
    /// Appends another payload's contents, preserving order.
    pub fn extend(&mut self, other: ImportPayload) {
        self.vertices.extend(other.vertices);
        self.edges.extend(other.edges);
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }

    /// Checks the payload against the platform's payload contract.
    pub fn validate(&self) -> Result<(), PayloadValidationError> {
        validate_payload(&self.vertices, &self.edges)
    }
}
