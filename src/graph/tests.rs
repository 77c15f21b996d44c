use super::*;
use serde_json::json;

fn make_vertex() -> Vertex {
    Vertex::new("app_1", "Application #1", "mySortOfApp", "example:https://example.com")
        .with_type("app")
        .with_property("appType", "Web")
}

#[test]
fn test_vertex_serializes_with_wire_names() {
    let value = serde_json::to_value(make_vertex()).unwrap();
    assert_eq!(
        value,
        json!({
            "sourceId": "app_1",
            "name": "Application #1",
            "sourceType": "mySortOfApp",
            "sourceName": "example:https://example.com",
            "type": "app",
            "appType": "Web"
        })
    );
}

#[test]
fn test_vertex_without_type_omits_field() {
    let vertex = Vertex::new("b_1", "Building", "myBuildingType", "example");
    let value = serde_json::to_value(vertex).unwrap();
    assert!(value.get("type").is_none());
}

#[test]
fn test_edge_serializes_with_wire_names() {
    let edge = Edge::new("monitors", "app_3", "building_0");
    let value = serde_json::to_value(edge).unwrap();
    assert_eq!(value, json!({"outV": "app_3", "inV": "building_0", "label": "monitors"}));
}

#[test]
fn test_vertex_deserializes_extra_properties() {
    let vertex: Vertex = serde_json::from_value(json!({
        "sourceId": "h1",
        "name": "host one",
        "sourceType": "host",
        "sourceName": "inventory",
        "os": "linux"
    }))
    .unwrap();
    assert_eq!(vertex.vertex_type, None);
    assert_eq!(vertex.properties["os"], "linux");
}

#[test]
fn test_valid_payload_passes_validation() {
    let payload = ImportPayload {
        vertices: vec![make_vertex()],
        edges: vec![Edge::new("monitors", "app_1", "building_0")],
    };
    assert!(payload.validate().is_ok());
}

#[test]
fn test_empty_payload_is_valid() {
    let payload = ImportPayload::default();
    assert!(payload.is_empty());
    assert!(payload.validate().is_ok());
}

#[test]
fn test_missing_vertex_name_fails() {
    let mut vertex = make_vertex();
    vertex.name.clear();
    let err = validate_payload(&[make_vertex(), vertex], &[]).unwrap_err();
    assert_eq!(
        err,
        PayloadValidationError::MissingVertexField { index: 1, field: "name" }
    );
}

#[test]
fn test_reserved_vertex_property_fails() {
    let vertex = make_vertex().with_property("__tenantId", "t1");
    let err = validate_payload(&[vertex], &[]).unwrap_err();
    assert_eq!(
        err,
        PayloadValidationError::ReservedVertexKey { index: 0, key: "__tenantId".to_string() }
    );
}

#[test]
fn test_reserved_edge_label_fails() {
    let edges = vec![Edge::new(RESERVED_EDGE_LABEL, "a", "b")];
    let err = validate_payload(&[], &edges).unwrap_err();
    assert_eq!(err, PayloadValidationError::ReservedEdgeLabel { index: 0 });
    assert_eq!(err.to_string(), "edge 0 uses reserved label 'is'");
}

#[test]
fn test_missing_edge_endpoint_fails() {
    let edges = vec![Edge::new("monitors", "a", "")];
    let err = validate_payload(&[], &edges).unwrap_err();
    assert_eq!(err, PayloadValidationError::MissingEdgeField { index: 0, field: "inV" });
}

#[test]
fn test_reserved_edge_property_fails() {
    let mut edge = Edge::new("monitors", "a", "b");
    edge.properties.insert("id".to_string(), json!("e1"));
    let err = validate_payload(&[], &[edge]).unwrap_err();
    assert_eq!(err, PayloadValidationError::ReservedEdgeKey { index: 0, key: "id".to_string() });
}

#[test]
fn test_vertex_property_shadowing_field_fails() {
    let vertex = make_vertex().with_property("type", "host");
    let err = validate_payload(&[vertex], &[]).unwrap_err();
    assert_eq!(
        err,
        PayloadValidationError::VertexFieldShadowed { index: 0, key: "type".to_string() }
    );

    let vertex = make_vertex().with_property("sourceId", "other");
    assert!(validate_payload(&[vertex], &[]).is_err());
}

#[test]
fn test_edge_property_shadowing_field_fails() {
    let mut edge = Edge::new("monitors", "a", "b");
    edge.properties.insert("outV".to_string(), json!("c"));
    let err = validate_payload(&[], &[edge]).unwrap_err();
    assert_eq!(
        err,
        PayloadValidationError::EdgeFieldShadowed { index: 0, key: "outV".to_string() }
    );
    assert_eq!(err.to_string(), "edge 0 has property 'outV' that shadows an edge field");
}

#[test]
fn test_extend_preserves_order() {
    let mut combined = ImportPayload {
        vertices: vec![Vertex::new("1", "one", "t", "s")],
        edges: vec![],
    };
    combined.extend(ImportPayload {
        vertices: vec![Vertex::new("2", "two", "t", "s")],
        edges: vec![Edge::new("l", "1", "2")],
    });
    let ids: Vec<_> = combined.vertices.iter().map(|v| v.source_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(combined.edges.len(), 1);
}
