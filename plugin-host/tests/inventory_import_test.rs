//! Full inventory imports against a mock REST server.

use mockito::{Matcher, Server};
use plugin_host::plugins::InventoryPlugin;
use plugin_host::{import_objects, run_to_completion, ImportCursor, ImportEvent, LoggingHost, Report};
use pluginkit::PluginConfig;
use serde_json::json;

fn config(url: &str) -> PluginConfig {
    PluginConfig::from_value(json!({
        "serverUrl": url,
        "apiKey": "k1",
        "testSettings": { "apiLimits": { "hosts": 2 } }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_inventory_import_runs_to_completion() {
    let mut server = Server::new_async().await;
    let _hosts_1 = server
        .mock("GET", "/api/hosts?offset=0&limit=2")
        .match_header("authorization", "Bearer k1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{ "items": [ { "id": "h1", "name": "web-01" }, { "id": "h2", "name": "web-02" } ], "total": 3 }"#)
        .create_async()
        .await;
    let _hosts_2 = server
        .mock("GET", "/api/hosts?offset=2&limit=2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{ "items": [ { "id": "h3", "name": "db-01" } ], "total": 3 }"#)
        .create_async()
        .await;
    let _services_1 = server
        .mock("GET", "/api/services?limit=100")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{ "items": [ { "id": "s1", "name": "nginx", "hostId": "h1" } ], "nextToken": "t2" }"#)
        .create_async()
        .await;
    let _services_2 = server
        .mock("GET", "/api/services?limit=100&nextToken=t2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{ "items": [ { "id": "s2", "name": "postgres", "hostId": "h3" } ] }"#)
        .create_async()
        .await;

    let host = LoggingHost::new();
    let completed = run_to_completion(&InventoryPlugin::new(), &config(&server.url()), &host, 10)
        .await
        .unwrap();

    assert_eq!(completed.ticks.len(), 1);
    assert_eq!(completed.payload.vertices.len(), 5);
    assert_eq!(completed.payload.edges.len(), 2);
    assert_eq!(
        completed.payload.vertices[0].source_name,
        format!("inventory:{}", server.url())
    );
    assert!(host.reports().is_empty());
}

#[tokio::test]
async fn test_rejected_key_reports_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", Matcher::Regex(r"^/api/hosts".to_string()))
        .with_status(401)
        .create_async()
        .await;

    let host = LoggingHost::new();
    let event = ImportEvent::new(config(&server.url()), ImportCursor::new());
    let err = import_objects(&InventoryPlugin::new(), event, &host)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("access key details are invalid"));
    assert_eq!(
        host.reports(),
        vec![Report::Error("The configured access key details are invalid".to_string())]
    );
}

#[tokio::test]
async fn test_forbidden_services_keep_position() {
    let mut server = Server::new_async().await;
    let _hosts = server
        .mock("GET", "/api/hosts?offset=0&limit=2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{ "items": [], "total": 0 }"#)
        .create_async()
        .await;
    let _services = server
        .mock("GET", "/api/services?limit=100")
        .with_status(403)
        .create_async()
        .await;

    let host = LoggingHost::new();
    let event = ImportEvent::new(config(&server.url()), ImportCursor::new());
    let result = import_objects(&InventoryPlugin::new(), event, &host)
        .await
        .unwrap();

    assert!(!result.is_complete());
    assert_eq!(result.paging_context.stage_index(), Some(1));
    assert!(host.reports().is_empty());
}
