//! Generic paged REST inventory: hosts (offset paging) and the services
//! running on them (token paging).

pub mod api;

use crate::config_check::TestConfigResult;
use crate::host::HostApi;
use crate::plugin::Plugin;
use crate::problem::{ProblemClass, ProblemTable, StageError};
use crate::stage::{Stage, StageContext};
use anyhow::Result;
use async_trait::async_trait;
use pluginkit::{ApiLimits, Edge, PluginConfig, Vertex};
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use self::api::{Fetched, InventoryClient, USER_AGENT};

pub const HOSTS_LIMIT: &str = "hosts";
pub const SERVICES_LIMIT: &str = "services";
pub const DEFAULT_HOSTS_LIMIT: u64 = 100;
pub const DEFAULT_SERVICES_LIMIT: u64 = 100;

pub const HOST_OFFSET_KEY: &str = "hostOffset";
pub const SERVICES_TOKEN_KEY: &str = "servicesNextToken";

/// Label of the host → service edges.
pub const RUNS_LABEL: &str = "runs";

/// Config property holding the Bearer API key.
pub const API_KEY_PROPERTY: &str = "apiKey";

fn client(config: &PluginConfig, http_client: &Client) -> Result<InventoryClient, StageError> {
    let server_url = config
        .get_str("serverUrl")
        .filter(|url| !url.is_empty())
        .ok_or_else(|| StageError::new("InvalidConfig", "serverUrl is not configured"))?;
    Ok(InventoryClient::with_http_client(
        http_client.clone(),
        server_url,
        config.get_str(API_KEY_PROPERTY).unwrap_or_default(),
    ))
}

fn source_name(config: &PluginConfig) -> String {
    format!("inventory:{}", config.get_str("serverUrl").unwrap_or_default())
}

pub struct HostsStage {
    http_client: Client,
}

impl HostsStage {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Stage for HostsStage {
    fn name(&self) -> &str {
        "Hosts"
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<bool, StageError> {
        let limit = ctx.api_limits.get_or(HOSTS_LIMIT, DEFAULT_HOSTS_LIMIT).max(1);
        let offset = ctx.page.get_as::<u64>(HOST_OFFSET_KEY).unwrap_or(0);
        debug!("Getting page of {} hosts from {}", limit, offset);

        let client = client(ctx.config, &self.http_client)?;
        let page = match client.fetch_hosts(offset, limit).await? {
            Fetched::Page(page) => page,
            Fetched::RetryAfter(delay) => {
                ctx.request_delay(delay);
                return Ok(false);
            }
        };

        let source_name = source_name(ctx.config);
        let received = page.items.len() as u64;
        for host in page.items {
            let mut vertex = Vertex::new(host.id, host.name, "inventoryHost", source_name.clone())
                .with_type("host");
            if let Some(os) = host.os {
                vertex = vertex.with_property("os", os);
            }
            if let Some(ip) = host.ip {
                vertex = vertex.with_property("ipAddress", ip);
            }
            ctx.results.push_vertex(vertex);
        }

        let next = offset + received;
        if received == 0 || next >= page.total {
            ctx.page.remove(HOST_OFFSET_KEY);
            Ok(true)
        } else {
            ctx.page.set(HOST_OFFSET_KEY, next);
            Ok(false)
        }
    }
}

pub struct ServicesStage {
    http_client: Client,
}

impl ServicesStage {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Stage for ServicesStage {
    fn name(&self) -> &str {
        "Services"
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<bool, StageError> {
        let limit = ctx
            .api_limits
            .get_or(SERVICES_LIMIT, DEFAULT_SERVICES_LIMIT)
            .max(1);
        let token = ctx.page.get_as::<String>(SERVICES_TOKEN_KEY);
        debug!("Getting page of {} services (token {:?})", limit, token);

        let client = client(ctx.config, &self.http_client)?;
        let page = match client.fetch_services(limit, token.as_deref()).await? {
            Fetched::Page(page) => page,
            Fetched::RetryAfter(delay) => {
                ctx.request_delay(delay);
                return Ok(false);
            }
        };

        let source_name = source_name(ctx.config);
        for service in page.items {
            if let Some(host_id) = &service.host_id {
                ctx.results
                    .push_edge(Edge::new(RUNS_LABEL, host_id.clone(), service.id.clone()));
            }
            let mut vertex =
                Vertex::new(service.id, service.name, "inventoryService", source_name.clone())
                    .with_type("service");
            if let Some(status) = service.status {
                vertex = vertex.with_property("status", status);
            }
            ctx.results.push_vertex(vertex);
        }

        match page.next_token {
            Some(next) if !next.is_empty() => {
                ctx.page.set(SERVICES_TOKEN_KEY, next);
                Ok(false)
            }
            _ => {
                ctx.page.remove(SERVICES_TOKEN_KEY);
                Ok(true)
            }
        }
    }
}

/// Holds one connection pool, shared by every stage and tick.
#[derive(Debug, Clone)]
pub struct InventoryPlugin {
    http_client: Client,
}

impl InventoryPlugin {
    pub fn new() -> Self {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to configure HTTP client, using defaults");
                Client::new()
            });
        Self { http_client }
    }
}

impl Default for InventoryPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for InventoryPlugin {
    fn name(&self) -> &str {
        "inventory"
    }

    fn import_stages(&self) -> Vec<Box<dyn Stage>> {
        vec![
            Box::new(HostsStage::new(self.http_client.clone())),
            Box::new(ServicesStage::new(self.http_client.clone())),
        ]
    }

    fn default_api_limits(&self) -> ApiLimits {
        ApiLimits::from_pairs(&[
            (HOSTS_LIMIT, DEFAULT_HOSTS_LIMIT),
            (SERVICES_LIMIT, DEFAULT_SERVICES_LIMIT),
        ])
    }

    fn initial_paging_context(&self) -> Map<String, Value> {
        let mut initial = Map::new();
        initial.insert(HOST_OFFSET_KEY.to_string(), json!(0));
        initial.insert(SERVICES_TOKEN_KEY.to_string(), Value::Null);
        initial
    }

    fn problem_table(&self) -> ProblemTable {
        ProblemTable::default()
            .with_kinds(ProblemClass::CredentialInvalid, &["Unauthorized"])
            .with_kinds(ProblemClass::PermissionDenied, &["Forbidden"])
    }

    fn sensitive_properties(&self) -> &[&str] {
        &[API_KEY_PROPERTY]
    }

    /// Requests a single host to check the URL and the API key.
    async fn test_config(
        &self,
        config: &PluginConfig,
        _host: &dyn HostApi,
    ) -> Result<TestConfigResult> {
        let client = match client(config, &self.http_client) {
            Ok(client) => client,
            Err(err) => return Ok(TestConfigResult::new().error(err.message)),
        };

        let result = match client.fetch_hosts(0, 1).await {
            Ok(Fetched::Page(page)) => {
                TestConfigResult::passed(format!("Testing passed, {} hosts available", page.total))
            }
            Ok(Fetched::RetryAfter(_)) => TestConfigResult::new()
                .warning("The inventory server is throttling requests, try again later"),
            Err(err) => match self.problem_table().class_of(&err.kind) {
                Some(ProblemClass::CredentialInvalid) => {
                    TestConfigResult::new().error("The configured apiKey is invalid")
                }
                Some(ProblemClass::PermissionDenied) => TestConfigResult::new()
                    .warning("The configured apiKey has no permission to list hosts"),
                None => TestConfigResult::new()
                    .error(format!("Failed to reach the inventory server: {}", err.message)),
            },
        };
        Ok(match config.get_str("serverUrl") {
            Some(url) => result.with_link(url),
            None => result,
        })
    }
}
