use crate::problem::StageError;
use anyhow::Context;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Wait used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Host record from `/api/hosts`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

/// Offset-paged response of `/api/hosts`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostPage {
    pub items: Vec<HostItem>,
    pub total: u64,
}

/// Service record from `/api/services`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "hostId", default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Token-paged response of `/api/services`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServicePage {
    pub items: Vec<ServiceItem>,
    #[serde(rename = "nextToken", default)]
    pub next_token: Option<String>,
}

/// Result of a page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    Page(T),
    /// The server throttled the request; ask again after the delay
    RetryAfter(Duration),
}

/// HTTP client for the inventory REST API.
///
/// Authenticates with a Bearer API key.
pub struct InventoryClient {
    api_key: String,
    http_client: Client,
    base_url: String,
}

/// `User-Agent` sent with every inventory request.
pub const USER_AGENT: &str = "plugin-host/0.1";

impl InventoryClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, StageError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_http_client(http_client, base_url, api_key))
    }

    /// Wraps an existing connection pool; `Client` clones share it.
    pub fn with_http_client(
        http_client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch one offset page of hosts.
    pub async fn fetch_hosts(&self, offset: u64, limit: u64) -> Result<Fetched<HostPage>, StageError> {
        let url = format!("{}/api/hosts", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("offset", offset), ("limit", limit)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to send fetch_hosts request")?;

        read_page(response, "hosts").await
    }

    /// Fetch one token page of services; `None` starts from the beginning.
    pub async fn fetch_services(
        &self,
        limit: u64,
        next_token: Option<&str>,
    ) -> Result<Fetched<ServicePage>, StageError> {
        let url = format!("{}/api/services", self.base_url);
        let mut query = vec![("limit", limit.to_string())];
        if let Some(token) = next_token {
            query.push(("nextToken", token.to_string()));
        }
        let response = self
            .http_client
            .get(&url)
            .query(&query)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to send fetch_services request")?;

        read_page(response, "services").await
    }
}

async fn read_page<T: DeserializeOwned>(
    response: Response,
    what: &str,
) -> Result<Fetched<T>, StageError> {
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return Ok(Fetched::RetryAfter(retry_after(&response)));
    }
    check_response_status(&response)?;
    let page = response
        .json::<T>()
        .await
        .with_context(|| format!("Failed to parse {} response", what))?;
    Ok(Fetched::Page(page))
}

/// `Retry-After` in whole seconds, or [`DEFAULT_RETRY_AFTER`].
fn retry_after(response: &Response) -> Duration {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Map error statuses to stage error kinds.
///
/// - 401 → `Unauthorized` (key rejected)
/// - 403 → `Forbidden` (key lacks permission for this endpoint)
/// - Other non-2xx → `HttpError`
fn check_response_status(response: &Response) -> Result<(), StageError> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(StageError::new(
            "Unauthorized",
            "Inventory API rejected the API key",
        )),
        StatusCode::FORBIDDEN => Err(StageError::new(
            "Forbidden",
            format!("Inventory API denied access to {}", response.url().path()),
        )),
        s if !s.is_success() => Err(StageError::new(
            "HttpError",
            format!("Inventory API error: {}", s),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_fetch_hosts() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/hosts?offset=0&limit=2")
            .match_header("authorization", "Bearer k1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "items": [
                        { "id": "h1", "name": "web-01", "os": "linux" },
                        { "id": "h2", "name": "db-01" }
                    ],
                    "total": 5
                }"#,
            )
            .create_async()
            .await;

        let client = InventoryClient::new(server.url(), "k1").unwrap();
        let Fetched::Page(page) = client.fetch_hosts(0, 2).await.unwrap() else {
            panic!("expected a page");
        };

        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].os.as_deref(), Some("linux"));
        assert_eq!(page.items[1].os, None);
    }

    #[tokio::test]
    async fn test_fetch_services_with_token() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/services?limit=2&nextToken=abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "items": [ { "id": "s1", "name": "nginx", "hostId": "h1" } ] }"#)
            .create_async()
            .await;

        let client = InventoryClient::new(server.url(), "k1").unwrap();
        let Fetched::Page(page) = client.fetch_services(2, Some("abc")).await.unwrap() else {
            panic!("expected a page");
        };

        assert_eq!(page.items[0].host_id.as_deref(), Some("h1"));
        assert_eq!(page.next_token, None);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let mut server = Server::new_async().await;
        let _unauthorized = server
            .mock("GET", "/api/hosts?offset=0&limit=1")
            .with_status(401)
            .create_async()
            .await;
        let _forbidden = server
            .mock("GET", "/api/services?limit=1")
            .with_status(403)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/api/hosts?offset=5&limit=1")
            .with_status(500)
            .create_async()
            .await;

        let client = InventoryClient::new(server.url(), "k1").unwrap();
        assert_eq!(client.fetch_hosts(0, 1).await.unwrap_err().kind, "Unauthorized");
        assert_eq!(client.fetch_services(1, None).await.unwrap_err().kind, "Forbidden");
        let err = client.fetch_hosts(5, 1).await.unwrap_err();
        assert_eq!(err.kind, "HttpError");
        assert!(err.message.contains("500"));
    }

    #[tokio::test]
    async fn test_too_many_requests_yields_retry_after() {
        let mut server = Server::new_async().await;
        let _with_header = server
            .mock("GET", "/api/hosts?offset=0&limit=1")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;
        let _without_header = server
            .mock("GET", "/api/services?limit=1")
            .with_status(429)
            .create_async()
            .await;

        let client = InventoryClient::new(server.url(), "k1").unwrap();
        assert_eq!(
            client.fetch_hosts(0, 1).await.unwrap(),
            Fetched::RetryAfter(Duration::from_secs(7))
        );
        assert_eq!(
            client.fetch_services(1, None).await.unwrap(),
            Fetched::RetryAfter(DEFAULT_RETRY_AFTER)
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_generic_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/hosts?offset=0&limit=1")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = InventoryClient::new(server.url(), "k1").unwrap();
        let err = client.fetch_hosts(0, 1).await.unwrap_err();
        assert_eq!(err.kind, crate::problem::GENERIC_ERROR_KIND);
        assert!(err.message.starts_with("Failed to parse hosts response"));
    }
}
