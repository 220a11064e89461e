use std::collections::BTreeMap;

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;
use crate::models::request::{HttpMethod, RequestDescriptor};

/// A fully resolved request, ready to go on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl OutboundRequest {
    /// Resolves `descriptor` against `base_url`, attaching the bearer token when there is one.
    pub fn build(base_url: &str, descriptor: &RequestDescriptor, access_token: Option<&str>) -> Self {
        let mut headers = vec![(CONTENT_TYPE.as_str().to_string(), "application/json".to_string())];
        if let Some(token) = access_token.filter(|t| !t.is_empty()) {
            headers.push((AUTHORIZATION.as_str().to_string(), format!("Bearer {}", token)));
        }
        headers.extend(descriptor.headers.iter().cloned());

        OutboundRequest {
            method: descriptor.method,
            url: join_url(base_url, &descriptor.path),
            query: descriptor.query.clone(),
            headers,
            body: descriptor.body.clone(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The raw result of one exchange: status plus unparsed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Performs a single HTTP exchange. No retries, no auth logic.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, ClientError>;
}

pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// The production transport, backed by a shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        ReqwestTransport { client }
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, ClientError> {
        debug!("Sending {} {}", request.method.as_str(), request.url);

        let mut builder = self
            .client
            .request(request.method.into(), &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("Error reading response body: {}", e)))?;

        debug!("Received {} from {}", status, request.url);
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_without_doubling_slashes() {
        assert_eq!(join_url("http://api/", "/processos"), "http://api/processos");
        assert_eq!(join_url("http://api", "processos"), "http://api/processos");
        assert_eq!(join_url("http://api/v1", "/auth/login"), "http://api/v1/auth/login");
    }

    #[test]
    fn attaches_bearer_only_when_authenticated() {
        let descriptor = RequestDescriptor::new(HttpMethod::Get, "/cidades");

        let anonymous = OutboundRequest::build("http://api", &descriptor, None);
        assert_eq!(anonymous.header("authorization"), None);
        assert_eq!(anonymous.header("content-type"), Some("application/json"));

        let empty = OutboundRequest::build("http://api", &descriptor, Some(""));
        assert_eq!(empty.header("authorization"), None);

        let authed = OutboundRequest::build("http://api", &descriptor, Some("A1"));
        assert_eq!(authed.header("Authorization"), Some("Bearer A1"));
    }

    #[test]
    fn carries_descriptor_payload() {
        let descriptor = RequestDescriptor::new(HttpMethod::Post, "/modelos")
            .with_body(json!({"nome": "Petição inicial"}));
        let request = OutboundRequest::build("http://api", &descriptor, Some("A1"));
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://api/modelos");
        assert_eq!(request.body, Some(json!({"nome": "Petição inicial"})));
    }
}
