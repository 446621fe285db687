//! reqwest-backed tool endpoint client.

use std::time::Duration;

use async_trait::async_trait;

use crate::{config::CartConfig, op::ToolRequest};

use super::{BackendError, CartBackend, ToolResponse};

/// Path of the tool endpoint under the backend base url.
pub const TOOL_ENDPOINT: &str = "/mcp-action";

/// Posts tool requests as JSON to `{base_url}/mcp-action`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint_url(base_url),
            timeout,
        }
    }

    /// Client configured from `config`.
    pub fn from_config(config: &CartConfig) -> Self {
        Self::new(&config.backend_url, config.request_timeout())
    }

    /// Full url requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The request timeout covers the body read as well as the headers.
    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(self.timeout)
        } else {
            BackendError::Http(err)
        }
    }
}

fn endpoint_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), TOOL_ENDPOINT)
}

#[async_trait]
impl CartBackend for HttpBackend {
    async fn call_tool(&self, request: ToolRequest) -> Result<ToolResponse, BackendError> {
        tracing::debug!(tool = %request.tool_name, endpoint = %self.endpoint, "posting tool request");
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(endpoint_url("http://localhost:3002/"), "http://localhost:3002/mcp-action");
        assert_eq!(endpoint_url("http://api"), "http://api/mcp-action");
    }

    #[test]
    fn from_config_uses_configured_url() {
        let cfg = CartConfig {
            backend_url: "http://shop.test".to_string(),
            ..CartConfig::default()
        };
        let backend = HttpBackend::from_config(&cfg);
        assert_eq!(backend.endpoint(), "http://shop.test/mcp-action");
    }
}
