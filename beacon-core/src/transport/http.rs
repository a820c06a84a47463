//! HTTP transport for the collection server
//!
//! POSTs each payload as JSON to `server_url + endpoint path`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};

use super::{Endpoint, Transport};

/// reqwest-backed [`Transport`]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a new transport from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("pipeline.server_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &config.api_key {
            headers.insert(
                "X-Api-Key",
                HeaderValue::from_str(api_key)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        if let Some(application_id) = &config.application_id {
            headers.insert(
                "X-Application-Id",
                HeaderValue::from_str(application_id)
                    .map_err(|e| Error::Config(format!("invalid application_id: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Full URL for an endpoint
    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Check if the collection server is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: Endpoint, payload: &serde_json::Value) -> Result<()> {
        let url = self.url(endpoint);

        let response = self
            .http_client
            .post(&url)
            .json(payload)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Transport(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_config() -> PipelineConfig {
        PipelineConfig {
            server_url: Some("https://collect.example.com/".to_string()),
            api_key: Some("bk_live_test".to_string()),
            application_id: Some("com.example.app".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_transport_requires_valid_config() {
        assert!(HttpTransport::new(&PipelineConfig::default()).is_err());
    }

    #[test]
    fn test_transport_urls() {
        let transport = HttpTransport::new(&ready_config()).unwrap();
        assert_eq!(
            transport.url(Endpoint::EventBatch),
            "https://collect.example.com/events/batch"
        );
        assert_eq!(
            transport.url(Endpoint::ScreenViews),
            "https://collect.example.com/screenviews"
        );
    }

    #[test]
    fn test_transport_rejects_invalid_header_value() {
        let config = PipelineConfig {
            api_key: Some("bad\nkey".to_string()),
            ..ready_config()
        };
        assert!(matches!(HttpTransport::new(&config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_http_error() {
        let config = PipelineConfig {
            server_url: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: 2,
            ..ready_config()
        };
        let transport = HttpTransport::new(&config).unwrap();

        let result = transport
            .send(Endpoint::Events, &serde_json::json!({"name": "x"}))
            .await;
        assert!(matches!(result, Err(Error::Http(_))));
        assert!(!transport.health_check().await.unwrap());
    }
}
