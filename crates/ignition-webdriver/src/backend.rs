//! WebDriver backend: hands out fresh sessions from a driver server

use async_trait::async_trait;
use ignition_browser_api::{BrowserBackend, BrowserError, BrowserResult, BrowserSession, SessionOptions};
use reqwest::{Client, Method};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::protocol;
use crate::session::{WebDriverSession, send_command};

/// Where the driver server lives and how long to wait on it
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// Base URL of the driver server, e.g. `http://localhost:9515`
    pub endpoint: String,

    /// Upper bound for a single WebDriver HTTP request
    pub request_timeout: Duration,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9515".into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Browser backend backed by a W3C WebDriver server
pub struct WebDriverBackend {
    client: Client,
    endpoint: String,
}

impl WebDriverBackend {
    pub fn new(config: WebDriverConfig) -> BrowserResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| BrowserError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BrowserBackend for WebDriverBackend {
    async fn open_session(
        &self,
        options: &SessionOptions,
    ) -> BrowserResult<Arc<dyn BrowserSession>> {
        let url = format!("{}/session", self.endpoint);
        let body = protocol::new_session_body(options);

        debug!(endpoint = %self.endpoint, browser = %options.browser, "Requesting new WebDriver session");

        let value = send_command(&self.client, Method::POST, &url, Some(body))
            .await
            .map_err(|e| match e {
                BrowserError::SessionUnavailable(_) => e,
                other => BrowserError::SessionUnavailable(other.to_string()),
            })?;
        let session_id = protocol::parse_session_id(&value)?;

        info!(session_id = %session_id, "WebDriver session created");

        Ok(Arc::new(WebDriverSession::new(
            self.client.clone(),
            &self.endpoint,
            session_id,
        )))
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/status", self.endpoint);
        match send_command(&self.client, Method::GET, &url, None).await {
            Ok(value) => value.get("ready").and_then(|r| r.as_bool()).unwrap_or(false),
            Err(e) => {
                debug!(error = %e, "WebDriver status check failed");
                false
            }
        }
    }
}
