//! A single WebDriver session

use async_trait::async_trait;
use ignition_browser_api::{BrowserError, BrowserResult, BrowserSession, ElementRef, Locator};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::protocol;

/// Send one WebDriver command and decode the reply
pub(crate) async fn send_command(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> BrowserResult<Value> {
    let mut request = client.request(method.clone(), url);
    if let Some(body) = body {
        request = request.json(&body);
    } else if method == Method::POST {
        // Drivers insist on a JSON object even for body-less POSTs.
        request = request.json(&json!({}));
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            BrowserError::Timeout(format!("{method} {url}: {e}"))
        } else {
            BrowserError::Transport(format!("{method} {url}: {e}"))
        }
    })?;

    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| BrowserError::Transport(format!("{method} {url}: {e}")))?;

    protocol::decode_response(status, &text)
}

/// Session on a WebDriver server
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
    closed: AtomicBool,
}

impl WebDriverSession {
    pub(crate) fn new(client: Client, endpoint: &str, session_id: String) -> Self {
        Self {
            client,
            base_url: format!("{}/session/{}", endpoint, session_id),
            session_id,
            closed: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> BrowserResult<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::SessionUnavailable(format!(
                "session {} already closed",
                self.session_id
            )));
        }
        let url = format!("{}{}", self.base_url, path);
        send_command(&self.client, method, &url, body).await
    }

    fn element_path(element: &ElementRef, suffix: &str) -> String {
        format!("/element/{}/{}", element.as_str(), suffix)
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        debug!(session_id = %self.session_id, url = %url, "Navigating");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> BrowserResult<Option<ElementRef>> {
        let body = protocol::find_element_body(locator);
        match self.command(Method::POST, "/element", Some(body)).await {
            Ok(value) => protocol::parse_element(&value).map(Some),
            Err(BrowserError::NoSuchElement(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> BrowserResult<()> {
        let path = Self::element_path(element, "value");
        self.command(Method::POST, &path, Some(protocol::send_keys_body(text)))
            .await?;
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> BrowserResult<()> {
        let path = Self::element_path(element, "click");
        self.command(Method::POST, &path, None).await?;
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> BrowserResult<String> {
        let path = Self::element_path(element, "text");
        let value = self.command(Method::GET, &path, None).await?;
        protocol::parse_string(&value)
    }

    async fn is_enabled(&self, element: &ElementRef) -> BrowserResult<bool> {
        let path = Self::element_path(element, "enabled");
        let value = self.command(Method::GET, &path, None).await?;
        protocol::parse_bool(&value)
    }

    async fn is_displayed(&self, element: &ElementRef) -> BrowserResult<bool> {
        // Not part of W3C proper, but chromedriver and geckodriver both serve it.
        let path = Self::element_path(element, "displayed");
        let value = self.command(Method::GET, &path, None).await?;
        protocol::parse_bool(&value)
    }

    async fn close(&self) -> BrowserResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            warn!(session_id = %self.session_id, "Session closed twice");
            return Ok(());
        }

        send_command(&self.client, Method::DELETE, &self.base_url, None).await?;
        debug!(session_id = %self.session_id, "WebDriver session deleted");
        Ok(())
    }
}
