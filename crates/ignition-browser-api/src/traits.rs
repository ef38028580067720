//! Browser backend traits

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::{ElementRef, Locator, SessionOptions};

/// Errors from browser operations
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Could not start browser session: {0}")]
    SessionUnavailable(String),

    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Browser timed out: {0}")]
    Timeout(String),

    #[error("Browser command failed ({error}): {message}")]
    Command { error: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// One live, exclusively owned browser session.
///
/// Methods take `&self` so a session can be shared between the task that
/// drives it and the code that guarantees it gets closed.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load a page
    async fn navigate(&self, url: &str) -> BrowserResult<()>;

    /// Look an element up once. `Ok(None)` means it is not on the page;
    /// waiting is the caller's business.
    async fn find(&self, locator: &Locator) -> BrowserResult<Option<ElementRef>>;

    /// Type text into an element
    async fn send_keys(&self, element: &ElementRef, text: &str) -> BrowserResult<()>;

    /// Click an element
    async fn click(&self, element: &ElementRef) -> BrowserResult<()>;

    /// Rendered text of an element
    async fn text(&self, element: &ElementRef) -> BrowserResult<String>;

    /// Whether the element accepts interaction
    async fn is_enabled(&self, element: &ElementRef) -> BrowserResult<bool>;

    /// Whether the element is rendered visibly
    async fn is_displayed(&self, element: &ElementRef) -> BrowserResult<bool>;

    /// Tear the session down and release the browser process
    async fn close(&self) -> BrowserResult<()>;
}

/// Factory for fresh, isolated browser sessions
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    async fn open_session(&self, options: &SessionOptions)
    -> BrowserResult<Arc<dyn BrowserSession>>;

    /// Optional: check if the backend can currently hand out sessions
    async fn is_healthy(&self) -> bool {
        true
    }
}
