use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use crate::config::BrowserConfig;

/// Launches browser processes.
///
/// One call to [`BrowserDriver::launch`] per batch; the returned session
/// owns the process until [`BrowserSession::close`] is called.
pub trait BrowserDriver {
    type Session: BrowserSession;

    fn launch(&self, config: &BrowserConfig) -> Result<Self::Session>;
}

/// A live browser process.
///
/// Calls block the current thread, so async callers run them on the
/// blocking pool and share the session behind an `Arc`.
pub trait BrowserSession: Send + Sync + 'static {
    type Page: PageHandle + Send + 'static;

    /// Open a fresh page with the configured viewport and user agent
    fn new_page(&self, config: &BrowserConfig) -> Result<Self::Page>;

    /// Terminate the browser process. Called exactly once per session.
    fn close(&mut self);
}

/// A single open page in the browser
pub trait PageHandle {
    fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait until an element matching `selector` exists in the DOM
    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    fn click(&self, selector: &str) -> Result<()>;

    fn wait_for_navigation(&self, timeout: Duration) -> Result<()>;

    /// Run `script` (a JavaScript function expression) in the page context
    /// with `args` spread as its arguments and return its JSON result.
    fn evaluate(&self, script: &str, args: &[Value]) -> Result<Value>;

    fn close(&mut self);
}

/// Response to an image request
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// HTTP GET for image assets
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedImage>;
}
