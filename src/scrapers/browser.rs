use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::scrapers::traits::{BrowserDriver, BrowserSession, PageHandle};

/// Launches headless Chrome through the DevTools protocol
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeDriver;

impl BrowserDriver for ChromeDriver {
    type Session = ChromeSession;

    fn launch(&self, config: &BrowserConfig) -> Result<ChromeSession> {
        info!(headless = config.headless, idle_timeout = ?config.idle_timeout, "Launching Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some(config.viewport))
            .idle_browser_timeout(config.idle_timeout)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(ChromeSession {
            browser: Some(browser),
        })
    }
}

/// Owns the Chrome process. Dropping the inner [`Browser`] kills it.
pub struct ChromeSession {
    browser: Option<Browser>,
}

impl BrowserSession for ChromeSession {
    type Page = ChromeTab;

    fn new_page(&self, config: &BrowserConfig) -> Result<ChromeTab> {
        let browser = self
            .browser
            .as_ref()
            .context("Browser has already been closed")?;

        let tab = browser.new_tab().context("Failed to open tab")?;
        tab.set_user_agent(&config.user_agent, None, None)
            .context("Failed to set user agent")?;

        Ok(ChromeTab { tab, closed: false })
    }

    fn close(&mut self) {
        if let Some(browser) = self.browser.take() {
            drop(browser);
            info!("Chrome closed");
        }
    }
}

/// One Chrome tab
pub struct ChromeTab {
    tab: Arc<Tab>,
    closed: bool,
}

impl PageHandle for ChromeTab {
    fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        debug!(url, "Navigating");
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {url}"))?
            .wait_until_navigated()
            .with_context(|| format!("Navigation to {url} did not complete"))?;
        Ok(())
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .with_context(|| format!("No element matched {selector} within {timeout:?}"))?;
        Ok(())
    }

    fn click(&self, selector: &str) -> Result<()> {
        self.tab
            .find_element(selector)
            .with_context(|| format!("No element matched {selector}"))?
            .click()
            .with_context(|| format!("Failed to click {selector}"))?;
        Ok(())
    }

    fn wait_for_navigation(&self, timeout: Duration) -> Result<()> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .wait_until_navigated()
            .context("Navigation did not complete")?;
        Ok(())
    }

    fn evaluate(&self, script: &str, args: &[Value]) -> Result<Value> {
        let args = serde_json::to_string(args).context("Failed to encode script arguments")?;
        let expression = format!("({script})(...{args})");

        let result = self
            .tab
            .evaluate(&expression, true)
            .context("Script evaluation failed")?;

        Ok(result.value.unwrap_or(Value::Null))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.tab.close(true) {
            warn!(error = %err, "Failed to close tab");
        }
    }
}
