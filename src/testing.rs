//! In-memory stand-ins for the browser and HTTP collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};

use crate::config::BrowserConfig;
use crate::scrapers::traits::{BrowserDriver, BrowserSession, FetchedImage, ImageFetcher, PageHandle};

/// How a fake page behaves once navigated to
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    pub goto_fails: bool,
    pub consent_wall: bool,
    pub click_fails: bool,
    pub navigation_after_click_fails: bool,
    pub evaluate_panics: bool,
    /// Text content of the hydration container; `None` means no container
    pub hydration: Option<String>,
}

impl PageScript {
    pub fn with_state(state: Value) -> Self {
        Self {
            hydration: Some(state.to_string()),
            ..Self::default()
        }
    }
}

/// Wrap a listing payload the way the origin site nests it in its state tree
pub fn next_state(listing: Value) -> Value {
    json!({
        "props": {
            "pageProps": {
                "dehydratedState": {
                    "queries": [
                        { "queryKey": ["user"], "state": { "data": { "id": 7, "price": 1 } } },
                        { "queryKey": ["estate"], "state": { "data": listing } }
                    ]
                }
            }
        },
        "page": "/detail/[...slug]"
    })
}

#[derive(Debug, Default)]
pub struct Counters {
    pub launches: AtomicUsize,
    pub browser_closes: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub page_closes: AtomicUsize,
    pub launch_configs: Mutex<Vec<BrowserConfig>>,
    pub page_configs: Mutex<Vec<BrowserConfig>>,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn launch_configs(&self) -> Vec<BrowserConfig> {
        self.launch_configs.lock().unwrap().clone()
    }

    pub fn page_configs(&self) -> Vec<BrowserConfig> {
        self.page_configs.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct FakeDriver {
    pub scripts: Arc<HashMap<String, PageScript>>,
    pub counters: Arc<Counters>,
    pub launch_fails: bool,
}

impl FakeDriver {
    pub fn with_pages<I: IntoIterator<Item = (String, PageScript)>>(pages: I) -> Self {
        Self {
            scripts: Arc::new(pages.into_iter().collect()),
            ..Self::default()
        }
    }
}

impl BrowserDriver for FakeDriver {
    type Session = FakeSession;

    fn launch(&self, config: &BrowserConfig) -> Result<FakeSession> {
        if self.launch_fails {
            bail!("chrome binary not found");
        }
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        self.counters.launch_configs.lock().unwrap().push(config.clone());
        Ok(FakeSession {
            scripts: Arc::clone(&self.scripts),
            counters: Arc::clone(&self.counters),
        })
    }
}

pub struct FakeSession {
    scripts: Arc<HashMap<String, PageScript>>,
    counters: Arc<Counters>,
}

impl BrowserSession for FakeSession {
    type Page = FakePage;

    fn new_page(&self, config: &BrowserConfig) -> Result<FakePage> {
        self.counters.pages_opened.fetch_add(1, Ordering::SeqCst);
        self.counters.page_configs.lock().unwrap().push(config.clone());
        let mut page = FakePage::new(PageScript::default());
        page.scripts = Arc::clone(&self.scripts);
        page.counters = Arc::clone(&self.counters);
        Ok(page)
    }

    fn close(&mut self) {
        self.counters.browser_closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakePage {
    scripts: Arc<HashMap<String, PageScript>>,
    counters: Arc<Counters>,
    current: Mutex<PageScript>,
    clicks: Mutex<Vec<String>>,
}

impl FakePage {
    pub fn new(script: PageScript) -> Self {
        Self {
            scripts: Arc::default(),
            counters: Arc::default(),
            current: Mutex::new(script),
            clicks: Mutex::default(),
        }
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }

    fn script(&self) -> PageScript {
        self.current.lock().unwrap().clone()
    }
}

impl PageHandle for FakePage {
    fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        let script = self.scripts.get(url).cloned().unwrap_or_default();
        if script.goto_fails {
            bail!("net::ERR_NAME_NOT_RESOLVED");
        }
        *self.current.lock().unwrap() = script;
        Ok(())
    }

    fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<()> {
        let script = self.script();
        let found = if selector.starts_with("button") {
            script.consent_wall
        } else {
            script.hydration.is_some()
        };
        if found {
            Ok(())
        } else {
            Err(anyhow!("timed out waiting for {selector}"))
        }
    }

    fn click(&self, selector: &str) -> Result<()> {
        if self.script().click_fails {
            bail!("element is not clickable");
        }
        self.clicks.lock().unwrap().push(selector.to_string());
        Ok(())
    }

    fn wait_for_navigation(&self, _timeout: Duration) -> Result<()> {
        if self.script().navigation_after_click_fails {
            bail!("navigation timed out");
        }
        Ok(())
    }

    fn evaluate(&self, _script: &str, _args: &[Value]) -> Result<Value> {
        let script = self.script();
        if script.evaluate_panics {
            panic!("renderer crashed while evaluating");
        }
        Ok(script.hydration.map(Value::String).unwrap_or(Value::Null))
    }

    fn close(&mut self) {
        self.counters.page_closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serves every image except the ones whose URL contains a failing marker
#[derive(Default)]
pub struct FakeFetcher {
    pub failing: HashSet<String>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn failing<I: IntoIterator<Item = &'static str>>(markers: I) -> Self {
        Self {
            failing: markers.into_iter().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ImageFetcher for FakeFetcher {
    async fn get(&self, url: &str) -> Result<FetchedImage> {
        self.requested.lock().unwrap().push(url.to_string());

        if let Some(marker) = self.failing.iter().find(|m| url.contains(m.as_str())) {
            if marker.starts_with("transport") {
                bail!("connection reset");
            }
            return Ok(FetchedImage {
                status: 404,
                content_type: Some("text/html".to_string()),
                bytes: b"not found".to_vec(),
            });
        }

        Ok(FetchedImage {
            status: 200,
            content_type: Some("image/webp".to_string()),
            bytes: url.as_bytes().to_vec(),
        })
    }
}
