use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Query suffix the catalog stores with every image URL
pub const DISPLAY_IMAGE_SUFFIX: &str =
    "?fl=res,749,562,3|wrm,/watermark/sreality.png,10|shr,,20|webp,60";

/// Query suffix used when downloading the original-size image
pub const FULL_IMAGE_SUFFIX: &str =
    "?fl=res,1920,1920,3|wrm,/watermark/sreality.png,15|shr,,20|webp,80";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Browser process and page settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: (u32, u32),
    pub user_agent: String,
    pub navigation_timeout: Duration,
    /// DevTools connection is dropped after this long without browser traffic
    pub idle_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: (1280, 900),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            navigation_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Consent interstitial detection and dismissal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentConfig {
    pub accept_selector: String,
    pub detect_timeout: Duration,
    pub navigation_timeout: Duration,
    /// Pause after dismissal so client-side hydration can finish
    pub settle_delay: Duration,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            accept_selector: r#"button[data-testid="cw-button-agree-with-ads"]"#.to_string(),
            detect_timeout: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Hydration state lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub marker_selector: String,
    pub marker_timeout: Duration,
    pub display_suffix: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            marker_selector: "script#__NEXT_DATA__".to_string(),
            marker_timeout: Duration::from_secs(10),
            display_suffix: DISPLAY_IMAGE_SUFFIX.to_string(),
        }
    }
}

/// Image download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub base_dir: PathBuf,
    pub display_suffix: String,
    pub full_suffix: String,
    pub fetch_timeout: Duration,
    /// Upper bound on gallery size the browser idle timeout is sized for
    pub expected_images: u32,
    /// Extension used when the response carries no recognizable content type
    pub default_extension: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("downloads"),
            display_suffix: DISPLAY_IMAGE_SUFFIX.to_string(),
            full_suffix: FULL_IMAGE_SUFFIX.to_string(),
            fetch_timeout: Duration::from_secs(30),
            expected_images: 60,
            default_extension: "webp".to_string(),
        }
    }
}

/// Everything a scrape batch can be tuned with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub browser: BrowserConfig,
    pub consent: ConsentConfig,
    pub extraction: ExtractionConfig,
    pub assets: AssetConfig,
}

impl ScrapeConfig {
    /// Browser settings for a batch, with the idle timeout stretched to cover
    /// the longest quiet stretch of one listing: the page waits followed by
    /// every image fetch timing out.
    pub fn launch_config(&self) -> BrowserConfig {
        let page_phase = self.browser.navigation_timeout
            + self.consent.detect_timeout
            + self.consent.navigation_timeout
            + self.consent.settle_delay
            + self.extraction.marker_timeout;
        let downloads = self
            .assets
            .fetch_timeout
            .saturating_mul(self.assets.expected_images);

        BrowserConfig {
            idle_timeout: self
                .browser
                .idle_timeout
                .max(page_phase.saturating_add(downloads)),
            ..self.browser.clone()
        }
    }
}
