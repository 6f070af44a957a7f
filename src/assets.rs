use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AssetConfig;
use crate::error::ScrapeError;
use crate::scrapers::traits::{FetchedImage, ImageFetcher};

/// reqwest-backed image fetcher with a per-request timeout
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(config: &AssetConfig, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn get(&self, url: &str) -> Result<FetchedImage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .context("Failed to read response body")?
            .to_vec();

        Ok(FetchedImage {
            status,
            content_type,
            bytes,
        })
    }
}

/// Outcome of downloading one listing's images
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DownloadReport {
    pub attempted: usize,
    pub saved: Vec<PathBuf>,
    /// 1-based indices of images that could not be stored
    pub failed: Vec<usize>,
}

/// Downloads listing images into `<base_dir>/<external_id>/img_NN.<ext>`
pub struct AssetDownloader<F> {
    fetcher: F,
    config: AssetConfig,
}

impl<F: ImageFetcher> AssetDownloader<F> {
    pub fn new(fetcher: F, config: AssetConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn listing_dir(&self, external_id: &str) -> PathBuf {
        self.config.base_dir.join(external_id)
    }

    /// Swap the display-size suffix for the full-resolution one
    pub fn full_resolution_url(&self, display_url: &str) -> String {
        match display_url.strip_suffix(self.config.display_suffix.as_str()) {
            Some(base) if !self.config.display_suffix.is_empty() => {
                format!("{base}{}", self.config.full_suffix)
            }
            _ => display_url.to_string(),
        }
    }

    /// Attempt every image exactly once, in source order.
    ///
    /// Individual failures are logged and recorded; they never stop the
    /// remaining downloads.
    pub async fn download_all(&self, external_id: &str, image_urls: &[String]) -> DownloadReport {
        let dir = self.listing_dir(external_id);
        let mut report = DownloadReport::default();

        for (offset, display_url) in image_urls.iter().enumerate() {
            let index = offset + 1;
            report.attempted += 1;

            match self.download_one(&dir, external_id, index, display_url).await {
                Ok(path) => {
                    debug!(external_id, index, path = %path.display(), "Image saved");
                    report.saved.push(path);
                }
                Err(err) => {
                    warn!(external_id, index, error = %err, "Image download failed");
                    report.failed.push(index);
                }
            }
        }

        info!(
            external_id,
            saved = report.saved.len(),
            failed = report.failed.len(),
            "Images processed"
        );
        report
    }

    async fn download_one(
        &self,
        dir: &Path,
        external_id: &str,
        index: usize,
        display_url: &str,
    ) -> Result<PathBuf, ScrapeError> {
        let failure = |reason: String| ScrapeError::ImageDownload {
            external_id: external_id.to_string(),
            index,
            reason,
        };

        let url = self.full_resolution_url(display_url);
        let image = self
            .fetcher
            .get(&url)
            .await
            .map_err(|err| failure(format!("{err:#}")))?;

        if !(200..300).contains(&image.status) {
            return Err(failure(format!("HTTP {}", image.status)));
        }

        let extension = image
            .content_type
            .as_deref()
            .and_then(extension_for)
            .unwrap_or(self.config.default_extension.as_str());
        let path = dir.join(image_file_name(index, extension));

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|err| failure(format!("cannot create {}: {err}", dir.display())))?;
        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|err| failure(format!("cannot write {}: {err}", path.display())))?;

        Ok(path)
    }
}

/// `img_01.webp`, `img_02.webp`, ...
pub fn image_file_name(index: usize, extension: &str) -> String {
    format!("img_{index:02}.{extension}")
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "image/webp" => Some("webp"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/avif" => Some("avif"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DISPLAY_IMAGE_SUFFIX, FULL_IMAGE_SUFFIX};
    use crate::testing::FakeFetcher;
    use tempfile::TempDir;

    fn downloader(fetcher: FakeFetcher, base: &Path) -> AssetDownloader<FakeFetcher> {
        AssetDownloader::new(
            fetcher,
            AssetConfig {
                base_dir: base.to_path_buf(),
                ..AssetConfig::default()
            },
        )
    }

    fn display_urls(names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|name| format!("https://cdn.example/{name}.jpeg{DISPLAY_IMAGE_SUFFIX}"))
            .collect()
    }

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(image_file_name(1, "webp"), "img_01.webp");
        assert_eq!(image_file_name(12, "jpg"), "img_12.jpg");
        assert_eq!(image_file_name(100, "png"), "img_100.png");
    }

    #[test]
    fn content_type_maps_to_extension() {
        assert_eq!(extension_for("image/jpeg; charset=binary"), Some("jpg"));
        assert_eq!(extension_for("IMAGE/WEBP"), Some("webp"));
        assert_eq!(extension_for("application/octet-stream"), None);
    }

    #[test]
    fn display_suffix_is_replaced_with_full_resolution() {
        let temp = TempDir::new().unwrap();
        let assets = downloader(FakeFetcher::default(), temp.path());

        assert_eq!(
            assets.full_resolution_url(&format!("https://cdn.example/a.jpeg{DISPLAY_IMAGE_SUFFIX}")),
            format!("https://cdn.example/a.jpeg{FULL_IMAGE_SUFFIX}")
        );
        assert_eq!(
            assets.full_resolution_url("https://cdn.example/a.jpeg"),
            "https://cdn.example/a.jpeg"
        );
    }

    #[tokio::test]
    async fn saves_images_in_source_order() {
        let temp = TempDir::new().unwrap();
        let assets = downloader(FakeFetcher::default(), temp.path());

        let report = assets.download_all("123", &display_urls(&["a", "b", "c"])).await;

        assert_eq!(report.attempted, 3);
        assert!(report.failed.is_empty());
        let dir = temp.path().join("123");
        for (index, name) in ["a", "b", "c"].iter().enumerate() {
            let body = std::fs::read_to_string(dir.join(image_file_name(index + 1, "webp"))).unwrap();
            assert!(body.contains(&format!("/{name}.jpeg")));
            assert!(body.ends_with(FULL_IMAGE_SUFFIX));
        }
    }

    #[tokio::test]
    async fn failures_do_not_stop_remaining_downloads() {
        let temp = TempDir::new().unwrap();
        let fetcher = FakeFetcher::failing(["missing", "transport"]);
        let assets = downloader(fetcher, temp.path());

        let urls = display_urls(&["a", "missing", "transport", "d"]);
        let report = assets.download_all("77", &urls).await;

        assert_eq!(report.attempted, 4);
        assert_eq!(assets.fetcher.requested().len(), 4);
        assert_eq!(report.failed, vec![2, 3]);

        let dir = temp.path().join("77");
        assert!(dir.join("img_01.webp").exists());
        assert!(!dir.join("img_02.webp").exists());
        assert!(!dir.join("img_03.webp").exists());
        assert!(dir.join("img_04.webp").exists());
    }

    #[tokio::test]
    async fn directory_is_not_created_when_nothing_downloads() {
        let temp = TempDir::new().unwrap();
        let assets = downloader(FakeFetcher::failing(["missing"]), temp.path());

        let report = assets.download_all("9", &display_urls(&["missing"])).await;

        assert_eq!(report.failed, vec![1]);
        assert!(!temp.path().join("9").exists());
    }
}
