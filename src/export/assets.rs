//! Asset materializer: downloads images referenced by content blocks and
//! writes them to their deterministic on-disk paths.
//!
//! The origin rejects bot-like requests, so every fetch presents a referer
//! and a realistic browser identity.

use crate::export::error::ExportError;
use crate::model::ContentBlock;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_REFERER: &str = "https://book.qq.com/";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts per asset (initial plus retries).
const DEFAULT_RETRY_COUNT: u32 = 3;
/// Default backoff delays in seconds after each failed attempt.
const DEFAULT_BACKOFF_SECS: [u64; 2] = [1, 2];

/// Where one image ends up on disk. Derived from an [ContentBlock::Image]
/// and the chapter output directory; the materializer has sole write
/// authority over `destination_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub source_url: String,
    pub destination_path: PathBuf,
    pub destination_dir: PathBuf,
}

impl AssetDescriptor {
    /// Returns None for non-image blocks.
    pub fn from_block(block: &ContentBlock, output_dir: &Path) -> Option<Self> {
        match block {
            ContentBlock::Image {
                source_url,
                relative_path,
                ..
            } => {
                let destination_path = output_dir.join(relative_path);
                let destination_dir = destination_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| output_dir.to_path_buf());
                Some(Self {
                    source_url: source_url.clone(),
                    destination_path,
                    destination_dir,
                })
            }
            _ => None,
        }
    }
}

/// Blocking HTTP client for image downloads.
#[derive(Debug)]
pub struct AssetClient {
    inner: reqwest::blocking::Client,
    retry_count: u32,
    backoff_secs: Vec<u64>,
}

impl AssetClient {
    /// Build a client with default referer, User-Agent, and timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> AssetClientBuilder {
        AssetClientBuilder::default()
    }

    /// Ensure the destination directory exists (idempotent), fetch the image
    /// bytes, and write them unconditionally: re-running an export
    /// re-downloads and overwrites.
    pub fn materialize(&self, asset: &AssetDescriptor) -> Result<(), ExportError> {
        std::fs::create_dir_all(&asset.destination_dir).map_err(|e| ExportError::CreateDir {
            path: asset.destination_dir.clone(),
            source: e,
        })?;

        let response = self.get_with_retry(&asset.source_url)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::AssetStatus {
                status: status.as_u16(),
                url: asset.source_url.clone(),
            });
        }
        let bytes = response.bytes().map_err(|e| ExportError::AssetNetwork {
            url: asset.source_url.clone(),
            source: e,
        })?;
        std::fs::write(&asset.destination_path, &bytes).map_err(|e| ExportError::AssetWrite {
            path: asset.destination_path.clone(),
            source: e,
        })
    }

    /// GET with retries for transient failures: timeout, connection errors,
    /// HTTP 5xx, and 429. Other failures are returned immediately.
    fn get_with_retry(&self, url: &str) -> Result<reqwest::blocking::Response, ExportError> {
        let max_attempts = self.retry_count;
        let mut attempt = 0;
        loop {
            match self.inner.get(url).send() {
                Ok(response) => {
                    let status = response.status();
                    let retryable = status.is_server_error() || status.as_u16() == 429;
                    if retryable && attempt + 1 < max_attempts {
                        std::thread::sleep(Duration::from_secs(self.backoff(attempt)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    if retryable && attempt + 1 < max_attempts {
                        std::thread::sleep(Duration::from_secs(self.backoff(attempt)));
                        attempt += 1;
                        continue;
                    }
                    return Err(ExportError::AssetNetwork {
                        url: url.to_string(),
                        source: e,
                    });
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> u64 {
        self.backoff_secs
            .get(attempt as usize)
            .copied()
            .unwrap_or_else(|| self.backoff_secs.last().copied().unwrap_or(1))
    }
}

/// Builder for [AssetClient] with optional User-Agent, timeout, and retry settings.
#[derive(Debug)]
pub struct AssetClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
    retry_count: u32,
    retry_backoff_secs: Vec<u64>,
}

impl Default for AssetClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
        }
    }
}

impl AssetClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set number of attempts per asset for transient failures (default 3).
    pub fn retry_count(mut self, n: u32) -> Self {
        self.retry_count = n.max(1);
        self
    }

    /// Set backoff delays in seconds before each retry; last value is reused
    /// when there are more retries than entries.
    pub fn retry_backoff_secs(mut self, secs: Vec<u64>) -> Self {
        self.retry_backoff_secs = secs;
        self
    }

    pub fn build(self) -> Result<AssetClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(DEFAULT_REFERER));
        let inner = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;
        let backoff_secs = if self.retry_backoff_secs.is_empty() {
            DEFAULT_BACKOFF_SECS.to_vec()
        } else {
            self.retry_backoff_secs
        };
        Ok(AssetClient {
            inner,
            retry_count: self.retry_count,
            backoff_secs,
        })
    }
}
