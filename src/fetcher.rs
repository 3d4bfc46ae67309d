//! HTTP fetcher for downloading feed sources.

use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::FeedSource;
use crate::utils::domain_count;

const TIMEOUT_SECS: u64 = 30;

/// Maximum size per downloaded feed file (30 MB). The largest common
/// blocklists are a few MB, so this leaves ample margin.
const MAX_SOURCE_SIZE: usize = 30 * 1024 * 1024;

/// Maximum total size for all downloads combined (150 MB)
const MAX_TOTAL_SIZE: usize = 150 * 1024 * 1024;

/// Maximum concurrent downloads across one feed's sources
const MAX_CONCURRENT_DOWNLOADS: usize = 6;

/// Raw body of one fetched source. An empty body means the source failed
/// and the batch proceeds without it.
#[derive(Debug)]
pub struct FetchResult {
    pub name: String,
    pub body: String,
}

/// HTTP client for fetching feed sources.
pub struct Fetcher {
    client: Client,
    /// Cumulative download size tracker (thread-safe for concurrent fetches)
    total_downloaded: AtomicUsize,
}

impl Fetcher {
    /// Create a new fetcher with default settings.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(format!("gatewarden/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            total_downloaded: AtomicUsize::new(0),
        })
    }

    /// Fetch a single source, best-effort.
    ///
    /// Feeds are non-critical, so there is no retry here: a failure is
    /// logged and yields an empty body instead of aborting the batch.
    pub async fn fetch_source(&self, source: &FeedSource) -> FetchResult {
        info!("Fetching {}...", source.name);

        let body = match self.fetch_once(&source.url).await {
            Ok(body) => {
                info!(
                    "Fetched {} - {} lines",
                    source.name,
                    domain_count(body.lines().count())
                );
                body
            }
            Err(e) => {
                warn!("Failed to fetch {}: {e:#}", source.name);
                String::new()
            }
        };

        FetchResult {
            name: source.name.clone(),
            body,
        }
    }

    /// Fetch all of a feed's sources concurrently with limited parallelism.
    pub async fn fetch_sources(&self, sources: &[FeedSource]) -> Vec<FetchResult> {
        use futures::stream::{self, StreamExt};

        stream::iter(sources.iter().map(|source| self.fetch_source(source)))
            .buffer_unordered(MAX_CONCURRENT_DOWNLOADS)
            .collect()
            .await
    }

    /// Fetch one URL with size validation.
    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status());
        }

        if let Some(content_length) = response.content_length() {
            if content_length as usize > MAX_SOURCE_SIZE {
                anyhow::bail!(
                    "Response too large: {} bytes (max: {} bytes)",
                    content_length,
                    MAX_SOURCE_SIZE
                );
            }
        }

        let body = response.text().await.context("Failed to read response body")?;

        // Content-Length may have been absent or wrong; check again.
        if body.len() > MAX_SOURCE_SIZE {
            anyhow::bail!(
                "Downloaded content too large: {} bytes (max: {} bytes)",
                body.len(),
                MAX_SOURCE_SIZE
            );
        }

        let new_total = self
            .total_downloaded
            .fetch_add(body.len(), Ordering::Relaxed)
            + body.len();
        if new_total > MAX_TOTAL_SIZE {
            anyhow::bail!(
                "Cumulative download limit exceeded: {} bytes (max: {} bytes)",
                new_total,
                MAX_TOTAL_SIZE
            );
        }

        Ok(body)
    }
}

// Default is intentionally not implemented for Fetcher because new() can
// fail and we want explicit error handling.
