//! Best-effort preview images scraped from public work pages.
//!
//! Fetches go through a fixed-size permit pool shared by every request of
//! the process. Each submitted fetch resolves to exactly one URL, empty when
//! anything went wrong.

use regex::Regex;
use reqwest::Client;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{Semaphore, oneshot};
use tracing::{Instrument, debug, info_span, warn};

use crate::context::RequestContext;
use crate::error::{Error, Result};

pub const MAX_WORKERS: usize = 10;
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

pub struct OgImageFetcher {
    permits: Arc<Semaphore>,
    max_workers: u32,
    client: Client,
    site_url: String,
    timeout: Duration,
}

impl OgImageFetcher {
    pub fn new(client: Client, site_url: impl Into<String>) -> Self {
        Self::with_limits(client, site_url, MAX_WORKERS, FETCH_TIMEOUT)
    }

    pub fn with_limits(
        client: Client,
        site_url: impl Into<String>,
        max_workers: usize,
        timeout: Duration,
    ) -> Self {
        let max_workers = max_workers.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers: u32::try_from(max_workers).unwrap_or(u32::MAX),
            client,
            site_url: site_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    #[must_use]
    pub fn work_url(&self, work_id: i64) -> String {
        format!("{}/works/{work_id}", self.site_url)
    }

    /// Number of fetches that could start right now.
    #[must_use]
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Takes a worker slot and starts fetching in the background.
    ///
    /// Waits for a free slot unless `ctx` ends first, in which case the
    /// context's error is returned. The returned receiver yields the image
    /// URL, or an empty string when the fetch failed.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        work_id: i64,
    ) -> Result<oneshot::Receiver<String>> {
        let permit = ctx
            .run(Arc::clone(&self.permits).acquire_owned())
            .await
            .map_err(Error::from_context_end)?
            .map_err(|e| Error::internal("image worker pool is closed").with_source(e))?;

        let (tx, rx) = oneshot::channel();
        let client = self.client.clone();
        let url = self.work_url(work_id);
        let fetch_ctx = ctx.with_timeout(self.timeout);

        tokio::spawn(
            async move {
                let _permit = permit;

                let image_url = match fetch_og_image(&client, &fetch_ctx, &url).await {
                    Ok(image_url) => image_url,
                    Err(e) => {
                        warn!(error = %e, "Failed to fetch og:image");
                        String::new()
                    }
                };

                // The caller may have stopped waiting.
                let _ = tx.send(image_url);
            }
            .instrument(info_span!("og_image", work_id)),
        );

        Ok(rx)
    }

    /// Waits until every in-flight fetch has released its slot, then closes
    /// the pool so later submissions fail fast.
    pub async fn drain(&self, ctx: &RequestContext) -> Result<()> {
        let permits = ctx
            .run(self.permits.acquire_many(self.max_workers))
            .await
            .map_err(Error::from_context_end)?
            .map_err(|e| Error::internal("image worker pool is already closed").with_source(e))?;

        permits.forget();
        self.permits.close();
        Ok(())
    }
}

async fn fetch_og_image(client: &Client, ctx: &RequestContext, url: &str) -> Result<String> {
    debug!(url, "Fetching work page");

    let html = ctx
        .run(async {
            client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await
        })
        .await
        .map_err(Error::from_context_end)?
        .map_err(|e| {
            if e.is_timeout() {
                Error::deadline_exceeded().with_source(e)
            } else {
                Error::internal("failed to fetch work page")
                    .with_context("url", url)
                    .with_source(e)
            }
        })?;

    let image_url = extract_og_image(&html).unwrap_or_default();
    debug!(url, image_url = %image_url, "Fetched work page");
    Ok(image_url)
}

struct MetaRegex {
    tag: Regex,
    attr: Regex,
}

impl MetaRegex {
    fn get() -> Option<&'static Self> {
        static INSTANCE: OnceLock<Option<MetaRegex>> = OnceLock::new();
        INSTANCE
            .get_or_init(|| {
                Some(Self {
                    tag: Regex::new(r"(?is)<meta\b([^>]*)>").ok()?,
                    attr: Regex::new(r#"(?s)([A-Za-z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).ok()?,
                })
            })
            .as_ref()
    }
}

/// Returns the `content` of the first `<meta property="og:image">` tag.
#[must_use]
pub fn extract_og_image(html: &str) -> Option<String> {
    let re = MetaRegex::get()?;

    re.tag
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .find_map(|attrs| {
            let mut property = None;
            let mut content = None;
            for cap in re.attr.captures_iter(attrs.as_str()) {
                let value = cap.get(2).or_else(|| cap.get(3)).map_or("", |m| m.as_str());
                match cap[1].to_ascii_lowercase().as_str() {
                    "property" => property = Some(value),
                    "content" => content = Some(value),
                    _ => {}
                }
            }

            match (property, content) {
                (Some("og:image"), Some(content)) => {
                    Some(html_escape::decode_html_entities(content).to_string())
                }
                _ => None,
            }
        })
}
