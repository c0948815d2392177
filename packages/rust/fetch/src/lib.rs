//! HTTP content fetcher component.
//!
//! [`UrlFetcher`] takes a list of URLs and produces raw page contents, with
//! bounded concurrency, per-request timeouts, optional pacing, and SSRF
//! protection against private/loopback targets. Any failed fetch fails the
//! component — retry policy, if desired, belongs to the caller's own
//! component implementation, not the graph runner.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use ragline_graph::Component;
use ragline_shared::{
    FetchConfig, FieldSpec, FieldType, InputMap, OutputMap, Page, RaglineError, Result, Value,
};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("ragline/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// UrlFetcher
// ---------------------------------------------------------------------------

/// Fetches a list of URLs into raw [`Page`]s.
///
/// Inputs: `urls: Urls` (required). Outputs: `pages: Pages`, in input order.
pub struct UrlFetcher {
    client: Client,
    concurrency: usize,
    delay_ms: u64,
    /// Allow localhost/private IPs (for tests against mock servers).
    allow_localhost: bool,
}

impl UrlFetcher {
    /// Create a fetcher from the fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RaglineError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            concurrency: config.concurrency.max(1) as usize,
            delay_ms: config.delay_ms,
            allow_localhost: false,
        })
    }

    /// Allow fetching localhost/private IPs (for tests against mock servers).
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    async fn fetch_all(&self, urls: &[Url]) -> Result<Vec<Page>> {
        for url in urls {
            if !self.allow_localhost && is_ssrf_target(url) {
                warn!(%url, "SSRF protection: blocked");
                return Err(RaglineError::Network(format!(
                    "{url}: refusing to fetch private/loopback target"
                )));
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(urls.len());

        for url in urls {
            let client = self.client.clone();
            let sem = semaphore.clone();
            let delay = self.delay_ms;
            let url = url.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                if delay > 0 {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                fetch_page(&client, &url).await
            }));
        }

        // Awaiting in input order keeps the output order deterministic.
        let mut pages = Vec::with_capacity(handles.len());
        for handle in handles {
            let page = handle
                .await
                .map_err(|e| RaglineError::Network(format!("fetch task failed: {e}")))??;
            pages.push(page);
        }

        Ok(pages)
    }
}

impl Component for UrlFetcher {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("urls", FieldType::Urls)]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("pages", FieldType::Pages)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let urls = inputs
                .get("urls")
                .and_then(Value::as_urls)
                .ok_or_else(|| RaglineError::validation("fetcher input 'urls' is not a URL list"))?
                .to_vec();

            debug!(count = urls.len(), "fetching urls");
            let pages = self.fetch_all(&urls).await?;

            let mut out = OutputMap::new();
            out.insert("pages".into(), Value::Pages(pages));
            Ok(out)
        })
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// Fetch a single page.
async fn fetch_page(client: &Client, url: &Url) -> Result<Page> {
    debug!(%url, "fetching page");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| RaglineError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RaglineError::Network(format!("{url}: HTTP {status}")));
    }

    let media_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    let body = response
        .bytes()
        .await
        .map_err(|e| RaglineError::Network(format!("{url}: body read failed: {e}")))?;

    Ok(Page {
        url: url.to_string(),
        body: body.to_vec(),
        media_type,
        status: status.as_u16(),
    })
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    // Block private/loopback IPs
    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        // Block known local hostnames
        if host == "localhost"
            || host == "127.0.0.1"
            || host == "[::1]"
            || host.ends_with(".local")
            || host.ends_with(".internal")
        {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
