use crate::error::{FetchError, Result, ScanError};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Sitegraph/0.1 (https://github.com/trapdoorsec/sitegraph)";

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector is valid"));

/// Retrieves a page and returns the absolute links it contains.
///
/// Implementations must report every failure through [`FetchError`]; a crawl
/// treats those as per-page outcomes and keeps going.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_links(&self, url: &str) -> std::result::Result<Vec<String>, FetchError>;
}

/// Fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_user_agent(timeout, DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(timeout: Duration, user_agent: &str) -> Result<Self> {
        if timeout.is_zero() {
            return Err(ScanError::Config(
                "fetch timeout must be greater than zero".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50) // Connection pooling
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_links(&self, url: &str) -> std::result::Result<Vec<String>, FetchError> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        // A missing content type is given the benefit of the doubt.
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(is_html_content_type)
            .unwrap_or(true);

        if !is_html {
            debug!("Skipping non-HTML body of {}", url);
            return Ok(Vec::new());
        }

        let body = response.text().await?;

        Ok(extract_links(&body))
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Absolute `http`/`https` anchor targets in document order.
///
/// Hrefs are kept as written (minus surrounding whitespace) so the same page
/// is keyed identically wherever it is linked from. Repeated links stay
/// repeated.
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    document
        .select(&LINK_SELECTOR)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| is_absolute_http(href))
        .map(str::to_string)
        .collect()
}

fn is_absolute_http(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }
    Url::parse(href)
        .map(|url| url.host_str().is_some())
        .unwrap_or(false)
}
