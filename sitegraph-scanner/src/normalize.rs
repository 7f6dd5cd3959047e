use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Answers whether a secure URL responds at all.
#[async_trait]
pub trait SchemeProbe: Send + Sync {
    async fn responds(&self, url: &str) -> bool;
}

/// HEAD request with its own short timeout. Any response counts, whatever
/// the status.
pub struct HeadProbe {
    client: Client,
    timeout: Duration,
}

impl HeadProbe {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl SchemeProbe for HeadProbe {
    async fn responds(&self, url: &str) -> bool {
        match self.client.head(url).timeout(self.timeout).send().await {
            Ok(response) => {
                debug!("HTTPS probe of {} answered {}", url, response.status());
                true
            }
            Err(e) => {
                debug!("HTTPS probe of {} failed ({})", url, e);
                false
            }
        }
    }
}

/// Turn user input into an absolute URL with an explicit scheme.
///
/// Input that already names a scheme is returned as-is (trimmed). Otherwise
/// `https://` is probed with a HEAD request and kept if the host answers at
/// all; any probe failure falls back to `http://`.
pub async fn normalize_seed(client: &Client, raw: &str, probe_timeout: Duration) -> String {
    normalize_seed_with(&HeadProbe::new(client.clone(), probe_timeout), raw).await
}

pub async fn normalize_seed_with(probe: &dyn SchemeProbe, raw: &str) -> String {
    let raw = raw.trim();

    if has_scheme(raw) {
        return raw.to_string();
    }

    let secure = format!("https://{}", raw);
    if probe.responds(&secure).await {
        secure
    } else {
        debug!("Falling back to http for {}", raw);
        format!("http://{}", raw)
    }
}

fn has_scheme(raw: &str) -> bool {
    match raw.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
