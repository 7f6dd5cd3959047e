use crate::sitemap::SiteMap;
use indicatif::{ProgressBar, ProgressStyle};
use sitegraph_scanner::normalize::{DEFAULT_PROBE_TIMEOUT, normalize_seed};
use sitegraph_scanner::{Crawler, HttpFetcher, ScanError, VisitRecord};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    /// Seed as typed by the user; a missing scheme is resolved before crawling.
    pub url: String,
    pub threads: usize,
    pub max_depth: usize,
    pub timeout: Duration,
    pub show_progress_bars: bool,
    pub cancellation: Option<CancellationToken>,
    /// Called once per page as soon as its fetch resolves.
    pub result_callback: Option<CrawlResultCallback>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            threads: sitegraph_scanner::crawler::DEFAULT_MAX_CONCURRENCY,
            max_depth: sitegraph_scanner::crawler::DEFAULT_MAX_DEPTH,
            timeout: Duration::from_secs(20),
            show_progress_bars: false,
            cancellation: None,
            result_callback: None,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callback receiving each resolved page
pub type CrawlResultCallback = Arc<dyn Fn(VisitRecord) + Send + Sync>;

/// Everything a finished crawl produced.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// The normalized seed the crawl actually started from.
    pub seed: String,
    pub records: Vec<VisitRecord>,
    pub sitemap: SiteMap,
}

impl CrawlOutcome {
    pub fn failed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.state, sitegraph_scanner::VisitState::Failed(_)))
            .count()
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Normalize the seed, crawl it over HTTP and return the resulting graph.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlOutcome, ScanError> {
    let CrawlOptions {
        url,
        threads,
        max_depth,
        timeout,
        show_progress_bars,
        cancellation,
        result_callback,
    } = options;

    // Reject bad settings before the seed probe sends anything
    let fetcher = Arc::new(HttpFetcher::new(timeout)?);
    let mut crawler = Crawler::new(fetcher.clone())
        .with_max_depth(max_depth)
        .with_max_concurrency(threads);
    crawler.validate()?;

    let seed = normalize_seed(fetcher.client(), &url, DEFAULT_PROBE_TIMEOUT).await;

    if let Some(ref callback) = progress_callback
        && seed != url.trim()
    {
        callback(format!("Resolved {} to {}", url.trim(), seed));
    }

    // Set up single progress bar for overall crawl progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(pb)
    } else {
        None
    };

    let processed_count = Arc::new(AtomicUsize::new(0));

    if let Some(token) = cancellation {
        crawler = crawler.with_cancellation(token);
    }

    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let count_clone = processed_count.clone();
        crawler = crawler.with_progress_callback(Arc::new(move |_worker_id, url| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!(
                "Crawling... {} pages [{}]",
                count,
                extract_url_path(&url)
            ));
        }));
    }

    if let Some(callback) = result_callback {
        crawler = crawler.with_result_callback(callback);
    }

    let result = crawler.crawl(&seed).await;

    if let Some(ref pb) = progress_bar {
        match result {
            Ok(ref records) => {
                pb.finish_with_message(format!("Crawl complete! {} pages visited", records.len()))
            }
            Err(_) => pb.finish_and_clear(),
        }
    }

    let records = result?;
    let sitemap = SiteMap::from_records(&records);

    Ok(CrawlOutcome {
        seed,
        records,
        sitemap,
    })
}
