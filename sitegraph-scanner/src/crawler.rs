use crate::error::{Result, ScanError};
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::graph::SiteGraph;
use crate::result::{CrawlJob, VisitRecord};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_DEPTH: usize = 2;
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;
pub type ResultCallback = Arc<dyn Fn(VisitRecord) + Send + Sync>;

pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    max_depth: usize,
    max_concurrency: usize,
    cancellation: Option<CancellationToken>,
    progress_callback: Option<ProgressCallback>,
    result_callback: Option<ResultCallback>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            max_depth: DEFAULT_MAX_DEPTH,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cancellation: None,
            progress_callback: None,
            result_callback: None,
        }
    }

    /// Crawler that fetches over HTTP with the given per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpFetcher::new(timeout)?)))
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    /// Crawl from `seed` until no admissible work is left and return every
    /// admitted page in admission order.
    ///
    /// Only configuration problems are returned as errors; failed fetches end
    /// up as `Failed` records in the result.
    pub async fn crawl(&self, seed: &str) -> Result<Vec<VisitRecord>> {
        self.validate()?;
        let seed = validate_seed(seed)?;

        info!(
            "Starting crawl of {} with {} workers (max depth {})",
            seed, self.max_concurrency, self.max_depth
        );

        let context = Arc::new(WorkerContext {
            fetcher: self.fetcher.clone(),
            graph: SiteGraph::new(self.max_depth),
            frontier: Frontier::new(CrawlJob::new(seed, 0)),
            cancellation: self.cancellation.clone().unwrap_or_default(),
            progress_callback: self.progress_callback.clone(),
            result_callback: self.result_callback.clone(),
        });

        let worker_handles: Vec<_> = (0..self.max_concurrency)
            .map(|worker_id| tokio::spawn(run_worker(worker_id, context.clone())))
            .collect();

        // A worker that panicked has already handed its job back to the
        // frontier, so the others ran to quiescence and the graph is usable.
        for (worker_id, joined) in futures::future::join_all(worker_handles)
            .await
            .into_iter()
            .enumerate()
        {
            if let Err(e) = joined {
                warn!("Worker {} aborted: {}", worker_id, e);
            }
        }

        let records = context.graph.snapshot();
        info!("Crawl complete. Visited {} pages", records.len());
        Ok(records)
    }

    /// Check depth and concurrency without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(ScanError::Config("max depth must be at least 1".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(ScanError::Config(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_seed(seed: &str) -> Result<String> {
    let seed = seed.trim();
    let parsed =
        Url::parse(seed).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", seed, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScanError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            seed,
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(ScanError::InvalidUrl(format!("{}: missing host", seed)));
    }

    Ok(seed.to_string())
}

struct WorkerContext {
    fetcher: Arc<dyn Fetcher>,
    graph: SiteGraph,
    frontier: Frontier,
    cancellation: CancellationToken,
    progress_callback: Option<ProgressCallback>,
    result_callback: Option<ResultCallback>,
}

async fn run_worker(worker_id: usize, context: Arc<WorkerContext>) {
    debug!("Worker {} started", worker_id);

    while let Some(job) = context.frontier.next_job().await {
        let mut in_flight = InFlight::new(&context.frontier);
        in_flight.discovered = process_job(worker_id, job, &context).await;
    }

    debug!("Worker {} finished", worker_id);
}

/// Admit, fetch and expand a single job. Returns the follow-up jobs.
async fn process_job(worker_id: usize, job: CrawlJob, context: &WorkerContext) -> Vec<CrawlJob> {
    if context.cancellation.is_cancelled() {
        debug!("[Worker {}] Cancelled, dropping {}", worker_id, job.url);
        return Vec::new();
    }

    let Some(admission) = context.graph.try_admit(&job.url, job.depth) else {
        return Vec::new();
    };

    if let Some(ref callback) = context.progress_callback {
        callback(worker_id, job.url.clone());
    }

    match context.fetcher.fetch_links(&job.url).await {
        Ok(links) => {
            debug!(
                "[Worker {}] {} (depth {}) has {} links",
                worker_id,
                job.url,
                job.depth,
                links.len()
            );

            let next_depth = job.depth + 1;
            let discovered = if context.cancellation.is_cancelled() {
                Vec::new()
            } else {
                links
                    .iter()
                    .map(|link| CrawlJob::new(link.clone(), next_depth))
                    .collect()
            };

            if let Some(ref callback) = context.result_callback {
                callback(VisitRecord::with_links(
                    job.url.clone(),
                    job.depth,
                    links.clone(),
                ));
            }
            admission.set_outbound_links(links);

            discovered
        }
        Err(e) => {
            warn!("Crawl error for {}: {}", job.url, e);

            if let Some(ref callback) = context.result_callback {
                callback(VisitRecord::with_error(
                    job.url.clone(),
                    job.depth,
                    e.to_string(),
                ));
            }
            admission.mark_failed(e.to_string());

            Vec::new()
        }
    }
}

/// Shared work queue plus the count of jobs currently held by workers.
/// Empty queue with nothing in flight means the crawl is done.
struct Frontier {
    state: Mutex<FrontierState>,
    changed: Notify,
}

struct FrontierState {
    queue: VecDeque<CrawlJob>,
    in_flight: usize,
}

impl Frontier {
    fn new(seed: CrawlJob) -> Self {
        Self {
            state: Mutex::new(FrontierState {
                queue: VecDeque::from([seed]),
                in_flight: 0,
            }),
            changed: Notify::new(),
        }
    }

    /// Next job to work on, or `None` once the crawl is quiescent.
    async fn next_job(&self) -> Option<CrawlJob> {
        loop {
            // Register interest before looking at the state so a wake-up
            // between the check and the await is not lost.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(job) = state.queue.pop_front() {
                    state.in_flight += 1;
                    return Some(job);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    fn finish_job(&self, discovered: Vec<CrawlJob>) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.queue.extend(discovered);
            state.in_flight -= 1;
        }
        self.changed.notify_waiters();
    }
}

/// Returns the job slot to the frontier even if processing panics, so the
/// remaining workers still reach quiescence.
struct InFlight<'a> {
    frontier: &'a Frontier,
    discovered: Vec<CrawlJob>,
}

impl<'a> InFlight<'a> {
    fn new(frontier: &'a Frontier) -> Self {
        Self {
            frontier,
            discovered: Vec::new(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.frontier
            .finish_job(std::mem::take(&mut self.discovered));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::result::VisitState;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    /// In-memory site: URL -> links, or a failure.
    #[derive(Default)]
    struct StubFetcher {
        pages: HashMap<String, std::result::Result<Vec<String>, FetchError>>,
        calls: Mutex<HashMap<String, usize>>,
        delay: Option<Duration>,
        cancel_on_fetch: Option<CancellationToken>,
    }

    impl StubFetcher {
        fn page(mut self, url: &str, links: &[&str]) -> Self {
            self.pages.insert(
                url.to_string(),
                Ok(links.iter().map(|l| l.to_string()).collect()),
            );
            self
        }

        fn failing(mut self, url: &str, error: FetchError) -> Self {
            self.pages.insert(url.to_string(), Err(error));
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls_for(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch_links(
            &self,
            url: &str,
        ) -> std::result::Result<Vec<String>, FetchError> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(ref token) = self.cancel_on_fetch {
                token.cancel();
            }
            self.pages
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::Status(404)))
        }
    }

    fn as_map(records: &[VisitRecord]) -> HashMap<String, Vec<String>> {
        records
            .iter()
            .map(|r| (r.url.clone(), r.outbound_links.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_depth_one_records_only_the_seed() {
        let fetcher = StubFetcher::default().page(
            "https://example.com",
            &["https://example.com/a", "https://example.com/b"],
        );
        let crawler = Crawler::new(Arc::new(fetcher)).with_max_depth(1);

        let records = crawler.crawl("https://example.com").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://example.com");
        assert_eq!(
            records[0].outbound_links,
            vec!["https://example.com/a", "https://example.com/b"]
        );
        assert_eq!(records[0].state, VisitState::Fetched);
    }

    #[tokio::test]
    async fn test_failed_child_is_recorded_without_edges() {
        let fetcher = StubFetcher::default()
            .page("https://seed.example", &["https://seed.example/a"])
            .failing("https://seed.example/a", FetchError::Timeout);
        let crawler = Crawler::new(Arc::new(fetcher)).with_max_depth(2);

        let records = crawler.crawl("https://seed.example").await.unwrap();
        let graph = as_map(&records);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph["https://seed.example"], vec!["https://seed.example/a"]);
        assert!(graph["https://seed.example/a"].is_empty());

        let child = records
            .iter()
            .find(|r| r.url == "https://seed.example/a")
            .unwrap();
        assert_eq!(child.depth, 1);
        assert_eq!(child.state, VisitState::Failed("request timed out".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_links_are_preserved() {
        let fetcher = StubFetcher::default().page(
            "https://example.com",
            &["https://x.example", "https://x.example", "https://y.example"],
        );
        let crawler = Crawler::new(Arc::new(fetcher)).with_max_depth(1);

        let records = crawler.crawl("https://example.com").await.unwrap();

        assert_eq!(
            records[0].outbound_links,
            vec!["https://x.example", "https://x.example", "https://y.example"]
        );
    }

    #[tokio::test]
    async fn test_depth_bound_and_uniqueness_with_cycles() {
        let fetcher = StubFetcher::default()
            .page("https://a.example", &["https://b.example", "https://a.example"])
            .page("https://b.example", &["https://c.example", "https://a.example"])
            .page("https://c.example", &["https://d.example", "https://b.example"])
            .page("https://d.example", &["https://a.example"]);
        let fetcher = Arc::new(fetcher);
        let crawler = Crawler::new(fetcher.clone())
            .with_max_depth(3)
            .with_max_concurrency(4);

        let records = crawler.crawl("https://a.example").await.unwrap();

        let urls: HashSet<&str> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls.len(), records.len(), "duplicate node in graph");
        assert_eq!(
            urls,
            HashSet::from(["https://a.example", "https://b.example", "https://c.example"])
        );
        assert!(records.iter().all(|r| r.depth < 3));
        assert_eq!(fetcher.calls_for("https://d.example"), 0);
        for url in ["https://a.example", "https://b.example", "https://c.example"] {
            assert_eq!(fetcher.calls_for(url), 1, "{} fetched more than once", url);
        }
    }

    #[tokio::test]
    async fn test_concurrent_discovery_admits_once() {
        let mut fetcher = StubFetcher::default();
        let children: Vec<String> = (0..20)
            .map(|i| format!("https://example.com/page{}", i))
            .collect();
        let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
        fetcher = fetcher.page("https://example.com", &child_refs);
        for child in &children {
            fetcher = fetcher.page(child, &["https://example.com/shared"]);
        }
        let fetcher = Arc::new(
            fetcher
                .page("https://example.com/shared", &[])
                .with_delay(Duration::from_millis(5)),
        );

        let crawler = Crawler::new(fetcher.clone())
            .with_max_depth(3)
            .with_max_concurrency(8);
        let records = crawler.crawl("https://example.com").await.unwrap();

        let shared: Vec<_> = records
            .iter()
            .filter(|r| r.url == "https://example.com/shared")
            .collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].depth, 2);
        assert_eq!(fetcher.calls_for("https://example.com/shared"), 1);
        assert_eq!(records.len(), 22);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let fetcher = StubFetcher::default()
            .page(
                "https://example.com",
                &["https://example.com/a", "https://example.com/b", "https://example.com/c"],
            )
            .page("https://example.com/a", &["https://example.com/a1"])
            .failing("https://example.com/b", FetchError::Connect("refused".to_string()))
            .page("https://example.com/c", &["https://example.com/c1"]);
        let crawler = Crawler::new(Arc::new(fetcher))
            .with_max_depth(2)
            .with_max_concurrency(3);

        let records = crawler.crawl("https://example.com").await.unwrap();
        let graph = as_map(&records);

        assert_eq!(graph["https://example.com/a"], vec!["https://example.com/a1"]);
        assert!(graph["https://example.com/b"].is_empty());
        assert_eq!(graph["https://example.com/c"], vec!["https://example.com/c1"]);
    }

    #[tokio::test]
    async fn test_concurrency_does_not_change_the_graph() {
        let build = || {
            StubFetcher::default()
                .page(
                    "https://s.example",
                    &["https://s.example/1", "https://s.example/2", "https://ext.example"],
                )
                .page("https://s.example/1", &["https://s.example/2", "https://s.example/3"])
                .page("https://s.example/2", &["https://s.example/1", "https://s.example/4"])
                .page("https://s.example/3", &["https://s.example"])
                .failing("https://ext.example", FetchError::Status(500))
                .with_delay(Duration::from_millis(2))
        };

        let serial = Crawler::new(Arc::new(build()))
            .with_max_depth(3)
            .with_max_concurrency(1)
            .crawl("https://s.example")
            .await
            .unwrap();
        let parallel = Crawler::new(Arc::new(build()))
            .with_max_depth(3)
            .with_max_concurrency(10)
            .crawl("https://s.example")
            .await
            .unwrap();

        assert_eq!(as_map(&serial), as_map(&parallel));
        assert_eq!(serial.len(), 6);
    }

    #[tokio::test]
    async fn test_invalid_configuration_is_rejected() {
        let crawler = Crawler::new(Arc::new(StubFetcher::default())).with_max_depth(0);
        assert!(matches!(
            crawler.crawl("https://example.com").await,
            Err(ScanError::Config(_))
        ));

        let crawler = Crawler::new(Arc::new(StubFetcher::default())).with_max_concurrency(0);
        assert!(matches!(
            crawler.crawl("https://example.com").await,
            Err(ScanError::Config(_))
        ));

        let crawler = Crawler::new(Arc::new(StubFetcher::default()));
        assert!(matches!(
            crawler.crawl("not a url").await,
            Err(ScanError::InvalidUrl(_))
        ));
        assert!(matches!(
            crawler.crawl("ftp://example.com").await,
            Err(ScanError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        assert!(matches!(
            Crawler::with_timeout(Duration::ZERO),
            Err(ScanError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_admits_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let fetcher = Arc::new(StubFetcher::default().page("https://example.com", &[]));
        let crawler = Crawler::new(fetcher.clone()).with_cancellation(token);

        let records = crawler.crawl("https://example.com").await.unwrap();

        assert!(records.is_empty());
        assert_eq!(fetcher.calls_for("https://example.com"), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_expansion_after_inflight_fetch() {
        let token = CancellationToken::new();
        let mut fetcher = StubFetcher::default()
            .page("https://example.com", &["https://example.com/a", "https://example.com/b"]);
        fetcher.cancel_on_fetch = Some(token.clone());
        let fetcher = Arc::new(fetcher);

        let crawler = Crawler::new(fetcher.clone())
            .with_max_depth(3)
            .with_cancellation(token);
        let records = crawler.crawl("https://example.com").await.unwrap();

        // The in-flight fetch completes and its links are kept, but nothing
        // new is admitted.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outbound_links.len(), 2);
        assert_eq!(fetcher.calls_for("https://example.com/a"), 0);
    }

    #[tokio::test]
    async fn test_result_callback_sees_every_resolved_page() {
        let fetcher = StubFetcher::default()
            .page("https://example.com", &["https://example.com/a"])
            .failing("https://example.com/a", FetchError::Status(503));
        let seen: Arc<Mutex<Vec<VisitRecord>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let crawler = Crawler::new(Arc::new(fetcher))
            .with_max_depth(2)
            .with_result_callback(Arc::new(move |record| {
                seen_clone.lock().unwrap().push(record);
            }));
        crawler.crawl("https://example.com").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|r| r.state.is_resolved()));
    }

    #[tokio::test]
    async fn test_panicking_callback_keeps_the_rest_of_the_graph() {
        let fetcher = StubFetcher::default()
            .page("https://example.com", &["https://example.com/a", "https://example.com/b"])
            .page("https://example.com/a", &[])
            .page("https://example.com/b", &[]);

        let crawler = Crawler::new(Arc::new(fetcher))
            .with_max_depth(2)
            .with_max_concurrency(2)
            .with_result_callback(Arc::new(|record| {
                if record.url == "https://example.com/b" {
                    panic!("callback failure");
                }
            }));

        let records = crawler.crawl("https://example.com").await.unwrap();
        let graph = as_map(&records);

        assert_eq!(records.len(), 3);
        assert_eq!(graph["https://example.com"].len(), 2);
        let b = records
            .iter()
            .find(|r| r.url == "https://example.com/b")
            .unwrap();
        assert_eq!(b.state, VisitState::Pending);
        let a = records
            .iter()
            .find(|r| r.url == "https://example.com/a")
            .unwrap();
        assert_eq!(a.state, VisitState::Fetched);
    }

    /// Test that multiple workers are actually used during crawling
    #[tokio::test]
    async fn test_multiple_workers_are_used() {
        let mut fetcher = StubFetcher::default();
        let pages: Vec<String> = (1..=10)
            .map(|i| format!("https://example.com/page{}", i))
            .collect();
        let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
        fetcher = fetcher.page("https://example.com", &page_refs);
        for page in &pages {
            fetcher = fetcher.page(page, &[]);
        }
        let fetcher = fetcher.with_delay(Duration::from_millis(20));

        let worker_activity: Arc<Mutex<HashMap<usize, Vec<String>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let worker_activity_clone = worker_activity.clone();

        let crawler = Crawler::new(Arc::new(fetcher))
            .with_max_depth(2)
            .with_max_concurrency(4)
            .with_progress_callback(Arc::new(move |worker_id, url| {
                worker_activity_clone
                    .lock()
                    .unwrap()
                    .entry(worker_id)
                    .or_default()
                    .push(url);
            }));

        let results = crawler.crawl("https://example.com").await.unwrap();
        assert_eq!(results.len(), 11);

        let activity = worker_activity.lock().unwrap();
        let workers_used = activity.keys().count();
        assert!(
            workers_used > 1,
            "Expected multiple workers, but only {} worker(s) processed URLs. Distribution: {:?}",
            workers_used,
            activity.iter().map(|(k, v)| (k, v.len())).collect::<Vec<_>>()
        );
    }

    /// Test basic link discovery against a real HTTP server
    #[tokio::test]
    async fn test_link_discovery_over_http() {
        let mock_server = MockServer::start().await;

        let root_html = format!(
            r#"<html><body>
                <a href="{0}/page1">Page 1</a>
                <a href="{0}/page2">Page 2</a>
                <a href="/relative">Ignored</a>
            </body></html>"#,
            mock_server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(root_html.as_bytes()),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/page1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(b"<html><body>P1</body></html>".as_slice()),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/page2"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let crawler = Crawler::with_timeout(Duration::from_secs(5))
            .unwrap()
            .with_max_depth(2)
            .with_max_concurrency(2);

        let results = crawler.crawl(&mock_server.uri()).await.unwrap();
        let graph = as_map(&results);

        assert_eq!(results.len(), 3);
        assert_eq!(
            graph[&mock_server.uri()],
            vec![
                format!("{}/page1", mock_server.uri()),
                format!("{}/page2", mock_server.uri())
            ]
        );
        let page2 = results
            .iter()
            .find(|r| r.url.ends_with("/page2"))
            .unwrap();
        assert_eq!(page2.state, VisitState::Failed("HTTP status 500".to_string()));
    }
}
