use serde::{Deserialize, Serialize};

/// A discovered link waiting for a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    pub url: String,
    pub depth: usize,
}

impl CrawlJob {
    pub fn new(url: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }
}

/// Where an admitted page is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum VisitState {
    /// Admitted, fetch not resolved yet.
    Pending,
    Fetched,
    Failed(String),
}

impl VisitState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, VisitState::Pending)
    }
}

/// One node of the site graph, as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub url: String,
    pub depth: usize,
    pub outbound_links: Vec<String>,
    pub state: VisitState,
}

impl VisitRecord {
    pub fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            depth,
            outbound_links: Vec::new(),
            state: VisitState::Pending,
        }
    }

    pub fn with_links(url: String, depth: usize, outbound_links: Vec<String>) -> Self {
        Self {
            url,
            depth,
            outbound_links,
            state: VisitState::Fetched,
        }
    }

    pub fn with_error(url: String, depth: usize, error: String) -> Self {
        Self {
            url,
            depth,
            outbound_links: Vec::new(),
            state: VisitState::Failed(error),
        }
    }

    pub fn out_degree(&self) -> usize {
        self.outbound_links.len()
    }
}
