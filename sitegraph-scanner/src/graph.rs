use crate::result::VisitRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

type Outcome = std::result::Result<Vec<String>, String>;

#[derive(Debug)]
struct Node {
    url: String,
    depth: usize,
    outcome: OnceLock<Outcome>,
}

#[derive(Debug, Default)]
struct Index {
    by_url: HashMap<String, usize>,
    nodes: Vec<Arc<Node>>,
}

/// Shared adjacency structure built during a crawl.
///
/// The index lock is only held for the admit-and-create step. Links are
/// written afterwards through the [`Admission`] handle, which only the
/// winning caller of [`SiteGraph::try_admit`] ever holds.
#[derive(Debug)]
pub struct SiteGraph {
    max_depth: usize,
    index: Mutex<Index>,
}

/// Proof of having won admission for a URL. Consumed by the single write of
/// the page's outcome.
#[derive(Debug)]
pub struct Admission {
    node: Arc<Node>,
}

impl Admission {
    pub fn set_outbound_links(self, links: Vec<String>) {
        // The handle is consumed here, so this is the only write to the cell.
        let _ = self.node.outcome.set(Ok(links));
    }

    pub fn mark_failed(self, reason: String) {
        let _ = self.node.outcome.set(Err(reason));
    }
}

impl SiteGraph {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            index: Mutex::new(Index::default()),
        }
    }

    /// Atomic check-and-insert. Returns a handle only to the caller that
    /// created the node; everyone else (duplicate or too deep) gets `None`.
    pub fn try_admit(&self, url: &str, depth: usize) -> Option<Admission> {
        if depth >= self.max_depth {
            return None;
        }

        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        if index.by_url.contains_key(url) {
            return None;
        }

        let node = Arc::new(Node {
            url: url.to_string(),
            depth,
            outcome: OnceLock::new(),
        });
        let position = index.nodes.len();
        index.nodes.push(node.clone());
        index.by_url.insert(url.to_string(), position);

        Some(Admission { node })
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_url
            .contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .nodes
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every node in admission order. Pages whose fetch has not
    /// resolved yet show up as `Pending` with no links.
    pub fn snapshot(&self) -> Vec<VisitRecord> {
        let nodes = self
            .index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .nodes
            .clone();

        nodes
            .iter()
            .map(|node| match node.outcome.get() {
                None => VisitRecord::new(node.url.clone(), node.depth),
                Some(Ok(links)) => {
                    VisitRecord::with_links(node.url.clone(), node.depth, links.clone())
                }
                Some(Err(reason)) => {
                    VisitRecord::with_error(node.url.clone(), node.depth, reason.clone())
                }
            })
            .collect()
    }
}
