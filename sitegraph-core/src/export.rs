// Durable output of a crawl: sitemap JSON, analytics JSON, Graphviz DOT

use crate::analytics::LinkAnalytics;
use crate::sitemap::SiteMap;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

pub const SITEMAP_FILE: &str = "sitemap.json";
pub const ANALYTICS_FILE: &str = "analytics.json";
pub const DOT_FILE: &str = "sitemap.dot";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Write `bytes` to `path` through a temp file in the same directory, so a
/// reader never sees a partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    write_atomic(path, &json)
}

pub fn export_sitemap(sitemap: &SiteMap, path: &Path) -> Result<()> {
    write_json_atomic(path, sitemap)?;
    info!("Sitemap with {} pages saved to {}", sitemap.len(), path.display());
    Ok(())
}

pub fn load_sitemap(path: &Path) -> Result<SiteMap> {
    let content = fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}

pub fn write_analytics(analytics: &LinkAnalytics, path: &Path) -> Result<()> {
    write_json_atomic(path, analytics)
}

/// Graphviz rendering of the sitemap. Link targets that are not pages still
/// get a node; repeated links become parallel edges.
pub fn to_dot(sitemap: &SiteMap) -> String {
    let mut graph: DiGraph<&str, &str> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for page in sitemap.pages() {
        node_for(&mut graph, &mut nodes, &page.url);
    }
    for page in sitemap.pages() {
        let source = node_for(&mut graph, &mut nodes, &page.url);
        for link in &page.links {
            let target = node_for(&mut graph, &mut nodes, link);
            graph.add_edge(source, target, "");
        }
    }

    format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}

fn node_for<'a>(
    graph: &mut DiGraph<&'a str, &'a str>,
    nodes: &mut HashMap<&'a str, NodeIndex>,
    url: &'a str,
) -> NodeIndex {
    *nodes.entry(url).or_insert_with(|| graph.add_node(url))
}

pub fn export_dot(sitemap: &SiteMap, path: &Path) -> Result<()> {
    write_atomic(path, to_dot(sitemap).as_bytes())
}

/// Paths of everything written by [`export_all`].
#[derive(Debug, Clone)]
pub struct ExportedFiles {
    pub sitemap: PathBuf,
    pub analytics: PathBuf,
    pub dot: PathBuf,
}

/// Write sitemap, analytics and DOT files into `dir`, creating it if needed.
pub fn export_all(
    sitemap: &SiteMap,
    analytics: &LinkAnalytics,
    dir: &Path,
) -> Result<ExportedFiles> {
    fs::create_dir_all(dir)?;

    let files = ExportedFiles {
        sitemap: dir.join(SITEMAP_FILE),
        analytics: dir.join(ANALYTICS_FILE),
        dot: dir.join(DOT_FILE),
    };

    export_sitemap(sitemap, &files.sitemap)?;
    write_analytics(analytics, &files.analytics)?;
    export_dot(sitemap, &files.dot)?;

    Ok(files)
}
