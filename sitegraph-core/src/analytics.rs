// Structural metrics over a finished sitemap

use crate::sitemap::SiteMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use url::Url;

pub const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedPage {
    pub url: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedDomain {
    pub domain: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAnalytics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_host: Option<String>,
    pub total_pages: usize,
    pub total_links: usize,
    pub internal_link_count: usize,
    pub external_link_count: usize,
    /// Out-degree -> number of pages with that many links. Pages without
    /// links are left out.
    pub out_degree_histogram: BTreeMap<usize, usize>,
    pub top_inbound_pages: Vec<RankedPage>,
    pub top_external_domains: Vec<RankedDomain>,
    /// Distinct link targets that never became pages themselves.
    pub dangling_targets: usize,
}

/// Counter that remembers the order keys were first seen in, so ranking ties
/// are broken by first encounter.
#[derive(Debug, Default)]
struct OrderedCounter {
    counts: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl OrderedCounter {
    fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&position) => self.counts[position].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.counts.len());
                self.counts.push((key.to_string(), 1));
            }
        }
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        self.counts.iter().map(|(key, _)| key.as_str())
    }

    fn most_common(&self, n: usize) -> Vec<(String, usize)> {
        let mut ranked = self.counts.clone();
        // Stable, so equal counts keep first-seen order.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Host component of a URL, lowercased. `None` for anything unparsable or
/// host-less.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.to_ascii_lowercase()))
}

pub fn analyze(sitemap: &SiteMap, base_url: &str) -> LinkAnalytics {
    analyze_with_limit(sitemap, base_url, TOP_N)
}

/// Compute link metrics for `sitemap`, treating links to `base_url`'s host as
/// internal. Pure: the same input always yields the same output.
pub fn analyze_with_limit(sitemap: &SiteMap, base_url: &str, top_n: usize) -> LinkAnalytics {
    let base_host = host_of(base_url);

    let mut internal_link_count = 0;
    let mut external_link_count = 0;
    let mut out_degree_histogram = BTreeMap::new();
    let mut inbound = OrderedCounter::default();
    let mut external_domains = OrderedCounter::default();

    for page in sitemap.pages() {
        if !page.links.is_empty() {
            *out_degree_histogram.entry(page.links.len()).or_insert(0) += 1;
        }

        for link in &page.links {
            inbound.add(link);

            let target_host = host_of(link);
            let is_internal = match (&target_host, &base_host) {
                (Some(target), Some(base)) => target == base,
                _ => false,
            };

            if is_internal {
                internal_link_count += 1;
            } else {
                external_link_count += 1;
                if let Some(ref host) = target_host {
                    external_domains.add(host);
                }
            }
        }
    }

    let dangling_targets = inbound.keys().filter(|url| !sitemap.contains(url)).count();

    LinkAnalytics {
        base_host,
        total_pages: sitemap.len(),
        total_links: internal_link_count + external_link_count,
        internal_link_count,
        external_link_count,
        out_degree_histogram,
        top_inbound_pages: inbound
            .most_common(top_n)
            .into_iter()
            .map(|(url, count)| RankedPage { url, count })
            .collect(),
        top_external_domains: external_domains
            .most_common(top_n)
            .into_iter()
            .map(|(domain, count)| RankedDomain { domain, count })
            .collect(),
        dangling_targets,
    }
}
