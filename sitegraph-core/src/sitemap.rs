// Persistable adjacency view of a finished crawl

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sitegraph_scanner::VisitRecord;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMapEntry {
    pub url: String,
    pub links: Vec<String>,
}

/// Source URL -> outbound targets, in the order pages were admitted.
///
/// Serializes as a JSON object whose key order and list order are kept
/// exactly, so exporting the same map twice gives identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteMap {
    pages: Vec<SiteMapEntry>,
    index: HashMap<String, usize>,
}

impl SiteMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[VisitRecord]) -> Self {
        let mut sitemap = Self::new();
        for record in records {
            sitemap.insert(record.url.clone(), record.outbound_links.clone());
        }
        sitemap
    }

    /// Adds a page. Returns `false` (and changes nothing) if the URL is
    /// already a page of this map.
    pub fn insert(&mut self, url: String, links: Vec<String>) -> bool {
        if self.index.contains_key(&url) {
            return false;
        }
        self.index.insert(url.clone(), self.pages.len());
        self.pages.push(SiteMapEntry { url, links });
        true
    }

    pub fn pages(&self) -> impl Iterator<Item = &SiteMapEntry> {
        self.pages.iter()
    }

    pub fn links(&self, url: &str) -> Option<&[String]> {
        self.index
            .get(url)
            .map(|&position| self.pages[position].links.as_slice())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    /// First page admitted, i.e. the crawl seed.
    pub fn seed(&self) -> Option<&str> {
        self.pages.first().map(|page| page.url.as_str())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.pages.iter().map(|page| page.links.len()).sum()
    }
}

impl Serialize for SiteMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pages.len()))?;
        for page in &self.pages {
            map.serialize_entry(&page.url, &page.links)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SiteMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SiteMapVisitor)
    }
}

struct SiteMapVisitor;

impl<'de> Visitor<'de> for SiteMapVisitor {
    type Value = SiteMap;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of page URL to a list of linked URLs")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SiteMap, A::Error> {
        let mut sitemap = SiteMap::new();
        while let Some((url, links)) = access.next_entry::<String, Vec<String>>()? {
            if !sitemap.insert(url.clone(), links) {
                return Err(de::Error::custom(format!("duplicate page '{}'", url)));
            }
        }
        Ok(sitemap)
    }
}
