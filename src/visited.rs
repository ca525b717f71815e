use std::collections::BTreeMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub url: String,
    pub content: String,
    pub headers: Vec<String>,
}

// Dedup gate and result aggregation, keyed by the exact URL string. The
// reserve check and the later put are not atomic together: two tasks racing
// on the same URL cost at most one duplicate fetch, and the key stays unique
// either way.
#[derive(Default)]
pub struct VisitedStore {
    pages: DashMap<String, CrawlRecord>,
}

impl VisitedStore {
    pub fn new() -> Self {
        Self {
            pages: DashMap::new(),
        }
    }

    pub fn try_reserve(&self, url: &str) -> bool {
        !self.pages.contains_key(url)
    }

    pub fn put(&self, record: CrawlRecord) {
        self.pages.insert(record.url.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, CrawlRecord> {
        self.pages
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
