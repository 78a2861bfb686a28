use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::error::{IndexError, Result};
use crate::store::BlockStore;

/// Store paths of the three JSON signal tables.
#[derive(Debug, Clone)]
pub struct SignalPaths {
    pub page_rank: String,
    pub page_views: String,
    pub titles: String,
}

impl Default for SignalPaths {
    fn default() -> Self {
        Self {
            page_rank: "pr/pr.json".into(),
            page_views: "pv/pv.json".into(),
            titles: "titles/titles.json".into(),
        }
    }
}

/// Precomputed per-document tables, keyed by the doc-id rendered as a string.
#[derive(Debug, Default, Clone)]
pub struct SignalTables {
    pub page_rank: HashMap<String, f64>,
    pub page_views: HashMap<String, u64>,
    pub titles: HashMap<String, String>,
}

fn parse<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| IndexError::Signals(format!("{path}: {e}")))
}

impl SignalTables {
    pub fn load(store: &dyn BlockStore, paths: &SignalPaths) -> Result<Self> {
        let page_rank: HashMap<String, f64> = parse(&paths.page_rank, &store.fetch(&paths.page_rank)?)?;
        let page_views: HashMap<String, u64> = parse(&paths.page_views, &store.fetch(&paths.page_views)?)?;
        let titles: HashMap<String, String> = parse(&paths.titles, &store.fetch(&paths.titles)?)?;
        let tables = Self { page_rank, page_views, titles };
        tracing::info!(
            page_rank = tables.page_rank.len(),
            page_views = tables.page_views.len(),
            titles = tables.titles.len(),
            "loaded signal tables"
        );
        Ok(tables)
    }

    /// Title for a result row; unknown ids render as an empty title.
    pub fn title(&self, key: &str) -> &str {
        self.titles.get(key).map(String::as_str).unwrap_or("")
    }

    /// Page rank of every known id, in input order. Unknown ids are skipped.
    pub fn page_rank_of<K: AsRef<str>>(&self, ids: &[K]) -> Vec<f64> {
        ids.iter().filter_map(|id| self.page_rank.get(id.as_ref()).copied()).collect()
    }

    /// Page views of every known id, in input order. Unknown ids are skipped.
    pub fn page_views_of<K: AsRef<str>>(&self, ids: &[K]) -> Vec<u64> {
        ids.iter().filter_map(|id| self.page_views.get(id.as_ref()).copied()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        let s = MemoryStore::new();
        s.put("pr/pr.json", br#"{"1": 0.5, "2": 0.25}"#).unwrap();
        s.put("pv/pv.json", br#"{"1": 100}"#).unwrap();
        s.put("titles/titles.json", br#"{"1": "Cat", "2": "Dog"}"#).unwrap();
        s
    }

    #[test]
    fn lookups_skip_unknown_ids() {
        let t = SignalTables::load(&store(), &SignalPaths::default()).unwrap();
        assert_eq!(t.page_rank_of(&["2", "9", "1"]), vec![0.25, 0.5]);
        assert_eq!(t.page_views_of(&["2", "1"]), vec![100]);
        assert_eq!(t.title("2"), "Dog");
        assert_eq!(t.title("3"), "");
    }

    #[test]
    fn malformed_table_is_reported() {
        let s = store();
        s.put("pv/pv.json", b"[1,2").unwrap();
        let err = SignalTables::load(&s, &SignalPaths::default()).unwrap_err();
        assert!(matches!(err, IndexError::Signals(_)));
    }
}
