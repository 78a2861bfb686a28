use std::sync::Arc;

use wikisearch_core::fusion::{FusionConfig, MissingSignalPolicy};
use wikisearch_core::signals::SignalPaths;
use wikisearch_core::store::{BlockStore, CachedStore, MemoryStore};
use wikisearch_core::{EngineConfig, Field, IndexBuilder, IndexError, IndexLayout, SearchEngine, SearchHit};

fn build_corpus(store: &dyn BlockStore) {
    let layout = IndexLayout::default();

    let mut body = IndexBuilder::new();
    body.add_document(1, &["cat", "cat", "pad", "pad"]).unwrap();
    body.add_document(2, &["cat", "dog", "dog", "pad"]).unwrap();
    body.add_document(3, &["dog", "pad", "pad", "pad"]).unwrap();
    body.add_document(4, &["pad", "pad"]).unwrap();
    body.flush(store, layout.body).unwrap();

    let mut title = IndexBuilder::new();
    title.add_document(1, &["cat"]).unwrap();
    title.add_document(2, &["cats", "dogs"]).unwrap();
    title.add_document(3, &["dog"]).unwrap();
    title.add_document(4, &["pad"]).unwrap();
    title.flush(store, layout.title).unwrap();

    let mut anchor = IndexBuilder::new();
    anchor.add_document(2, &["cat", "dog"]).unwrap();
    anchor.add_document(3, &["dog"]).unwrap();
    anchor.flush(store, layout.anchor).unwrap();

    store.put("pr/pr.json", br#"{"1": 0.5, "2": 0.25, "3": 1.0, "4": 9.0}"#).unwrap();
    // doc 3 has no page views
    store.put("pv/pv.json", br#"{"1": 100, "2": 400, "4": 7}"#).unwrap();
    store.put("titles/titles.json", br#"{"1": "Cat", "2": "Cats and dogs", "3": "Dog"}"#).unwrap();
}

fn engine(config: EngineConfig) -> SearchEngine {
    let store = Arc::new(MemoryStore::new());
    build_corpus(store.as_ref());
    SearchEngine::open(store, &IndexLayout::default(), &SignalPaths::default(), config).unwrap()
}

fn ids(hits: &[SearchHit]) -> Vec<u32> {
    hits.iter().map(|h| h.0).collect()
}

#[test]
fn body_search_returns_titles_in_rank_order() {
    let e = engine(EngineConfig::default());
    let hits = e.search_body(&["cat", "dog"]).unwrap();
    assert_eq!(hits[0], SearchHit(2, "Cats and dogs".into()));
    assert_eq!(ids(&hits), vec![2, 1, 3]);
}

#[test]
fn title_and_anchor_return_every_match() {
    let e = engine(EngineConfig { result_limit: 1, ..Default::default() });
    assert_eq!(ids(&e.search_title(&["cat", "dog"]).unwrap()), vec![1, 3]);
    assert_eq!(ids(&e.search_anchor(&["cat", "dog"]).unwrap()), vec![2, 3]);
}

#[test]
fn fused_search_drops_docs_without_page_views() {
    let e = engine(EngineConfig::default());
    let hits = e.search(&["cat", "dog"]).unwrap();
    assert!(!ids(&hits).contains(&3));
    assert_eq!(ids(&hits), vec![2, 1]);

    let keep = EngineConfig {
        fusion: FusionConfig { missing_signal: MissingSignalPolicy::Zero, ..Default::default() },
        ..Default::default()
    };
    let e = engine(keep);
    assert!(ids(&e.search(&["cat", "dog"]).unwrap()).contains(&3));
}

#[test]
fn empty_query_matches_nothing() {
    let e = engine(EngineConfig::default());
    for field in [Field::Body, Field::Title, Field::Anchor, Field::Fused] {
        assert!(e.search_field::<&str>(&[], field).unwrap().is_empty());
    }
    assert!(e.search_field(&["unicorn"], Field::Fused).unwrap().is_empty());
}

#[test]
fn signal_lookups_skip_unknown_ids() {
    let e = engine(EngineConfig::default());
    assert_eq!(e.page_rank(&["3", "42", "1"]), vec![1.0, 0.5]);
    assert_eq!(e.page_views(&["3", "4"]), vec![7]);
}

#[test]
fn corrupted_store_fails_the_query_not_the_engine() {
    let store = Arc::new(CachedStore::new(MemoryStore::new()));
    build_corpus(store.as_ref());
    let e = SearchEngine::open(store.clone(), &IndexLayout::default(), &SignalPaths::default(), EngineConfig::default())
        .unwrap();
    store.delete("body/body_index_000.bin").unwrap();

    let err = e.search_body(&["cat"]).unwrap_err();
    assert!(matches!(err, IndexError::Corruption { .. }));
    // other fields are still served
    assert_eq!(ids(&e.search_title(&["cat"]).unwrap()), vec![1]);
}

#[test]
fn field_names_parse() {
    assert_eq!("anchor".parse::<Field>().unwrap(), Field::Anchor);
    assert_eq!(Field::Fused.to_string(), "fused");
    assert!("headline".parse::<Field>().is_err());
}
