//! Query-facing service context: the three field indexes, the signal tables and
//! the store their blocks live in. Built once at startup, then shared read-only.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::codec::PostingReader;
use crate::config::DEFAULT_RESULT_LIMIT;
use crate::error::Result;
use crate::fusion::{merge, FusionConfig};
use crate::persist::IndexPaths;
use crate::rank::{overlap_rank, top_n_for_query};
use crate::signals::{SignalPaths, SignalTables};
use crate::store::BlockStore;
use crate::{DocId, InvertedIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Body,
    Title,
    Anchor,
    Fused,
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "body" => Ok(Field::Body),
            "title" => Ok(Field::Title),
            "anchor" => Ok(Field::Anchor),
            "fused" => Ok(Field::Fused),
            other => Err(format!("unknown field {other:?}")),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::Body => "body",
            Field::Title => "title",
            Field::Anchor => "anchor",
            Field::Fused => "fused",
        };
        f.write_str(s)
    }
}

/// Store locations of the three field indexes.
#[derive(Debug, Clone)]
pub struct IndexLayout {
    pub body: IndexPaths,
    pub title: IndexPaths,
    pub anchor: IndexPaths,
}

impl Default for IndexLayout {
    fn default() -> Self {
        Self {
            body: IndexPaths::new("body", "body_index"),
            title: IndexPaths::new("titles", "title_index"),
            anchor: IndexPaths::new("anchor", "anchor_index"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Cap for body search and for each field fed into fusion.
    pub result_limit: usize,
    pub fusion: FusionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { result_limit: DEFAULT_RESULT_LIMIT, fusion: FusionConfig::default() }
    }
}

/// One result row, serialized as `[doc_id, title]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit(pub DocId, pub String);

pub struct SearchEngine {
    store: Arc<dyn BlockStore>,
    body: InvertedIndex,
    title: InvertedIndex,
    anchor: InvertedIndex,
    signals: SignalTables,
    config: EngineConfig,
}

impl SearchEngine {
    pub fn new(
        store: Arc<dyn BlockStore>,
        body: InvertedIndex,
        title: InvertedIndex,
        anchor: InvertedIndex,
        signals: SignalTables,
        config: EngineConfig,
    ) -> Self {
        Self { store, body, title, anchor, signals, config }
    }

    /// Loads the three term directories and the signal tables from `store`.
    pub fn open(
        store: Arc<dyn BlockStore>,
        layout: &IndexLayout,
        signal_paths: &SignalPaths,
        config: EngineConfig,
    ) -> Result<Self> {
        let body = InvertedIndex::load(store.as_ref(), layout.body.clone())?;
        let title = InvertedIndex::load(store.as_ref(), layout.title.clone())?;
        let anchor = InvertedIndex::load(store.as_ref(), layout.anchor.clone())?;
        let signals = SignalTables::load(store.as_ref(), signal_paths)?;
        Ok(Self::new(store, body, title, anchor, signals, config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn signals(&self) -> &SignalTables {
        &self.signals
    }

    pub fn index(&self, field: Field) -> Option<&InvertedIndex> {
        match field {
            Field::Body => Some(&self.body),
            Field::Title => Some(&self.title),
            Field::Anchor => Some(&self.anchor),
            Field::Fused => None,
        }
    }

    /// Cosine-ranked body scores, capped at the result limit.
    pub fn body_scores<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<(DocId, f64)>> {
        let mut reader = PostingReader::new(self.store.as_ref());
        let scores = top_n_for_query(tokens, &self.body, &mut reader, self.config.result_limit)?;
        tracing::debug!(field = "body", fetches = reader.fetches(), hits = scores.len(), "scored");
        Ok(scores)
    }

    /// Overlap scores for the title or anchor field, uncapped.
    pub fn overlap_scores<S: AsRef<str>>(&self, tokens: &[S], index: &InvertedIndex) -> Result<Vec<(DocId, f64)>> {
        let mut reader = PostingReader::new(self.store.as_ref());
        let scores = overlap_rank(tokens, index, &mut reader)?;
        tracing::debug!(index = %index.paths().name, fetches = reader.fetches(), hits = scores.len(), "scored");
        Ok(scores)
    }

    /// Body, title and anchor rankings (each capped) fused with page rank and views.
    pub fn fused_scores<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<(DocId, f64)>> {
        let limit = self.config.result_limit;
        let body = self.body_scores(tokens)?;
        let mut title = self.overlap_scores(tokens, &self.title)?;
        title.truncate(limit);
        let mut anchor = self.overlap_scores(tokens, &self.anchor)?;
        anchor.truncate(limit);
        Ok(merge(
            &title,
            &body,
            &anchor,
            &self.signals.page_rank,
            &self.signals.page_views,
            &self.config.fusion,
            limit,
        ))
    }

    pub fn search_body<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<SearchHit>> {
        self.search_field(tokens, Field::Body)
    }

    pub fn search_title<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<SearchHit>> {
        self.search_field(tokens, Field::Title)
    }

    pub fn search_anchor<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<SearchHit>> {
        self.search_field(tokens, Field::Anchor)
    }

    pub fn search<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<SearchHit>> {
        self.search_field(tokens, Field::Fused)
    }

    /// Ranked `(doc_id, title)` rows for `tokens` on one field. Empty queries match nothing.
    pub fn search_field<S: AsRef<str>>(&self, tokens: &[S], field: Field) -> Result<Vec<SearchHit>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let span = tracing::info_span!("search", %field, tokens = tokens.len());
        let _guard = span.enter();
        let scores = match field {
            Field::Body => self.body_scores(tokens)?,
            Field::Title => self.overlap_scores(tokens, &self.title)?,
            Field::Anchor => self.overlap_scores(tokens, &self.anchor)?,
            Field::Fused => self.fused_scores(tokens)?,
        };
        Ok(self.with_titles(&scores))
    }

    pub fn page_rank<K: AsRef<str>>(&self, ids: &[K]) -> Vec<f64> {
        self.signals.page_rank_of(ids)
    }

    pub fn page_views<K: AsRef<str>>(&self, ids: &[K]) -> Vec<u64> {
        self.signals.page_views_of(ids)
    }

    fn with_titles(&self, scores: &[(DocId, f64)]) -> Vec<SearchHit> {
        scores
            .iter()
            .map(|&(doc, _)| SearchHit(doc, self.signals.title(&doc.to_string()).to_string()))
            .collect()
    }
}
