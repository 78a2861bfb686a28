use std::collections::HashMap;

use blake2::digest::consts::U5;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;

use crate::codec::{encode, BlockLocation, BlockWriter, PostingReader};
use crate::config::{BLOCK_SIZE, NUM_BUCKETS, TUPLE_SIZE};
use crate::error::{IndexError, Result};
use crate::persist::{delete_index, load_descriptor, save_descriptor, IndexPaths, TermDirectory};
use crate::store::BlockStore;

pub type DocId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

/// A flushed, read-only index: term statistics plus the location directory.
///
/// Posting bytes stay in the store and are read per query through a `PostingReader`.
#[derive(Debug, Clone)]
pub struct InvertedIndex {
    paths: IndexPaths,
    directory: TermDirectory,
}

impl InvertedIndex {
    pub fn load(store: &dyn BlockStore, paths: IndexPaths) -> Result<Self> {
        let directory = load_descriptor(store, &paths)?;
        tracing::info!(
            dir = %paths.dir,
            name = %paths.name,
            terms = directory.df.len(),
            docs = directory.doc_lengths.len(),
            "loaded term directory"
        );
        Ok(Self { paths, directory })
    }

    /// Removes the descriptor and all block files of `paths`.
    pub fn delete(store: &dyn BlockStore, paths: &IndexPaths) -> Result<usize> {
        let removed = delete_index(store, paths)?;
        tracing::info!(dir = %paths.dir, name = %paths.name, blocks = removed, "deleted index");
        Ok(removed)
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn contains(&self, term: &str) -> bool {
        self.directory.df.contains_key(term) && self.directory.term_total.contains_key(term)
    }

    pub fn df(&self, term: &str) -> u32 {
        self.directory.df.get(term).copied().unwrap_or(0)
    }

    pub fn term_total(&self, term: &str) -> u64 {
        self.directory.term_total.get(term).copied().unwrap_or(0)
    }

    pub fn doc_length(&self, doc_id: DocId) -> Option<u32> {
        self.directory.doc_lengths.get(&doc_id).copied()
    }

    /// Corpus size `N`: every document that has a length entry.
    pub fn num_docs(&self) -> usize {
        self.directory.doc_lengths.len()
    }

    pub fn num_terms(&self) -> usize {
        self.directory.df.len()
    }

    pub fn block_capacity(&self) -> usize {
        self.directory.block_capacity as usize
    }

    pub fn created_at(&self) -> &str {
        &self.directory.created_at
    }

    pub fn locations(&self, term: &str) -> Option<&[BlockLocation]> {
        self.directory.posting_locs.get(term).map(Vec::as_slice)
    }

    /// Postings of `term` sorted by doc-id. Unknown terms yield an empty list.
    pub fn read_posting_list(&self, reader: &mut PostingReader<'_>, term: &str) -> Result<Vec<Posting>> {
        let Some(locs) = self.directory.posting_locs.get(term) else {
            return Ok(Vec::new());
        };
        let total = self.df(term) as usize * TUPLE_SIZE;
        reader.read_postings(&self.paths, locs, total, self.block_capacity())
    }
}

/// Accumulates postings in memory until `flush` writes them out.
pub struct IndexBuilder {
    block_capacity: usize,
    df: HashMap<String, u32>,
    term_total: HashMap<String, u64>,
    doc_lengths: HashMap<DocId, u32>,
    postings: HashMap<String, Vec<Posting>>,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::with_block_capacity(BLOCK_SIZE)
    }

    pub fn with_block_capacity(block_capacity: usize) -> Self {
        Self {
            block_capacity: block_capacity.max(1),
            df: HashMap::new(),
            term_total: HashMap::new(),
            doc_lengths: HashMap::new(),
            postings: HashMap::new(),
        }
    }

    pub fn num_docs(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn add_document<S: AsRef<str>>(&mut self, doc_id: DocId, tokens: &[S]) -> Result<()> {
        if self.doc_lengths.contains_key(&doc_id) {
            return Err(IndexError::Duplicate { doc_id });
        }
        self.doc_lengths.insert(doc_id, tokens.len() as u32);

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for token in tokens {
            *counts.entry(token.as_ref()).or_insert(0) += 1;
        }
        for (term, tf) in counts {
            *self.df.entry(term.to_string()).or_insert(0) += 1;
            *self.term_total.entry(term.to_string()).or_insert(0) += tf as u64;
            self.postings.entry(term.to_string()).or_default().push(Posting { doc_id, tf });
        }
        Ok(())
    }

    /// Writes every posting list (terms in lexicographic order, postings sorted by
    /// doc-id) and then the descriptor. The descriptor goes last so a reader never
    /// sees locations for blocks that are not written yet.
    ///
    /// Fails with `IndexError::Exists` if `paths` already holds a descriptor.
    pub fn flush(self, store: &dyn BlockStore, paths: IndexPaths) -> Result<InvertedIndex> {
        let descriptor = paths.descriptor();
        if store.exists(&descriptor)? {
            return Err(IndexError::Exists { path: descriptor });
        }
        let IndexBuilder { block_capacity, df, term_total, doc_lengths, mut postings } = self;

        let mut terms: Vec<String> = postings.keys().cloned().collect();
        terms.sort();

        let mut posting_locs = HashMap::with_capacity(terms.len());
        let mut writer = BlockWriter::new(store, &paths, block_capacity);
        for term in terms {
            let Some(mut list) = postings.remove(&term) else { continue };
            list.sort_by_key(|p| p.doc_id);
            let locs = writer.write(&encode(&list))?;
            posting_locs.insert(term, locs);
        }
        let blocks = writer.close()?;

        let directory = TermDirectory {
            block_capacity: block_capacity as u64,
            created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            df,
            term_total,
            doc_lengths,
            posting_locs,
        };
        save_descriptor(store, &paths, &directory)?;
        tracing::info!(
            dir = %paths.dir,
            name = %paths.name,
            terms = directory.df.len(),
            docs = directory.doc_lengths.len(),
            blocks,
            "flushed index"
        );
        Ok(InvertedIndex { paths, directory })
    }
}

type Blake2b40 = Blake2b<U5>;

/// Shard of `token` for parallel builders: 40-bit BLAKE2b digest, big-endian, mod 124.
pub fn bucket_id(token: &str) -> u64 {
    let digest = Blake2b40::digest(token.as_bytes());
    let value = digest.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
    value % NUM_BUCKETS
}
