//! Fixed-width binary posting codec and the block-sharded writer/reader.
//!
//! A posting is 6 bytes big-endian: 4 bytes doc-id, 2 bytes term frequency
//! (masked to 16 bits). Posting bytes for consecutive terms are appended to
//! block files of at most `capacity` bytes; a term's bytes may straddle blocks.

use std::collections::HashMap;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::config::{TF_MASK, TUPLE_SIZE};
use crate::error::{IndexError, Result};
use crate::persist::IndexPaths;
use crate::store::BlockStore;
use crate::{DocId, Posting};

/// One chunk of a term's posting bytes: a block file name and the offset inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    pub block: String,
    pub offset: u64,
}

pub fn encode(postings: &[Posting]) -> Vec<u8> {
    let mut buf = vec![0u8; postings.len() * TUPLE_SIZE];
    for (chunk, p) in buf.chunks_exact_mut(TUPLE_SIZE).zip(postings) {
        BigEndian::write_u32(&mut chunk[..4], p.doc_id);
        BigEndian::write_u16(&mut chunk[4..], (p.tf & TF_MASK) as u16);
    }
    buf
}

/// Decodes whole tuples; a trailing partial tuple is ignored.
pub fn decode(bytes: &[u8]) -> Vec<Posting> {
    bytes
        .chunks_exact(TUPLE_SIZE)
        .map(|chunk| Posting {
            doc_id: BigEndian::read_u32(&chunk[..4]) as DocId,
            tf: BigEndian::read_u16(&chunk[4..]) as u32,
        })
        .collect()
}

/// Sequential writer over the numbered block files of one index.
///
/// Single writer only; blocks are uploaded to the store as they fill up.
pub struct BlockWriter<'a> {
    store: &'a dyn BlockStore,
    paths: &'a IndexPaths,
    capacity: usize,
    seq: usize,
    current: Vec<u8>,
}

impl<'a> BlockWriter<'a> {
    pub fn new(store: &'a dyn BlockStore, paths: &'a IndexPaths, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { store, paths, capacity, seq: 0, current: Vec::with_capacity(capacity.min(1 << 20)) }
    }

    /// Appends `bytes`, returning the chunks they landed in, in order.
    pub fn write(&mut self, bytes: &[u8]) -> Result<Vec<BlockLocation>> {
        let mut locs = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            if self.current.len() == self.capacity {
                self.seal()?;
            }
            let take = (self.capacity - self.current.len()).min(rest.len());
            locs.push(BlockLocation { block: self.paths.block_name(self.seq), offset: self.current.len() as u64 });
            self.current.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
        }
        Ok(locs)
    }

    /// Uploads the last partially filled block. Returns the number of blocks written.
    pub fn close(mut self) -> Result<usize> {
        if !self.current.is_empty() {
            self.seal()?;
        }
        Ok(self.seq)
    }

    fn seal(&mut self) -> Result<()> {
        let path = self.paths.block_path(&self.paths.block_name(self.seq));
        tracing::debug!(%path, bytes = self.current.len(), "sealing block");
        self.store.put(&path, &self.current)?;
        self.current.clear();
        self.seq += 1;
        Ok(())
    }
}

/// Random-access reader over block files.
///
/// Each distinct block is fetched at most once per reader; create one reader per query.
pub struct PostingReader<'a> {
    store: &'a dyn BlockStore,
    blocks: HashMap<String, Arc<Vec<u8>>>,
    fetches: usize,
}

impl<'a> PostingReader<'a> {
    pub fn new(store: &'a dyn BlockStore) -> Self {
        Self { store, blocks: HashMap::new(), fetches: 0 }
    }

    /// Number of store round-trips issued so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    /// Reads `total_bytes` following `locations`, taking at most
    /// `capacity - offset` bytes from each chunk.
    pub fn read(
        &mut self,
        paths: &IndexPaths,
        locations: &[BlockLocation],
        total_bytes: usize,
        capacity: usize,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(total_bytes);
        let mut remaining = total_bytes;
        for loc in locations {
            if remaining == 0 {
                break;
            }
            let block = self.block(paths, &loc.block)?;
            let offset = loc.offset as usize;
            let n_read = remaining.min(capacity.saturating_sub(offset));
            if offset + n_read > block.len() {
                tracing::warn!(block = %loc.block, offset, n_read, len = block.len(), "truncated block");
                return Err(IndexError::corruption(
                    &loc.block,
                    format!("need {} bytes at offset {offset}, block holds {}", n_read, block.len()),
                ));
            }
            out.extend_from_slice(&block[offset..offset + n_read]);
            remaining -= n_read;
        }
        if remaining > 0 {
            let last = locations.last().map(|l| l.block.as_str()).unwrap_or("<none>");
            return Err(IndexError::corruption(
                last,
                format!("locations cover {} of {total_bytes} bytes", total_bytes - remaining),
            ));
        }
        Ok(out)
    }

    pub fn read_postings(
        &mut self,
        paths: &IndexPaths,
        locations: &[BlockLocation],
        total_bytes: usize,
        capacity: usize,
    ) -> Result<Vec<Posting>> {
        let bytes = self.read(paths, locations, total_bytes, capacity)?;
        Ok(decode(&bytes))
    }

    fn block(&mut self, paths: &IndexPaths, name: &str) -> Result<Arc<Vec<u8>>> {
        let path = paths.block_path(name);
        if let Some(hit) = self.blocks.get(&path) {
            return Ok(Arc::clone(hit));
        }
        tracing::debug!(%path, "fetching block");
        let bytes = match self.store.fetch(&path) {
            Ok(bytes) => bytes,
            Err(IndexError::NotFound { .. }) => {
                tracing::warn!(%path, "referenced block is missing");
                return Err(IndexError::corruption(name, "referenced block is missing"));
            }
            Err(e) => return Err(e),
        };
        self.fetches += 1;
        self.blocks.insert(path, Arc::clone(&bytes));
        Ok(bytes)
    }
}
