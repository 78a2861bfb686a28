use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::codec::BlockLocation;
use crate::config::{DESCRIPTOR_MAGIC, DESCRIPTOR_VERSION};
use crate::error::{IndexError, Result};
use crate::store::BlockStore;
use crate::DocId;

const HEADER_LEN: usize = 8;

/// Where one named index lives inside a store: `{dir}/{name}.tdir` plus
/// `{dir}/{name}_NNN.bin` blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub dir: String,
    pub name: String,
}

impl IndexPaths {
    pub fn new(dir: impl Into<String>, name: impl Into<String>) -> Self {
        Self { dir: dir.into().trim_end_matches('/').to_string(), name: name.into() }
    }

    pub fn descriptor(&self) -> String {
        self.join(&format!("{}.tdir", self.name))
    }

    pub fn block_name(&self, seq: usize) -> String {
        format!("{}_{seq:03}.bin", self.name)
    }

    pub fn block_path(&self, block_name: &str) -> String {
        self.join(block_name)
    }

    fn block_prefix(&self) -> String {
        self.join(&format!("{}_", self.name))
    }

    fn is_own_block(&self, path: &str) -> bool {
        path.strip_prefix(&self.block_prefix())
            .and_then(|rest| rest.strip_suffix(".bin"))
            .is_some_and(|seq| !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit()))
    }

    fn join(&self, file: &str) -> String {
        if self.dir.is_empty() {
            file.to_string()
        } else {
            format!("{}/{file}", self.dir)
        }
    }
}

/// Persisted per-index statistics and the term -> block location directory.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermDirectory {
    pub block_capacity: u64,
    pub created_at: String,
    pub df: HashMap<String, u32>,
    pub term_total: HashMap<String, u64>,
    pub doc_lengths: HashMap<DocId, u32>,
    pub posting_locs: HashMap<String, Vec<BlockLocation>>,
}

pub fn encode_descriptor(directory: &TermDirectory) -> Result<Vec<u8>> {
    let body = bincode::serialize(directory).map_err(|e| IndexError::Descriptor(e.to_string()))?;
    let mut out = vec![0u8; HEADER_LEN];
    out[..4].copy_from_slice(&DESCRIPTOR_MAGIC);
    BigEndian::write_u32(&mut out[4..HEADER_LEN], DESCRIPTOR_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn decode_descriptor(bytes: &[u8]) -> Result<TermDirectory> {
    if bytes.len() < HEADER_LEN {
        return Err(IndexError::Descriptor(format!("{} bytes is too short for a header", bytes.len())));
    }
    if bytes[..4] != DESCRIPTOR_MAGIC {
        return Err(IndexError::Descriptor("bad magic".into()));
    }
    let version = BigEndian::read_u32(&bytes[4..HEADER_LEN]);
    if version != DESCRIPTOR_VERSION {
        return Err(IndexError::Descriptor(format!("unsupported version {version}")));
    }
    bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| IndexError::Descriptor(e.to_string()))
}

pub fn save_descriptor(store: &dyn BlockStore, paths: &IndexPaths, directory: &TermDirectory) -> Result<()> {
    let bytes = encode_descriptor(directory)?;
    store.put(&paths.descriptor(), &bytes)
}

pub fn load_descriptor(store: &dyn BlockStore, paths: &IndexPaths) -> Result<TermDirectory> {
    let bytes = store.fetch(&paths.descriptor())?;
    decode_descriptor(&bytes)
}

/// Removes the descriptor and every `{name}_NNN.bin` block, returning the number of
/// blocks removed. A missing descriptor is not an error: an interrupted flush leaves
/// blocks without one.
pub fn delete_index(store: &dyn BlockStore, paths: &IndexPaths) -> Result<usize> {
    match store.delete(&paths.descriptor()) {
        Ok(()) | Err(IndexError::NotFound { .. }) => {}
        Err(e) => return Err(e),
    }
    let mut removed = 0;
    for path in store.list(&paths.block_prefix())? {
        if paths.is_own_block(&path) {
            store.delete(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn sample() -> TermDirectory {
        let mut d = TermDirectory { block_capacity: 12, created_at: "2024-01-01T00:00:00Z".into(), ..Default::default() };
        d.df.insert("cat".into(), 2);
        d.term_total.insert("cat".into(), 3);
        d.doc_lengths.insert(1, 10);
        d.posting_locs.insert("cat".into(), vec![BlockLocation { block: "i_000.bin".into(), offset: 0 }]);
        d
    }

    #[test]
    fn paths_layout() {
        let paths = IndexPaths::new("body/", "body_index");
        assert_eq!(paths.descriptor(), "body/body_index.tdir");
        assert_eq!(paths.block_name(7), "body_index_007.bin");
        assert_eq!(paths.block_path("body_index_007.bin"), "body/body_index_007.bin");
        assert_eq!(IndexPaths::new("", "x").descriptor(), "x.tdir");
    }

    #[test]
    fn descriptor_header_is_checked() {
        let bytes = encode_descriptor(&sample()).unwrap();
        assert_eq!(&bytes[..4], b"WTDX");
        assert_eq!(decode_descriptor(&bytes).unwrap(), sample());

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] = b'X';
        assert!(matches!(decode_descriptor(&wrong_magic), Err(IndexError::Descriptor(_))));

        let mut wrong_version = bytes.clone();
        wrong_version[7] = 99;
        assert!(matches!(decode_descriptor(&wrong_version), Err(IndexError::Descriptor(_))));

        assert!(decode_descriptor(b"WT").is_err());
    }

    #[test]
    fn delete_leaves_similarly_named_indexes_alone() {
        let store = MemoryStore::new();
        let paths = IndexPaths::new("d", "idx");
        save_descriptor(&store, &paths, &sample()).unwrap();
        store.put("d/idx_000.bin", b"a").unwrap();
        store.put("d/idx_001.bin", b"b").unwrap();
        store.put("d/idx_v2_000.bin", b"c").unwrap();

        assert_eq!(delete_index(&store, &paths).unwrap(), 2);
        assert!(!store.exists("d/idx.tdir").unwrap());
        assert!(store.exists("d/idx_v2_000.bin").unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_sweeps_blocks_left_without_a_descriptor() {
        let store = MemoryStore::new();
        store.put("body/body_index_000.bin", &[1u8; 6]).unwrap();
        store.put("body/body_index_001.bin", &[2u8; 6]).unwrap();
        let paths = IndexPaths::new("body", "body_index");

        assert_eq!(delete_index(&store, &paths).unwrap(), 2);
        assert!(store.is_empty());
        assert_eq!(delete_index(&store, &paths).unwrap(), 0);
    }
}
