//! Format constants and ranking defaults shared by the indexer and the server.
//!
//! Everything that changes the on-disk layout lives here; runtime knobs are
//! passed through `EngineConfig` and the binaries' CLI flags.

/// Bytes per encoded posting: 4 bytes doc-id followed by 2 bytes term frequency.
pub const TUPLE_SIZE: usize = 6;

/// Term frequencies are truncated to their low 16 bits when encoded.
pub const TF_MASK: u32 = (1 << 16) - 1;

/// Default capacity of a single posting block file, in bytes.
///
/// A multiple of `TUPLE_SIZE`, so a full block never splits a tuple.
pub const BLOCK_SIZE: usize = 1_999_998;

/// Number of shards used by parallel index builders (see `bucket_id`).
pub const NUM_BUCKETS: u64 = 124;

/// Additive smoothing applied to `df` in the query-side IDF.
pub const IDF_EPSILON: f64 = 1e-7;

/// Similarity scores are rounded to this many decimal digits before ranking.
pub const SCORE_DECIMALS: i32 = 5;

/// Number of results returned by the capped searches.
pub const DEFAULT_RESULT_LIMIT: usize = 100;

/// Default weight of every fused signal (title, body, anchor, page rank, page views).
pub const DEFAULT_SIGNAL_WEIGHT: f64 = 0.2;

/// Per-fetch timeout for remote block stores, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Magic bytes at the start of every term-directory descriptor.
pub const DESCRIPTOR_MAGIC: [u8; 4] = *b"WTDX";

/// Current descriptor format version.
pub const DESCRIPTOR_VERSION: u32 = 1;
