//! Inverted-index storage and multi-signal ranking for a pre-tokenized corpus.
//!
//! Posting lists are stored as fixed-width binary tuples in capped block files
//! (`codec`), located through a per-index term directory (`index`, `persist`),
//! scored with TF-IDF or term overlap (`rank`) and fused with external page
//! signals (`fusion`). `engine::SearchEngine` ties the pieces together.

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod index;
pub mod persist;
pub mod rank;
pub mod signals;
pub mod store;
pub mod tokenizer;

pub use engine::{EngineConfig, Field, IndexLayout, SearchEngine, SearchHit};
pub use error::{IndexError, Result};
pub use index::*;
