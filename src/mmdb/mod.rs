//! MaxMind DB (MMDB) writer.
//!
//! # File Structure
//!
//! ```text
//! +------------------+
//! |   SEARCH TREE    |  node_count * record_size / 4 bytes
//! +------------------+
//! |    SEPARATOR     |  16 zero bytes
//! +------------------+
//! |   DATA SECTION   |  deduplicated records
//! +------------------+
//! | METADATA MARKER  |  "\xAB\xCD\xEFMaxMind.com"
//! +------------------+
//! |     METADATA     |  map
//! +------------------+
//! ```
//!
//! IPv4 blocks in an IPv6 database live under `::/96`, which is where
//! MMDB readers look for IPv4 lookups.

mod encoder;
mod format;
mod tree;
pub mod writer;

pub use encoder::{DataSection, Value};
pub use format::*;
pub use tree::{Record, SearchTree, IPV4_ALIASES};
pub use writer::{MmdbOptions, MmdbWriter};
