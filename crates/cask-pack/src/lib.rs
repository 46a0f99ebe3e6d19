//! Pack archive format for cask.
//!
//! A pack is one immutable, checksummed blob holding a batch of
//! content-addressed objects — the unit in which staged writes are handed
//! over for durable storage or transfer.
//!
//! # Architecture
//!
//! - **Pack blob** (`.pack`): header, per-object entries (type byte, inline
//!   object id, varint sizes, zstd payload), BLAKE3 trailer checksum
//! - **Pack index** (`.idx`): fan-out table + sorted ids for O(log n)
//!   lookups; rebuildable from the blob alone, so purely an optimization
//! - **[`PackWriter`]**: deterministic encoder over any `std::io::Write`
//! - **[`PackReader`]**: verification plus random and sequential access
//!
//! Serialization is deterministic: the same objects added in the same order
//! always produce byte-identical output.

pub mod entry;
pub mod error;
pub mod index;
pub mod reader;
pub mod writer;

pub use entry::{kind_from_type_byte, kind_type_byte, PackEntry};
pub use error::{PackError, PackResult};
pub use index::PackIndex;
pub use reader::PackReader;
pub use writer::{PackFile, PackWriter, HEADER_LEN, PACK_MAGIC, PACK_VERSION, TRAILER_LEN};
