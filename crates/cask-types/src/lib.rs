//! Foundation types for cask.
//!
//! This crate defines the vocabulary shared by every other cask crate:
//!
//! - [`ObjectId`] — Content-addressed identifier (BLAKE3 digest)
//! - [`ObjectKind`] — What a staged payload claims to be (commit, tree, ...)
//! - [`ObjectRecord`] — A kind-tagged payload as held by a backend
//!
//! Object ids are always computed by the *producer* of the bytes. Storage
//! backends treat the id as an opaque lookup key and never re-derive it.

pub mod error;
pub mod id;
pub mod record;

pub use error::TypeError;
pub use id::ObjectId;
pub use record::{ObjectKind, ObjectRecord};
