//! Content hashing for cask.
//!
//! Provides the domain-separated BLAKE3 hasher that producers use to derive
//! [`ObjectId`](cask_types::ObjectId)s before handing objects to a backend.
//! The storage layer itself never hashes payloads — the id a producer
//! supplies is taken at face value.
//!
//! All hashing wraps an established library — no custom cryptography.

pub mod hasher;

pub use hasher::ContentHasher;
