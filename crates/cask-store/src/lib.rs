//! Object-database routing and in-memory staging for cask.
//!
//! A cask object database is a stack of prioritized backends behind one
//! router. This crate provides the router ([`ObjectDatabase`]), the backend
//! contract ([`ObjectBackend`]), and the staging backend
//! ([`StagingBackend`]) that buffers a batch of writes entirely in memory.
//!
//! # Staging lifecycle
//!
//! ```text
//! attach -> write* -> dump -> (caller persists the pack) -> mark_persisted -> reset
//!             ^                                                                |
//!             +----------------------------------------------------------------+
//! ```
//!
//! Writes routed to the stage never touch durable storage; `dump`
//! serializes the accumulated set into one pack blob (see `cask-pack`) and
//! `reset` discards it, giving a batch of writes all-or-nothing visibility.
//! Dump, external persist, and reset form one logical transaction — the
//! backend tracks dump sequence numbers so that a reset that would lose
//! unpersisted data is observable, but it does not prevent one.
//!
//! # Design rules
//!
//! 1. Object ids are producer-computed; backends never re-derive them.
//! 2. Operations on one staging backend are serialized by an exclusive lock;
//!    separate backends share nothing.
//! 3. A dump reflects exactly the records present when it was taken.
//! 4. `release` is idempotent and terminal, and detaches from the router
//!    exactly once.

pub mod error;
pub mod odb;
pub mod staging;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use odb::ObjectDatabase;
pub use staging::{PackDump, StagingBackend, STAGING_PRIORITY};
pub use traits::ObjectBackend;
