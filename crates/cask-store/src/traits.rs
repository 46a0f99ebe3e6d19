use cask_types::{ObjectId, ObjectKind, ObjectRecord};

use crate::error::StoreResult;

/// A backend of the object database.
///
/// All implementations must satisfy these invariants:
/// - The id is the producer's claim. Backends index by it as supplied and
///   never re-derive it from the payload; id/payload correspondence is a
///   caller obligation.
/// - Overwriting an existing id is permitted; the last write wins.
/// - A backend never interprets payloads — it is a pure key-value store.
/// - All failures are reported synchronously; nothing is retried internally.
pub trait ObjectBackend: Send + Sync {
    /// Read the record stored under `id`.
    ///
    /// Returns `Ok(None)` if this backend does not hold the object.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<ObjectRecord>>;

    /// Store `data` under the producer-computed `id` with its declared kind.
    fn write(&self, id: &ObjectId, kind: ObjectKind, data: &[u8]) -> StoreResult<()>;

    /// Check whether this backend holds `id`.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;
}
