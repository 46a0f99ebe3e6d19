use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use cask_pack::PackWriter;
use cask_types::{ObjectId, ObjectKind, ObjectRecord};

use crate::error::{StoreError, StoreResult};
use crate::odb::ObjectDatabase;
use crate::traits::ObjectBackend;

/// Priority the staging backend registers at — ahead of any durable
/// backend, so reads see the freshest in-memory data first.
pub const STAGING_PRIORITY: i32 = 999;

/// Archive produced by [`StagingBackend::dump`].
///
/// Ownership of the bytes passes entirely to the caller; the backend keeps
/// no copy. Hand `seq` back through [`StagingBackend::mark_persisted`] once
/// the archive has been durably stored.
#[derive(Clone, Debug)]
pub struct PackDump {
    /// The serialized pack blob.
    pub data: Vec<u8>,
    /// BLAKE3 trailer checksum of the blob.
    pub checksum: [u8; 32],
    /// Number of objects in the archive.
    pub object_count: usize,
    /// Sequence number of this dump.
    pub seq: u64,
}

/// Insertion-ordered table of staged records.
///
/// Overwriting an id keeps its original slot, so serialization order is a
/// pure function of first-insertion order and dumps stay deterministic
/// under rewrites.
#[derive(Default)]
struct ObjectTable {
    slots: HashMap<ObjectId, usize>,
    records: Vec<(ObjectId, ObjectRecord)>,
}

impl ObjectTable {
    fn put(&mut self, id: ObjectId, record: ObjectRecord) {
        match self.slots.get(&id) {
            Some(&slot) => self.records[slot].1 = record,
            None => {
                self.slots.insert(id, self.records.len());
                self.records.push((id, record));
            }
        }
    }

    fn get(&self, id: &ObjectId) -> Option<&ObjectRecord> {
        self.slots.get(id).map(|&slot| &self.records[slot].1)
    }

    fn contains(&self, id: &ObjectId) -> bool {
        self.slots.contains_key(id)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn total_bytes(&self) -> u64 {
        self.records.iter().map(|(_, record)| record.size).sum()
    }

    /// Clone all records in insertion order.
    fn snapshot(&self) -> Vec<(ObjectId, ObjectRecord)> {
        self.records.clone()
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.records.clear();
    }
}

#[derive(Default)]
struct StagingState {
    table: ObjectTable,
    released: bool,
    /// Bumped on every table mutation.
    epoch: u64,
    /// Epoch the most recent dump captured, if any.
    last_dump_epoch: Option<u64>,
    /// Sequence number of the most recent dump (0 = never dumped).
    dump_seq: u64,
    /// Highest dump sequence the caller confirmed as persisted.
    persisted_seq: u64,
    /// Router to unregister from on release.
    router: Weak<ObjectDatabase>,
}

impl StagingState {
    /// Staged data not covered by a persisted dump, as
    /// `(dump_seq, persisted_seq)`; `None` when resetting would lose
    /// nothing.
    fn uncovered(&self) -> Option<(u64, u64)> {
        if self.table.len() == 0 {
            return None;
        }
        let covered =
            self.last_dump_epoch == Some(self.epoch) && self.persisted_seq >= self.dump_seq;
        if covered {
            None
        } else {
            Some((self.dump_seq, self.persisted_seq))
        }
    }

    fn clear_table(&mut self) {
        if self.table.len() > 0 {
            self.epoch += 1;
        }
        self.table.clear();
    }
}

/// In-memory staging backend for an [`ObjectDatabase`].
///
/// Writes accumulate in an insertion-ordered table instead of touching
/// durable storage. [`dump`](Self::dump) serializes the accumulated set
/// into a single pack blob for the caller to persist externally;
/// [`reset`](Self::reset) then discards the staged contents. The result is
/// all-or-nothing visibility for a batch of writes.
///
/// Resetting before the dumped archive is durably stored strands the
/// staged objects — nothing will hold them anymore. The backend cannot see
/// the external persist step, so [`reset`](Self::reset) only makes that
/// hazard observable (via sequence tracking and a warning); use
/// [`try_reset`](Self::try_reset) to refuse instead.
///
/// All operations on one backend serialize on an internal lock; separate
/// backends are fully independent. `dump` snapshots the table and encodes
/// outside the lock, so its output reflects exactly the records present
/// when it started.
pub struct StagingBackend {
    state: Mutex<StagingState>,
}

impl StagingBackend {
    /// Create an unregistered staging backend.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(StagingState::default()),
        })
    }

    /// Create a staging backend and register it with `odb` at
    /// [`STAGING_PRIORITY`].
    pub fn attach(odb: &Arc<ObjectDatabase>) -> StoreResult<Arc<Self>> {
        let backend = Self::new();
        backend.register(odb)?;
        Ok(backend)
    }

    /// Register this backend with `odb` at [`STAGING_PRIORITY`].
    ///
    /// A backend belongs to at most one router. On success the router
    /// co-owns the backend until [`release`](Self::release). On failure
    /// the backend is released before the error is returned, so no
    /// half-registered instance remains.
    pub fn register(self: &Arc<Self>, odb: &Arc<ObjectDatabase>) -> StoreResult<()> {
        {
            let state = self.state.lock().expect("lock poisoned");
            if state.released {
                return Err(StoreError::Registration(
                    "backend has been released".into(),
                ));
            }
            if state.router.strong_count() > 0 {
                drop(state);
                self.release();
                return Err(StoreError::Registration(
                    "backend is already registered".into(),
                ));
            }
        }
        let backend: Arc<dyn ObjectBackend> = self.clone();
        if let Err(e) = odb.add_backend(backend, STAGING_PRIORITY) {
            self.release();
            return Err(e);
        }
        self.state.lock().expect("lock poisoned").router = Arc::downgrade(odb);
        Ok(())
    }

    /// Serialize the current table into a pack archive.
    ///
    /// Read-only with respect to staged data: the table is snapshotted and
    /// left untouched, and dumping twice without intervening writes yields
    /// byte-identical archives. `durable` is consulted to resolve the kind
    /// of [`ObjectKind::Opaque`] records; records it cannot resolve stay
    /// opaque, and passing `None` is valid when nothing was staged opaque.
    pub fn dump(&self, durable: Option<&dyn ObjectBackend>) -> StoreResult<PackDump> {
        let (snapshot, snapshot_epoch) = {
            let state = self.state.lock().expect("lock poisoned");
            if state.released {
                return Err(StoreError::BackendUnavailable);
            }
            (state.table.snapshot(), state.epoch)
        };

        // Encode outside the lock; the snapshot pins what this dump sees.
        let mut writer = PackWriter::new();
        for (id, mut record) in snapshot {
            if record.kind == ObjectKind::Opaque {
                if let Some(durable) = durable {
                    if let Ok(Some(resolved)) = durable.read(&id) {
                        record.kind = resolved.kind;
                    }
                }
            }
            writer.add_record(id, &record);
        }
        let (data, index) = writer.finish_to_bytes()?;

        let mut state = self.state.lock().expect("lock poisoned");
        if state.released {
            return Err(StoreError::BackendUnavailable);
        }
        state.dump_seq += 1;
        let seq = state.dump_seq;
        if state.epoch == snapshot_epoch {
            state.last_dump_epoch = Some(snapshot_epoch);
        }

        tracing::debug!(
            seq,
            objects = index.object_count(),
            bytes = data.len(),
            "staging table dumped"
        );

        Ok(PackDump {
            data,
            checksum: index.pack_checksum,
            object_count: index.object_count(),
            seq,
        })
    }

    /// Record that the dump with sequence number `seq` has been durably
    /// persisted by the caller.
    pub fn mark_persisted(&self, seq: u64) -> StoreResult<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.released {
            return Err(StoreError::BackendUnavailable);
        }
        if seq > state.dump_seq {
            tracing::warn!(
                seq,
                latest = state.dump_seq,
                "marking a dump sequence that was never produced"
            );
        }
        state.persisted_seq = state.persisted_seq.max(seq);
        Ok(())
    }

    /// Discard all staged objects.
    ///
    /// Unconditional: whether a prior dump was persisted is the caller's
    /// obligation, not a checked precondition. Clearing data that no
    /// persisted dump covers is logged at warn level. Resetting an empty
    /// table is a no-op.
    pub fn reset(&self) -> StoreResult<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.released {
            return Err(StoreError::BackendUnavailable);
        }
        if let Some((dumped, persisted)) = state.uncovered() {
            tracing::warn!(
                objects = state.table.len(),
                dumped,
                persisted,
                "resetting staged objects not covered by a persisted dump"
            );
        }
        state.clear_table();
        Ok(())
    }

    /// Discard all staged objects, refusing when doing so would lose data
    /// no persisted dump covers.
    pub fn try_reset(&self) -> StoreResult<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.released {
            return Err(StoreError::BackendUnavailable);
        }
        if let Some((dumped, persisted)) = state.uncovered() {
            return Err(StoreError::UnpersistedDump { dumped, persisted });
        }
        state.clear_table();
        Ok(())
    }

    /// Release the backend: drop all staged objects and unregister from
    /// the router. Idempotent; every later operation fails with
    /// [`StoreError::BackendUnavailable`].
    pub fn release(&self) {
        let router = {
            let mut state = self.state.lock().expect("lock poisoned");
            if state.released {
                return;
            }
            state.released = true;
            state.table.clear();
            std::mem::take(&mut state.router)
        };
        if let Some(odb) = router.upgrade() {
            odb.remove_backend(self);
        }
        tracing::debug!("staging backend released");
    }

    /// Number of staged objects.
    pub fn len(&self) -> usize {
        self.state.lock().expect("lock poisoned").table.len()
    }

    /// Returns `true` if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes staged.
    pub fn total_bytes(&self) -> u64 {
        self.state.lock().expect("lock poisoned").table.total_bytes()
    }
}

impl ObjectBackend for StagingBackend {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<ObjectRecord>> {
        let state = self.state.lock().expect("lock poisoned");
        if state.released {
            return Err(StoreError::BackendUnavailable);
        }
        Ok(state.table.get(id).cloned())
    }

    fn write(&self, id: &ObjectId, kind: ObjectKind, data: &[u8]) -> StoreResult<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.released {
            return Err(StoreError::BackendUnavailable);
        }
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        state.table.put(*id, ObjectRecord::new(kind, data.to_vec()));
        state.epoch += 1;
        Ok(())
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let state = self.state.lock().expect("lock poisoned");
        if state.released {
            return Err(StoreError::BackendUnavailable);
        }
        Ok(state.table.contains(id))
    }
}

impl std::fmt::Debug for StagingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("lock poisoned");
        f.debug_struct("StagingBackend")
            .field("object_count", &state.table.len())
            .field("released", &state.released)
            .finish()
    }
}
