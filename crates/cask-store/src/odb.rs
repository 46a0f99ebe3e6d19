use std::sync::{Arc, RwLock};

use cask_types::{ObjectId, ObjectKind, ObjectRecord};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectBackend;

struct RegisteredBackend {
    backend: Arc<dyn ObjectBackend>,
    priority: i32,
}

/// Prioritized router over object-database backends.
///
/// Backends register with a priority; reads and existence checks consult
/// backends in descending priority order and the first hit wins, so a
/// high-priority in-memory stage shadows lower-priority durable storage.
/// Writes land in the highest-priority backend that accepts them.
///
/// On successful registration the router co-owns the backend; a backend
/// that releases itself is expected to remove its registration (see
/// `StagingBackend::release`), and the router additionally skips any
/// backend that reports itself unavailable.
pub struct ObjectDatabase {
    backends: RwLock<Vec<RegisteredBackend>>,
}

impl ObjectDatabase {
    /// Create a router with no backends.
    pub fn new() -> Self {
        Self {
            backends: RwLock::new(Vec::new()),
        }
    }

    /// Attach a backend at the given priority.
    ///
    /// Fails if the same backend instance is already registered. Equal
    /// priorities keep their registration order.
    pub fn add_backend(&self, backend: Arc<dyn ObjectBackend>, priority: i32) -> StoreResult<()> {
        let mut backends = self.backends.write().expect("lock poisoned");
        let duplicate = backends
            .iter()
            .any(|reg| std::ptr::addr_eq(Arc::as_ptr(&reg.backend), Arc::as_ptr(&backend)));
        if duplicate {
            return Err(StoreError::Registration(
                "backend is already registered".into(),
            ));
        }
        backends.push(RegisteredBackend { backend, priority });
        backends.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(())
    }

    /// Detach a backend. Returns `true` if it was registered.
    pub fn remove_backend(&self, target: &dyn ObjectBackend) -> bool {
        let mut backends = self.backends.write().expect("lock poisoned");
        let before = backends.len();
        backends.retain(|reg| {
            !std::ptr::addr_eq(Arc::as_ptr(&reg.backend), target as *const dyn ObjectBackend)
        });
        before != backends.len()
    }

    /// Number of registered backends.
    pub fn backend_count(&self) -> usize {
        self.backends.read().expect("lock poisoned").len()
    }

    /// Read from the highest-priority backend holding `id`.
    pub fn read(&self, id: &ObjectId) -> StoreResult<Option<ObjectRecord>> {
        let backends = self.backends.read().expect("lock poisoned");
        for reg in backends.iter() {
            match reg.backend.read(id) {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) | Err(StoreError::BackendUnavailable) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Write to the highest-priority backend that accepts the object.
    pub fn write(&self, id: &ObjectId, kind: ObjectKind, data: &[u8]) -> StoreResult<()> {
        let backends = self.backends.read().expect("lock poisoned");
        for reg in backends.iter() {
            match reg.backend.write(id, kind, data) {
                Ok(()) => return Ok(()),
                Err(StoreError::BackendUnavailable) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::BackendUnavailable)
    }

    /// Check whether any backend holds `id`.
    pub fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let backends = self.backends.read().expect("lock poisoned");
        for reg in backends.iter() {
            match reg.backend.exists(id) {
                Ok(true) => return Ok(true),
                Ok(false) | Err(StoreError::BackendUnavailable) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }
}

impl Default for ObjectDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDatabase")
            .field("backend_count", &self.backend_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Always-available map backend standing in for durable storage.
    #[derive(Default)]
    struct MapBackend {
        objects: Mutex<HashMap<ObjectId, ObjectRecord>>,
    }

    impl ObjectBackend for MapBackend {
        fn read(&self, id: &ObjectId) -> StoreResult<Option<ObjectRecord>> {
            Ok(self.objects.lock().expect("lock poisoned").get(id).cloned())
        }

        fn write(&self, id: &ObjectId, kind: ObjectKind, data: &[u8]) -> StoreResult<()> {
            self.objects
                .lock()
                .expect("lock poisoned")
                .insert(*id, ObjectRecord::new(kind, data.to_vec()));
            Ok(())
        }

        fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
            Ok(self.objects.lock().expect("lock poisoned").contains_key(id))
        }
    }

    /// Backend that refuses everything, as a released backend would.
    struct DeadBackend;

    impl ObjectBackend for DeadBackend {
        fn read(&self, _: &ObjectId) -> StoreResult<Option<ObjectRecord>> {
            Err(StoreError::BackendUnavailable)
        }
        fn write(&self, _: &ObjectId, _: ObjectKind, _: &[u8]) -> StoreResult<()> {
            Err(StoreError::BackendUnavailable)
        }
        fn exists(&self, _: &ObjectId) -> StoreResult<bool> {
            Err(StoreError::BackendUnavailable)
        }
    }

    #[test]
    fn empty_router() {
        let odb = ObjectDatabase::new();
        let id = ObjectId::from_bytes(b"anything");
        assert_eq!(odb.backend_count(), 0);
        assert!(odb.read(&id).unwrap().is_none());
        assert!(!odb.exists(&id).unwrap());
        assert!(matches!(
            odb.write(&id, ObjectKind::Blob, b"x"),
            Err(StoreError::BackendUnavailable)
        ));
    }

    #[test]
    fn write_lands_in_highest_priority_backend() {
        let odb = ObjectDatabase::new();
        let low: Arc<MapBackend> = Arc::new(MapBackend::default());
        let high: Arc<MapBackend> = Arc::new(MapBackend::default());
        odb.add_backend(low.clone(), 1).unwrap();
        odb.add_backend(high.clone(), 999).unwrap();

        let id = ObjectId::from_bytes(b"routed");
        odb.write(&id, ObjectKind::Blob, b"routed").unwrap();

        assert!(high.exists(&id).unwrap());
        assert!(!low.exists(&id).unwrap());
    }

    #[test]
    fn read_prefers_highest_priority_backend() {
        let odb = ObjectDatabase::new();
        let low: Arc<MapBackend> = Arc::new(MapBackend::default());
        let high: Arc<MapBackend> = Arc::new(MapBackend::default());
        odb.add_backend(low.clone(), 1).unwrap();
        odb.add_backend(high.clone(), 999).unwrap();

        let id = ObjectId::from_bytes(b"shadowed");
        low.write(&id, ObjectKind::Blob, b"stale").unwrap();
        high.write(&id, ObjectKind::Blob, b"fresh").unwrap();

        assert_eq!(odb.read(&id).unwrap().unwrap().data, b"fresh");
    }

    #[test]
    fn read_falls_through_to_lower_priority() {
        let odb = ObjectDatabase::new();
        let low: Arc<MapBackend> = Arc::new(MapBackend::default());
        odb.add_backend(low.clone(), 1).unwrap();
        odb.add_backend(Arc::new(MapBackend::default()), 999).unwrap();

        let id = ObjectId::from_bytes(b"deep");
        low.write(&id, ObjectKind::Blob, b"deep").unwrap();

        assert_eq!(odb.read(&id).unwrap().unwrap().data, b"deep");
        assert!(odb.exists(&id).unwrap());
    }

    #[test]
    fn unavailable_backends_are_skipped() {
        let odb = ObjectDatabase::new();
        let durable: Arc<MapBackend> = Arc::new(MapBackend::default());
        odb.add_backend(Arc::new(DeadBackend), 999).unwrap();
        odb.add_backend(durable.clone(), 1).unwrap();

        let id = ObjectId::from_bytes(b"skip the dead");
        odb.write(&id, ObjectKind::Blob, b"alive").unwrap();
        assert!(durable.exists(&id).unwrap());
        assert_eq!(odb.read(&id).unwrap().unwrap().data, b"alive");
        assert!(odb.exists(&id).unwrap());
    }

    #[test]
    fn duplicate_registration_fails() {
        let odb = ObjectDatabase::new();
        let backend: Arc<dyn ObjectBackend> = Arc::new(MapBackend::default());
        odb.add_backend(backend.clone(), 1).unwrap();
        let err = odb.add_backend(backend, 1).unwrap_err();
        assert!(matches!(err, StoreError::Registration(_)));
        assert_eq!(odb.backend_count(), 1);
    }

    #[test]
    fn remove_backend_detaches() {
        let odb = ObjectDatabase::new();
        let backend: Arc<MapBackend> = Arc::new(MapBackend::default());
        odb.add_backend(backend.clone(), 1).unwrap();

        let id = ObjectId::from_bytes(b"gone");
        backend.write(&id, ObjectKind::Blob, b"gone").unwrap();
        assert!(odb.exists(&id).unwrap());

        assert!(odb.remove_backend(backend.as_ref()));
        assert_eq!(odb.backend_count(), 0);
        assert!(!odb.exists(&id).unwrap());
        // Second removal is a no-op.
        assert!(!odb.remove_backend(backend.as_ref()));
    }

    #[test]
    fn equal_priorities_keep_registration_order() {
        let odb = ObjectDatabase::new();
        let first: Arc<MapBackend> = Arc::new(MapBackend::default());
        let second: Arc<MapBackend> = Arc::new(MapBackend::default());
        odb.add_backend(first.clone(), 5).unwrap();
        odb.add_backend(second.clone(), 5).unwrap();

        let id = ObjectId::from_bytes(b"tie");
        odb.write(&id, ObjectKind::Blob, b"tie").unwrap();
        assert!(first.exists(&id).unwrap());
        assert!(!second.exists(&id).unwrap());
    }

    #[test]
    fn debug_format() {
        let odb = ObjectDatabase::new();
        let debug = format!("{odb:?}");
        assert!(debug.contains("ObjectDatabase"));
        assert!(debug.contains("backend_count"));
    }
}
