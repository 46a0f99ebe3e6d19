use serde::{Deserialize, Serialize};

/// What a staged payload claims to be.
///
/// The kind is declared by the producer alongside the payload. `Opaque`
/// marks bytes whose kind the producer could not name; a dump may resolve
/// such records against the durable side of the database (see
/// `cask-store`), otherwise they are archived as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// History node referencing a tree and parent commits.
    Commit,
    /// Directory listing mapping names to object references.
    Tree,
    /// Raw content (file contents, arbitrary data).
    Blob,
    /// Annotated tag pointing at another object.
    Tag,
    /// Kind unknown to the producer.
    Opaque,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Tree => write!(f, "tree"),
            Self::Blob => write!(f, "blob"),
            Self::Tag => write!(f, "tag"),
            Self::Opaque => write!(f, "opaque"),
        }
    }
}

/// A kind-tagged payload as held by a backend.
///
/// The record does not carry its own id: backends key records by the
/// producer-supplied [`ObjectId`](crate::ObjectId). `size` is derived from
/// the payload at construction and is re-checked against the payload length
/// when the record is serialized into a pack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Declared kind of this object.
    pub kind: ObjectKind,
    /// The raw payload bytes.
    pub data: Vec<u8>,
    /// Length of `data` in bytes.
    pub size: u64,
}

impl ObjectRecord {
    /// Build a record from a kind and payload.
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_tracks_payload() {
        let rec = ObjectRecord::new(ObjectKind::Blob, b"12345".to_vec());
        assert_eq!(rec.size, 5);
        assert_eq!(rec.data, b"12345");
    }

    #[test]
    fn empty_payload_is_allowed() {
        let rec = ObjectRecord::new(ObjectKind::Blob, Vec::new());
        assert_eq!(rec.size, 0);
    }

    #[test]
    fn kind_display() {
        assert_eq!(format!("{}", ObjectKind::Commit), "commit");
        assert_eq!(format!("{}", ObjectKind::Tree), "tree");
        assert_eq!(format!("{}", ObjectKind::Blob), "blob");
        assert_eq!(format!("{}", ObjectKind::Tag), "tag");
        assert_eq!(format!("{}", ObjectKind::Opaque), "opaque");
    }
}
