use std::io::Write;
use std::path::{Path, PathBuf};

use cask_types::{ObjectId, ObjectKind, ObjectRecord};

use crate::entry::{kind_type_byte, PackEntry};
use crate::error::{PackError, PackResult};
use crate::index::PackIndex;

/// Pack file magic.
pub const PACK_MAGIC: &[u8; 4] = b"CSKP";
/// Current pack format version.
pub const PACK_VERSION: u32 = 1;
/// Length of the fixed pack header (magic + version + object count).
pub const HEADER_LEN: usize = 12;
/// Length of the trailing BLAKE3 checksum.
pub const TRAILER_LEN: usize = 32;

/// zstd compression level used for every entry. Fixed so that identical
/// input always yields identical pack bytes.
const COMPRESSION_LEVEL: i32 = 3;

/// Result of writing a pack to disk.
#[derive(Clone, Debug)]
pub struct PackFile {
    pub pack_path: PathBuf,
    pub index_path: PathBuf,
    pub object_count: usize,
    pub checksum: [u8; 32],
}

/// Deterministic pack encoder.
///
/// Objects are encoded in the order they were added; given the same entries
/// in the same order the output is byte-identical. The layout is
/// self-describing: magic, version, object count, then per entry a type
/// byte, the 32-byte object id, varint uncompressed and compressed sizes,
/// and the zstd-compressed payload, closed by a BLAKE3 checksum over
/// everything preceding it.
#[derive(Default)]
pub struct PackWriter {
    entries: Vec<PackEntry>,
}

impl PackWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a payload for the pack.
    pub fn add_object(&mut self, id: ObjectId, kind: ObjectKind, data: &[u8]) {
        self.entries.push(PackEntry::new(id, kind, data.to_vec()));
    }

    /// Queue a record, carrying its declared size into the entry.
    pub fn add_record(&mut self, id: ObjectId, record: &ObjectRecord) {
        self.entries.push(PackEntry::from_record(id, record));
    }

    /// Number of objects queued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the pack into `sink`, returning the index built alongside.
    ///
    /// The sink may be anything from a `Vec<u8>` to a socket; the encoder
    /// streams entry by entry and never buffers the whole archive itself.
    pub fn write_to<W: Write>(self, sink: &mut W) -> PackResult<PackIndex> {
        let mut out = ChecksumSink::new(sink);

        out.emit(PACK_MAGIC)?;
        out.emit(&PACK_VERSION.to_be_bytes())?;
        out.emit(&(self.entries.len() as u32).to_be_bytes())?;

        let mut index_entries = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.size != entry.data.len() as u64 {
                return Err(PackError::SizeMismatch {
                    id: entry.id,
                    declared: entry.size,
                    actual: entry.data.len() as u64,
                });
            }

            let offset = out.written;
            out.emit(&[kind_type_byte(entry.kind)])?;
            out.emit(entry.id.as_bytes())?;

            let compressed = zstd::encode_all(entry.data.as_slice(), COMPRESSION_LEVEL)
                .map_err(|e| PackError::CompressionFailed(e.to_string()))?;

            let mut sizes = Vec::with_capacity(10);
            encode_varint(&mut sizes, entry.size);
            encode_varint(&mut sizes, compressed.len() as u64);
            out.emit(&sizes)?;
            out.emit(&compressed)?;

            index_entries.push((entry.id, crc32fast::hash(&compressed), offset));
        }

        let checksum = out.finish()?;
        Ok(PackIndex::build(index_entries, checksum))
    }

    /// Encode the pack into memory.
    pub fn finish_to_bytes(self) -> PackResult<(Vec<u8>, PackIndex)> {
        let mut buf = Vec::new();
        let index = self.write_to(&mut buf)?;
        Ok((buf, index))
    }

    /// Encode the pack and its index sidecar to `<base>.pack` / `<base>.idx`.
    pub fn finish(self, base: &Path) -> PackResult<PackFile> {
        let pack_path = base.with_extension("pack");
        let index_path = base.with_extension("idx");

        let (pack_data, index) = self.finish_to_bytes()?;
        std::fs::write(&pack_path, &pack_data)?;
        std::fs::write(&index_path, index.to_bytes())?;

        tracing::debug!(
            pack = %pack_path.display(),
            objects = index.object_count(),
            "pack written to disk"
        );

        Ok(PackFile {
            pack_path,
            index_path,
            object_count: index.object_count(),
            checksum: index.pack_checksum,
        })
    }
}

/// Write adapter that folds everything emitted into a BLAKE3 checksum and
/// counts bytes, then appends the checksum itself un-hashed.
struct ChecksumSink<'a, W: Write> {
    sink: &'a mut W,
    hasher: blake3::Hasher,
    written: u64,
}

impl<'a, W: Write> ChecksumSink<'a, W> {
    fn new(sink: &'a mut W) -> Self {
        Self {
            sink,
            hasher: blake3::Hasher::new(),
            written: 0,
        }
    }

    fn emit(&mut self, bytes: &[u8]) -> PackResult<()> {
        self.sink.write_all(bytes)?;
        self.hasher.update(bytes);
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn finish(self) -> PackResult<[u8; 32]> {
        let checksum = *self.hasher.finalize().as_bytes();
        self.sink.write_all(&checksum)?;
        Ok(checksum)
    }
}

/// Encode a u64 as a variable-length integer (7 bits per byte, MSB = more).
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a variable-length integer. Returns (value, bytes consumed).
pub(crate) fn decode_varint(data: &[u8]) -> PackResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if shift >= 64 {
            return Err(PackError::CorruptEntry {
                offset: 0,
                reason: "varint overflow".into(),
            });
        }
    }
    Err(PackError::CorruptEntry {
        offset: 0,
        reason: "truncated varint".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn varint_roundtrip_small() {
        let mut buf = Vec::new();
        encode_varint(&mut buf, 42);
        assert_eq!(decode_varint(&buf).unwrap(), (42, 1));
    }

    #[test]
    fn varint_roundtrip_boundaries() {
        for value in [0u64, 127, 128, 16_383, 16_384, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint(&mut buf, value);
            let (decoded, consumed) = decode_varint(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn decode_varint_truncated() {
        let err = decode_varint(&[0x80]).unwrap_err();
        assert!(matches!(err, PackError::CorruptEntry { .. }));
    }

    #[test]
    fn decode_varint_overflow() {
        let err = decode_varint(&[0xFF; 11]).unwrap_err();
        assert!(matches!(err, PackError::CorruptEntry { .. }));
    }

    #[test]
    fn declared_size_mismatch_is_rejected() {
        let id = ObjectId::from_bytes(b"bad size");
        let mut record = ObjectRecord::new(ObjectKind::Blob, b"abc".to_vec());
        record.size = 4;

        let mut writer = PackWriter::new();
        writer.add_record(id, &record);
        let err = writer.finish_to_bytes().unwrap_err();
        assert!(matches!(
            err,
            PackError::SizeMismatch {
                declared: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn header_layout() {
        let (bytes, _) = PackWriter::new().finish_to_bytes().unwrap();
        assert_eq!(&bytes[0..4], PACK_MAGIC);
        assert_eq!(u32::from_be_bytes(bytes[4..8].try_into().unwrap()), 1);
        assert_eq!(u32::from_be_bytes(bytes[8..12].try_into().unwrap()), 0);
        assert_eq!(bytes.len(), HEADER_LEN + TRAILER_LEN);
    }

    #[test]
    fn trailer_is_checksum_of_body() {
        let mut writer = PackWriter::new();
        writer.add_object(ObjectId::from_bytes(b"a"), ObjectKind::Blob, b"a");
        let (bytes, index) = writer.finish_to_bytes().unwrap();

        let body = &bytes[..bytes.len() - TRAILER_LEN];
        let trailer = &bytes[bytes.len() - TRAILER_LEN..];
        assert_eq!(blake3::hash(body).as_bytes(), trailer);
        assert_eq!(&index.pack_checksum[..], trailer);
    }

    proptest! {
        #[test]
        fn varint_roundtrip_any(value in any::<u64>()) {
            let mut buf = Vec::new();
            encode_varint(&mut buf, value);
            let (decoded, consumed) = decode_varint(&buf).unwrap();
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(consumed, buf.len());
        }
    }
}
