use std::ops::Range;
use std::path::Path;

use cask_types::{ObjectId, ObjectKind, ObjectRecord};

use crate::entry::kind_from_type_byte;
use crate::error::{PackError, PackResult};
use crate::index::PackIndex;
use crate::writer::{decode_varint, HEADER_LEN, PACK_MAGIC, PACK_VERSION, TRAILER_LEN};

/// Reads objects back out of a pack blob.
///
/// Packs are self-describing: object ids live inline in each entry, so a
/// reader can always rebuild its index by scanning the blob. When a sidecar
/// index is available (disk packs), scanning is skipped.
#[derive(Debug)]
pub struct PackReader {
    data: Vec<u8>,
    index: PackIndex,
}

impl PackReader {
    /// Open a bare pack blob, verifying the trailer checksum and building
    /// the index by a sequential scan.
    pub fn from_bytes(data: Vec<u8>) -> PackResult<Self> {
        let declared = parse_header(&data)?;
        let checksum = verify_trailer(&data)?;

        let body_end = data.len() - TRAILER_LEN;
        let mut entries = Vec::with_capacity(declared as usize);
        let mut pos = HEADER_LEN;
        while pos < body_end {
            let raw = scan_entry(&data, pos, body_end)?;
            let crc = crc32fast::hash(&data[raw.compressed.clone()]);
            entries.push((raw.id, crc, pos as u64));
            pos = raw.next;
        }

        if entries.len() != declared as usize {
            return Err(PackError::ObjectCountMismatch {
                declared,
                actual: entries.len() as u32,
            });
        }

        let index = PackIndex::build(entries, checksum);
        Ok(Self { data, index })
    }

    /// Open a pack blob with a pre-built index (the sidecar path).
    pub fn with_index(data: Vec<u8>, index: PackIndex) -> PackResult<Self> {
        let declared = parse_header(&data)?;
        let checksum = verify_trailer(&data)?;
        if checksum != index.pack_checksum {
            return Err(PackError::ChecksumMismatch);
        }
        if index.object_count() != declared as usize {
            return Err(PackError::ObjectCountMismatch {
                declared,
                actual: index.object_count() as u32,
            });
        }
        Ok(Self { data, index })
    }

    /// Open a `.pack` file from disk, using its `.idx` sidecar when present
    /// and falling back to a scan when it is not.
    pub fn open(pack_path: &Path) -> PackResult<Self> {
        let data = std::fs::read(pack_path)?;
        let index_path = pack_path.with_extension("idx");
        match std::fs::read(&index_path) {
            Ok(index_data) => Self::with_index(data, PackIndex::from_bytes(&index_data)?),
            Err(_) => {
                tracing::debug!(pack = %pack_path.display(), "no index sidecar, scanning pack");
                Self::from_bytes(data)
            }
        }
    }

    /// Read one object by id. Returns `Ok(None)` if the pack does not hold it.
    pub fn read_object(&self, id: &ObjectId) -> PackResult<Option<ObjectRecord>> {
        let (offset, expected_crc) = match self.index.lookup(id) {
            Some(found) => found,
            None => return Ok(None),
        };
        let (_, record) = self.decode_at(offset as usize, expected_crc)?;
        Ok(Some(record))
    }

    /// Check containment.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.contains(id)
    }

    /// Number of objects in the pack.
    pub fn object_count(&self) -> usize {
        self.index.object_count()
    }

    /// The pack's trailer checksum.
    pub fn checksum(&self) -> [u8; 32] {
        self.index.pack_checksum
    }

    /// Access the index.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Decode every object in pack order (the order they were serialized).
    pub fn entries(&self) -> PackResult<Vec<(ObjectId, ObjectRecord)>> {
        let body_end = self.data.len() - TRAILER_LEN;
        let mut out = Vec::with_capacity(self.object_count());
        let mut pos = HEADER_LEN;
        while pos < body_end {
            let raw = scan_entry(&self.data, pos, body_end)?;
            let crc = crc32fast::hash(&self.data[raw.compressed.clone()]);
            let (id, record) = self.decode_at(pos, crc)?;
            out.push((id, record));
            pos = raw.next;
        }
        Ok(out)
    }

    fn decode_at(&self, offset: usize, expected_crc: u32) -> PackResult<(ObjectId, ObjectRecord)> {
        let body_end = self.data.len() - TRAILER_LEN;
        let raw = scan_entry(&self.data, offset, body_end)?;

        let compressed = &self.data[raw.compressed];
        if crc32fast::hash(compressed) != expected_crc {
            return Err(PackError::CrcMismatch { id: raw.id });
        }

        let payload = zstd::decode_all(compressed)
            .map_err(|e| PackError::DecompressionFailed(e.to_string()))?;
        if payload.len() as u64 != raw.uncompressed_size {
            return Err(PackError::CorruptEntry {
                offset: offset as u64,
                reason: format!(
                    "size mismatch: declared {}, decompressed {}",
                    raw.uncompressed_size,
                    payload.len()
                ),
            });
        }

        Ok((raw.id, ObjectRecord::new(raw.kind, payload)))
    }
}

/// Validate the fixed header and return the declared object count.
fn parse_header(data: &[u8]) -> PackResult<u32> {
    if data.len() < HEADER_LEN + TRAILER_LEN {
        return Err(PackError::CorruptEntry {
            offset: 0,
            reason: "pack data too short".into(),
        });
    }
    if &data[0..4] != PACK_MAGIC {
        return Err(PackError::InvalidMagic {
            expected: String::from_utf8_lossy(PACK_MAGIC).into(),
            actual: String::from_utf8_lossy(&data[0..4]).into(),
        });
    }
    let version = u32::from_be_bytes(data[4..8].try_into().unwrap());
    if version != PACK_VERSION {
        return Err(PackError::UnsupportedVersion(version));
    }
    Ok(u32::from_be_bytes(data[8..12].try_into().unwrap()))
}

/// Check the trailing BLAKE3 checksum against the pack body.
fn verify_trailer(data: &[u8]) -> PackResult<[u8; 32]> {
    let body = &data[..data.len() - TRAILER_LEN];
    let trailer: [u8; 32] = data[data.len() - TRAILER_LEN..].try_into().unwrap();
    if *blake3::hash(body).as_bytes() != trailer {
        return Err(PackError::ChecksumMismatch);
    }
    Ok(trailer)
}

/// One entry's framing, located without decompressing the payload.
struct RawEntry {
    id: ObjectId,
    kind: ObjectKind,
    uncompressed_size: u64,
    compressed: Range<usize>,
    next: usize,
}

fn scan_entry(data: &[u8], start: usize, body_end: usize) -> PackResult<RawEntry> {
    let offset = start as u64;
    let mut pos = start;

    if pos + 33 > body_end {
        return Err(PackError::CorruptEntry {
            offset,
            reason: "entry header truncated".into(),
        });
    }

    let type_byte = data[pos];
    pos += 1;
    let kind = kind_from_type_byte(type_byte).ok_or_else(|| PackError::CorruptEntry {
        offset,
        reason: format!("unknown type byte: {type_byte}"),
    })?;

    let digest: [u8; 32] = data[pos..pos + 32].try_into().unwrap();
    let id = ObjectId::from_digest(digest);
    pos += 32;

    let (uncompressed_size, used) = decode_varint(&data[pos..body_end])?;
    pos += used;
    let (compressed_size, used) = decode_varint(&data[pos..body_end])?;
    pos += used;

    let end = pos
        .checked_add(compressed_size as usize)
        .filter(|&end| end <= body_end)
        .ok_or_else(|| PackError::CorruptEntry {
            offset,
            reason: "compressed data extends beyond pack".into(),
        })?;

    Ok(RawEntry {
        id,
        kind,
        uncompressed_size,
        compressed: pos..end,
        next: end,
    })
}
