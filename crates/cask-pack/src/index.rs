use cask_types::ObjectId;

use crate::error::{PackError, PackResult};

/// Index sidecar magic.
pub const INDEX_MAGIC: &[u8; 4] = b"CSKI";
/// Current index format version.
pub const INDEX_VERSION: u32 = 1;

/// Random-access index over a pack.
///
/// Layout follows git's pack index v2:
/// - fan-out table: 256 counts of objects whose first id byte is <= the slot
/// - sorted object id array
/// - parallel CRC32 array (over each entry's compressed payload)
/// - parallel pack-offset array
/// - checksum of the pack the index belongs to
///
/// A `PackIndex` can be rebuilt from a bare pack blob by scanning it (ids
/// are stored inline in pack entries), so the sidecar is an optimization,
/// not a requirement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackIndex {
    pub fan_out: [u32; 256],
    pub object_ids: Vec<ObjectId>,
    pub crc32s: Vec<u32>,
    pub offsets: Vec<u64>,
    pub pack_checksum: [u8; 32],
}

impl PackIndex {
    /// Build an index from `(id, crc32, offset)` entries and the pack checksum.
    pub fn build(mut entries: Vec<(ObjectId, u32, u64)>, pack_checksum: [u8; 32]) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fan_out = [0u32; 256];
        for (id, _, _) in &entries {
            fan_out[id.as_bytes()[0] as usize] += 1;
        }
        let mut running = 0u32;
        for slot in fan_out.iter_mut() {
            running += *slot;
            *slot = running;
        }

        let mut object_ids = Vec::with_capacity(entries.len());
        let mut crc32s = Vec::with_capacity(entries.len());
        let mut offsets = Vec::with_capacity(entries.len());
        for (id, crc, offset) in entries {
            object_ids.push(id);
            crc32s.push(crc);
            offsets.push(offset);
        }

        Self {
            fan_out,
            object_ids,
            crc32s,
            offsets,
            pack_checksum,
        }
    }

    /// Look up an object's `(offset, crc32)` by id.
    pub fn lookup(&self, id: &ObjectId) -> Option<(u64, u32)> {
        let first = id.as_bytes()[0] as usize;
        let start = if first == 0 {
            0
        } else {
            self.fan_out[first - 1] as usize
        };
        let end = self.fan_out[first] as usize;

        self.object_ids[start..end]
            .binary_search(id)
            .ok()
            .map(|pos| (self.offsets[start + pos], self.crc32s[start + pos]))
    }

    /// Check if an object is present.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.lookup(id).is_some()
    }

    /// Total object count.
    pub fn object_count(&self) -> usize {
        self.object_ids.len()
    }

    /// Serialize the sidecar form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let count = self.object_ids.len();
        let mut buf = Vec::with_capacity(8 + 256 * 4 + count * 44 + 32);
        buf.extend_from_slice(INDEX_MAGIC);
        buf.extend_from_slice(&INDEX_VERSION.to_be_bytes());
        for &slot in &self.fan_out {
            buf.extend_from_slice(&slot.to_be_bytes());
        }
        for id in &self.object_ids {
            buf.extend_from_slice(id.as_bytes());
        }
        for &crc in &self.crc32s {
            buf.extend_from_slice(&crc.to_be_bytes());
        }
        for &offset in &self.offsets {
            buf.extend_from_slice(&offset.to_be_bytes());
        }
        buf.extend_from_slice(&self.pack_checksum);
        buf
    }

    /// Parse the sidecar form.
    pub fn from_bytes(data: &[u8]) -> PackResult<Self> {
        if data.len() < 8 {
            return Err(PackError::IndexCorrupted("too short".into()));
        }
        if &data[0..4] != INDEX_MAGIC {
            return Err(PackError::InvalidMagic {
                expected: String::from_utf8_lossy(INDEX_MAGIC).into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = u32::from_be_bytes(data[4..8].try_into().unwrap());
        if version != INDEX_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }

        let mut pos = 8;
        if data.len() < pos + 256 * 4 {
            return Err(PackError::IndexCorrupted("fan-out truncated".into()));
        }
        let mut fan_out = [0u32; 256];
        for slot in &mut fan_out {
            *slot = u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap());
            pos += 4;
        }

        let count = fan_out[255] as usize;
        if data.len() < pos + count * (32 + 4 + 8) + 32 {
            return Err(PackError::IndexCorrupted("entry tables truncated".into()));
        }

        let mut object_ids = Vec::with_capacity(count);
        for _ in 0..count {
            let digest: [u8; 32] = data[pos..pos + 32].try_into().unwrap();
            object_ids.push(ObjectId::from_digest(digest));
            pos += 32;
        }

        let mut crc32s = Vec::with_capacity(count);
        for _ in 0..count {
            crc32s.push(u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap()));
            pos += 4;
        }

        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(u64::from_be_bytes(data[pos..pos + 8].try_into().unwrap()));
            pos += 8;
        }

        let pack_checksum: [u8; 32] = data[pos..pos + 32].try_into().unwrap();

        Ok(Self {
            fan_out,
            object_ids,
            crc32s,
            offsets,
            pack_checksum,
        })
    }
}
