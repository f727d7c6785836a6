//! Durable record and key-value storage backends
//!
//! The node persists exactly one record per namespace:
//!
//! ```text
//! DurableRecord (32 bytes on flash)
//! ┌──────┬─────────┬──────────┬──────────────┬─────────────┬────────────┬───────┐
//! │"FLOW"│ ver u16 │ rsvd u16 │ volume f64   │ pulses u64  │ boots u32  │ crc32 │
//! └──────┴─────────┴──────────┴──────────────┴─────────────┴────────────┴───────┘
//!   0..4    4..6      6..8        8..16          16..24        24..28     28..32
//! ```
//!
//! All integers and floats are little-endian. The CRC-32 (ISO-HDLC) covers
//! bytes 0..28. Stores are expected to replace a record atomically: a reader
//! sees either the old record or the new one, never a mix.
//!
//! Backends:
//! - `MemoryStore`: fixed-capacity map of encoded records, with fault
//!   injection for tests
//! - `FileStore` (std): one JSON document per namespace, replaced by
//!   write-then-rename

use crc::{Crc, CRC_32_ISO_HDLC};
use heapless::LinearMap;

use crate::config::Namespace;
use crate::errors::StorageError;

/// Encoded record size in bytes
pub const RECORD_SIZE: usize = 32;

/// Record magic ("FLOW")
pub const RECORD_MAGIC: [u8; 4] = *b"FLOW";

/// Record format version
pub const RECORD_VERSION: u16 = 1;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
const CRC_OFFSET: usize = RECORD_SIZE - 4;

/// State that survives restarts
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DurableRecord {
    /// Lifetime volume (litres)
    pub volume_total: f64,
    /// Lifetime pulse count
    pub pulse_count: u64,
    /// Number of starts, including the current one
    pub boot_count: u32,
}

impl DurableRecord {
    /// Reject values no healthy node would have written
    pub fn check(&self) -> Result<(), StorageError> {
        if self.volume_total.is_finite() && self.volume_total >= 0.0 {
            Ok(())
        } else {
            Err(StorageError::Corrupt {
                reason: "volume is not a non-negative number",
            })
        }
    }

    /// Fixed 32-byte encoding with CRC trailer
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&RECORD_MAGIC);
        buf[4..6].copy_from_slice(&RECORD_VERSION.to_le_bytes());
        buf[8..16].copy_from_slice(&self.volume_total.to_le_bytes());
        buf[16..24].copy_from_slice(&self.pulse_count.to_le_bytes());
        buf[24..28].copy_from_slice(&self.boot_count.to_le_bytes());
        let crc = CRC32.checksum(&buf[..CRC_OFFSET]);
        buf[CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decode and verify a record produced by `encode`
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < RECORD_SIZE {
            return Err(StorageError::Corrupt { reason: "short record" });
        }
        let bytes = &bytes[..RECORD_SIZE];

        if bytes[0..4] != RECORD_MAGIC {
            return Err(StorageError::Corrupt { reason: "bad magic" });
        }
        if u16::from_le_bytes([bytes[4], bytes[5]]) != RECORD_VERSION {
            return Err(StorageError::Corrupt { reason: "unsupported version" });
        }

        let stored_crc = u32::from_le_bytes(le_array(&bytes[CRC_OFFSET..]));
        if CRC32.checksum(&bytes[..CRC_OFFSET]) != stored_crc {
            return Err(StorageError::Corrupt { reason: "checksum mismatch" });
        }

        let record = Self {
            volume_total: f64::from_le_bytes(le_array(&bytes[8..16])),
            pulse_count: u64::from_le_bytes(le_array(&bytes[16..24])),
            boot_count: u32::from_le_bytes(le_array(&bytes[24..28])),
        };
        record.check()?;
        Ok(record)
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Key-value store holding one record per namespace
pub trait DurableStore {
    /// Read the record; `Ok(None)` when nothing was ever saved
    fn load(&mut self, namespace: &str) -> Result<Option<DurableRecord>, StorageError>;

    /// Replace the record atomically
    fn save(&mut self, namespace: &str, record: &DurableRecord) -> Result<(), StorageError>;
}

impl<S: DurableStore + ?Sized> DurableStore for &mut S {
    fn load(&mut self, namespace: &str) -> Result<Option<DurableRecord>, StorageError> {
        (**self).load(namespace)
    }

    fn save(&mut self, namespace: &str, record: &DurableRecord) -> Result<(), StorageError> {
        (**self).save(namespace, record)
    }
}

/// In-memory store of encoded records for up to `N` namespaces
///
/// Behaves like a flash-backed store: records are kept in their encoded form,
/// so corruption injected with `corrupt` is caught by the same checks that
/// guard real hardware.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore<const N: usize> {
    records: LinearMap<Namespace, [u8; RECORD_SIZE], N>,
    fail_writes: u32,
    writes: u32,
}

impl<const N: usize> MemoryStore<N> {
    /// Empty store
    pub fn new() -> Self {
        Self {
            records: LinearMap::new(),
            fail_writes: 0,
            writes: 0,
        }
    }

    /// Store pre-loaded with `record` under `namespace`
    pub fn with_record(namespace: &str, record: &DurableRecord) -> Self {
        let mut store = Self::new();
        // Only fails for N == 0 or an over-long namespace; the store stays empty
        let _ = store.save(namespace, record);
        store.writes = 0;
        store
    }

    /// Make the next `count` saves fail
    pub fn fail_next_writes(&mut self, count: u32) {
        self.fail_writes = count;
    }

    /// Flip bits in a stored record; returns false if there is none
    pub fn corrupt(&mut self, namespace: &str) -> bool {
        let Some(key) = key(namespace) else {
            return false;
        };
        match self.records.get_mut(&key) {
            Some(bytes) => {
                bytes[10] ^= 0xA5;
                true
            }
            None => false,
        }
    }

    /// Raw encoded bytes for `namespace`
    pub fn raw(&self, namespace: &str) -> Option<&[u8; RECORD_SIZE]> {
        self.records.get(&key(namespace)?)
    }

    /// Successful writes since construction
    pub fn writes(&self) -> u32 {
        self.writes
    }
}

fn key(namespace: &str) -> Option<Namespace> {
    let mut key = Namespace::new();
    key.push_str(namespace).ok()?;
    Some(key)
}

impl<const N: usize> DurableStore for MemoryStore<N> {
    fn load(&mut self, namespace: &str) -> Result<Option<DurableRecord>, StorageError> {
        let Some(key) = key(namespace) else {
            return Ok(None);
        };
        match self.records.get(&key) {
            Some(bytes) => DurableRecord::decode(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn save(&mut self, namespace: &str, record: &DurableRecord) -> Result<(), StorageError> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(StorageError::WriteFailed);
        }
        let key = key(namespace).ok_or(StorageError::WriteFailed)?;
        self.records
            .insert(key, record.encode())
            .map_err(|_| StorageError::Full)?;
        self.writes += 1;
        Ok(())
    }
}

#[cfg(feature = "std")]
pub use file::FileStore;

#[cfg(feature = "std")]
mod file {
    use std::fs;
    use std::io::{self, Write};
    use std::path::{Path, PathBuf};

    use super::{DurableRecord, DurableStore};
    use crate::errors::StorageError;

    /// Directory of `<namespace>.json` records
    ///
    /// Saves write `<namespace>.json.tmp`, sync it, and rename it over the
    /// record, so a crash mid-save leaves the previous record intact.
    #[derive(Debug, Clone)]
    pub struct FileStore {
        dir: PathBuf,
    }

    impl FileStore {
        /// Store rooted at `dir`; the directory is created on first save
        pub fn new(dir: impl Into<PathBuf>) -> Self {
            Self { dir: dir.into() }
        }

        /// Path of the record for `namespace`
        pub fn record_path(&self, namespace: &str) -> PathBuf {
            self.dir.join(format!("{namespace}.json"))
        }

        fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
            fs::create_dir_all(&self.dir)?;
            let tmp = path.with_extension("json.tmp");
            {
                let mut file = fs::File::create(&tmp)?;
                file.write_all(contents)?;
                file.sync_all()?;
            }
            fs::rename(&tmp, path)
        }
    }

    impl DurableStore for FileStore {
        fn load(&mut self, namespace: &str) -> Result<Option<DurableRecord>, StorageError> {
            let text = match fs::read_to_string(self.record_path(namespace)) {
                Ok(text) => text,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(_) => return Err(StorageError::ReadFailed),
            };
            let record: DurableRecord = serde_json::from_str(&text)
                .map_err(|_| StorageError::Corrupt { reason: "invalid JSON" })?;
            record.check()?;
            Ok(Some(record))
        }

        fn save(&mut self, namespace: &str, record: &DurableRecord) -> Result<(), StorageError> {
            let json = serde_json::to_vec_pretty(record).map_err(|_| StorageError::WriteFailed)?;
            self.write_atomic(&self.record_path(namespace), &json)
                .map_err(|_| StorageError::WriteFailed)
        }
    }
}
