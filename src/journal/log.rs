//! Append-only notification log on disk.
//!
//! Entry layout (little endian):
//!
//! ```text
//! magic "NTF\0" | version u8 | sequence u64 | timestamp i64 |
//! payload_len u32 | payload (MessagePack notification) | crc32 u32
//! ```
//!
//! The checksum covers sequence, timestamp and payload.

use super::Journal;
use crate::error::{LedgerError, Result};
use crate::notification::{Notification, NotificationRecord};
use crate::types::{Sequence, Timestamp};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Magic bytes for journal entries.
const ENTRY_MAGIC: &[u8; 4] = b"NTF\0";

/// Current entry format version.
const ENTRY_VERSION: u8 = 1;

/// Magic, version, sequence, timestamp and payload length.
const HEADER_LEN: usize = 4 + 1 + 8 + 8 + 4;

/// Trailing checksum.
const TRAILER_LEN: usize = 4;

/// File-backed journal.
pub struct FileJournal {
    /// Path to the log file.
    path: PathBuf,

    /// Log file handle.
    file: Mutex<File>,

    /// Offset of each entry; index 0 holds sequence 1.
    offsets: RwLock<Vec<u64>>,

    /// Current file size (for appending).
    file_size: RwLock<u64>,

    /// Number of writes since last sync.
    writes_since_sync: Mutex<u64>,

    /// Sync every N writes.
    sync_interval: u64,
}

impl FileJournal {
    /// Default sync interval.
    pub const DEFAULT_SYNC_INTERVAL: u64 = 100;

    /// Open or create a journal with the default sync interval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create a journal.
    ///
    /// A `sync_interval` of 0 or 1 syncs after every append. An entry cut
    /// short at the end of the file (a torn write) is truncated away; any
    /// other damage is an error.
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let (offsets, valid_len) = Self::scan(&file)?;
        let on_disk = file.metadata()?.len();
        if valid_len < on_disk {
            warn!(
                path = %path.display(),
                dropped_bytes = on_disk - valid_len,
                "truncating torn journal tail"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
            offsets: RwLock::new(offsets),
            file_size: RwLock::new(valid_len),
            writes_since_sync: Mutex::new(0),
            sync_interval: sync_interval.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Walk every entry, checking order and checksums.
    ///
    /// Returns the entry offsets and the length of the valid prefix. An entry
    /// running past the end of the file is only a torn tail when no complete
    /// entry follows it; otherwise its header is damaged.
    fn scan(file: &File) -> Result<(Vec<u64>, u64)> {
        let mut handle = file.try_clone()?;
        handle.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        handle.read_to_end(&mut bytes)?;

        let mut offsets = Vec::new();
        let mut offset = 0usize;

        while offset < bytes.len() {
            let expected = Sequence(offsets.len() as u64 + 1);
            match decode_entry(&bytes[offset..])? {
                Decoded::Entry(record, len) => {
                    if record.sequence != expected {
                        return Err(LedgerError::InvalidSequence(record.sequence, expected));
                    }
                    offsets.push(offset as u64);
                    offset += len;
                }
                Decoded::Incomplete => {
                    if let Some(later) = find_entry(&bytes, offset + 1, expected) {
                        return Err(LedgerError::Corruption(format!(
                            "journal entry {} at offset {} overruns entry found at offset {}",
                            expected.0, offset, later
                        )));
                    }
                    break;
                }
            }
        }

        Ok((offsets, offset as u64))
    }
}

impl Journal for FileJournal {
    /// Append a record. A failed write or sync is rolled back, so the record
    /// is either fully in the journal or not at all.
    fn append(&self, record: &NotificationRecord) -> Result<()> {
        let mut file = self.file.lock();

        let expected = Sequence(self.offsets.read().len() as u64 + 1);
        if record.sequence != expected {
            return Err(LedgerError::InvalidSequence(record.sequence, expected));
        }

        let frame = encode_entry(record)?;
        let offset = *self.file_size.read();
        let mut writes = self.writes_since_sync.lock();
        let sync_now = *writes + 1 >= self.sync_interval;

        if let Err(e) = write_frame(&mut file, offset, &frame, sync_now) {
            if let Err(rollback) = file.set_len(offset) {
                warn!(offset, error = %rollback, "failed to roll back journal append");
            }
            warn!(sequence = record.sequence.0, error = %e, "journal append failed");
            return Err(e.into());
        }

        *writes = if sync_now { 0 } else { *writes + 1 };
        *self.file_size.write() = offset + frame.len() as u64;
        self.offsets.write().push(offset);
        trace!(sequence = record.sequence.0, offset, bytes = frame.len(), "journal append");

        Ok(())
    }

    fn read_from(&self, from: Sequence) -> Result<Vec<NotificationRecord>> {
        let mut file = self.file.lock();

        let start = from.0.saturating_sub(1) as usize;
        let (offset, count) = {
            let offsets = self.offsets.read();
            match offsets.get(start) {
                Some(offset) => (*offset, offsets.len() - start),
                None => return Ok(Vec::new()),
            }
        };
        let end = *self.file_size.read();

        file.seek(SeekFrom::Start(offset))?;
        let mut bytes = vec![0u8; (end - offset) as usize];
        file.read_exact(&mut bytes)?;

        let mut records = Vec::with_capacity(count);
        let mut pos = 0usize;
        for _ in 0..count {
            match decode_entry(&bytes[pos..])? {
                Decoded::Entry(record, len) => {
                    records.push(record);
                    pos += len;
                }
                Decoded::Incomplete => {
                    return Err(LedgerError::Corruption(format!(
                        "journal entry at offset {} is cut short",
                        offset + pos as u64
                    )))
                }
            }
        }
        Ok(records)
    }

    fn last_sequence(&self) -> Sequence {
        Sequence(self.offsets.read().len() as u64)
    }

    fn size_bytes(&self) -> u64 {
        *self.file_size.read()
    }

    fn sync(&self) -> Result<()> {
        let file = self.file.lock();
        file.sync_all()?;
        *self.writes_since_sync.lock() = 0;
        Ok(())
    }
}

fn write_frame(file: &mut File, offset: u64, frame: &[u8], sync: bool) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(frame)?;
    if sync {
        file.sync_all()?;
    }
    Ok(())
}

fn checksum(sequence: u64, timestamp: i64, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&sequence.to_le_bytes());
    hasher.update(&timestamp.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

pub(super) fn encode_entry(record: &NotificationRecord) -> Result<Vec<u8>> {
    let payload = record.notification.encode()?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| LedgerError::Serialization("notification too large".into()))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    frame.extend_from_slice(ENTRY_MAGIC);
    frame.push(ENTRY_VERSION);
    frame.extend_from_slice(&record.sequence.0.to_le_bytes());
    frame.extend_from_slice(&record.timestamp.0.to_le_bytes());
    frame.extend_from_slice(&payload_len.to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(
        &checksum(record.sequence.0, record.timestamp.0, &payload).to_le_bytes(),
    );
    Ok(frame)
}

/// One entry decoded from the front of a byte slice.
enum Decoded {
    /// A complete entry and the number of bytes it occupies.
    Entry(NotificationRecord, usize),
    /// The slice ends before the entry does.
    Incomplete,
}

fn decode_entry(bytes: &[u8]) -> Result<Decoded> {
    // Whatever part of magic and version is present must match.
    let lead = bytes.len().min(ENTRY_MAGIC.len() + 1);
    let mut expected_lead = ENTRY_MAGIC.to_vec();
    expected_lead.push(ENTRY_VERSION);
    if bytes[..lead] != expected_lead[..lead] {
        return Err(if lead > ENTRY_MAGIC.len() && bytes[..4] == ENTRY_MAGIC[..] {
            LedgerError::InvalidFormat(format!("Unsupported journal version: {}", bytes[4]))
        } else {
            LedgerError::InvalidFormat("Invalid journal entry magic".into())
        });
    }
    if bytes.len() < HEADER_LEN {
        return Ok(Decoded::Incomplete);
    }

    let sequence = u64::from_le_bytes(le_word(&bytes[5..13]));
    let timestamp = i64::from_le_bytes(le_word(&bytes[13..21]));
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[21..HEADER_LEN]);
    let payload_len = u32::from_le_bytes(len_bytes) as usize;

    // The length is checked against the bytes at hand before anything is
    // read or allocated.
    let frame_len = HEADER_LEN + payload_len + TRAILER_LEN;
    if bytes.len() < frame_len {
        return Ok(Decoded::Incomplete);
    }

    let payload = &bytes[HEADER_LEN..HEADER_LEN + payload_len];
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&bytes[HEADER_LEN + payload_len..frame_len]);
    let stored = u32::from_le_bytes(crc_bytes);
    let computed = checksum(sequence, timestamp, payload);
    if stored != computed {
        return Err(LedgerError::ChecksumMismatch {
            expected: stored,
            got: computed,
        });
    }

    let record = NotificationRecord {
        sequence: Sequence(sequence),
        timestamp: Timestamp(timestamp),
        notification: Notification::decode(payload)?,
    };
    Ok(Decoded::Entry(record, frame_len))
}

fn le_word(bytes: &[u8]) -> [u8; 8] {
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    word
}

/// Offset of the first complete, checksummed entry at or after `from` whose
/// sequence is past `after`.
fn find_entry(bytes: &[u8], from: usize, after: Sequence) -> Option<usize> {
    let mut at = from;
    while let Some(found) = bytes
        .get(at..)?
        .windows(ENTRY_MAGIC.len())
        .position(|window| window == &ENTRY_MAGIC[..])
    {
        let start = at + found;
        if let Ok(Decoded::Entry(record, _)) = decode_entry(&bytes[start..]) {
            if record.sequence > after {
                return Some(start);
            }
        }
        at = start + 1;
    }
    None
}
