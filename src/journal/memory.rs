//! In-memory journal for ledgers without a backing directory.

use super::log::encode_entry;
use super::Journal;
use crate::error::{LedgerError, Result};
use crate::notification::NotificationRecord;
use crate::types::Sequence;
use parking_lot::RwLock;

/// Journal kept entirely in memory.
#[derive(Default)]
pub struct MemoryJournal {
    records: RwLock<Vec<NotificationRecord>>,
    /// Bytes the records would take in a file journal.
    size: RwLock<u64>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Journal for MemoryJournal {
    fn append(&self, record: &NotificationRecord) -> Result<()> {
        let mut records = self.records.write();
        let expected = Sequence(records.len() as u64 + 1);
        if record.sequence != expected {
            return Err(LedgerError::InvalidSequence(record.sequence, expected));
        }
        let frame_len = encode_entry(record)?.len() as u64;
        records.push(record.clone());
        *self.size.write() += frame_len;
        Ok(())
    }

    fn read_from(&self, from: Sequence) -> Result<Vec<NotificationRecord>> {
        let start = from.0.saturating_sub(1) as usize;
        let records = self.records.read();
        Ok(records.get(start..).map(<[_]>::to_vec).unwrap_or_default())
    }

    fn last_sequence(&self) -> Sequence {
        Sequence(self.records.read().len() as u64)
    }

    fn size_bytes(&self) -> u64 {
        *self.size.read()
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Notification;
    use crate::types::{Identity, Timestamp};

    fn record(seq: u64) -> NotificationRecord {
        NotificationRecord {
            sequence: Sequence(seq),
            timestamp: Timestamp::now(),
            notification: Notification::AccountCreated {
                identity: Identity::new(format!("user{}", seq)),
                username: "name".into(),
                biography: String::new(),
                profile_picture_url: String::new(),
            },
        }
    }

    #[test]
    fn test_append_and_read_from() {
        let journal = MemoryJournal::new();
        for seq in 1..=4 {
            journal.append(&record(seq)).unwrap();
        }
        assert_eq!(journal.last_sequence(), Sequence(4));
        assert_eq!(journal.read_from(Sequence(0)).unwrap().len(), 4);
        assert_eq!(journal.read_from(Sequence(1)).unwrap().len(), 4);

        let tail = journal.read_from(Sequence(3)).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, Sequence(3));

        assert!(journal.read_from(Sequence(9)).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_gap() {
        let journal = MemoryJournal::new();
        journal.append(&record(1)).unwrap();
        let err = journal.append(&record(3)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidSequence(Sequence(3), Sequence(2))));
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn test_size_matches_encoded_frames() {
        let journal = MemoryJournal::new();
        assert_eq!(journal.size_bytes(), 0);

        journal.append(&record(1)).unwrap();
        journal.append(&record(2)).unwrap();
        let expected: usize = [record(1), record(2)]
            .iter()
            .map(|r| encode_entry(r).unwrap().len())
            .sum();
        assert_eq!(journal.size_bytes(), expected as u64);

        // A rejected append adds nothing.
        journal.append(&record(5)).unwrap_err();
        assert_eq!(journal.size_bytes(), expected as u64);
    }
}
