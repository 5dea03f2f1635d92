//! Notification journal.
//!
//! The journal is the append-only, strictly ordered sequence of
//! [`NotificationRecord`]s. Sequences start at 1 and increase by one per
//! append. Replaying a journal from the start through the state machine
//! reconstructs the ledger.

mod log;
mod memory;

pub use log::FileJournal;
pub use memory::MemoryJournal;

use crate::error::Result;
use crate::notification::NotificationRecord;
use crate::types::Sequence;

/// Storage for the ordered notification stream.
pub trait Journal: Send + Sync {
    /// Append a record. Its sequence must directly follow
    /// [`Journal::last_sequence`].
    fn append(&self, record: &NotificationRecord) -> Result<()>;

    /// All records with sequence >= `from`, in order.
    fn read_from(&self, from: Sequence) -> Result<Vec<NotificationRecord>>;

    /// Sequence of the newest record, `Sequence(0)` when empty.
    fn last_sequence(&self) -> Sequence;

    /// Bytes held by the journal, counted in the on-disk entry format.
    fn size_bytes(&self) -> u64;

    /// Flush pending writes to durable storage.
    fn sync(&self) -> Result<()>;

    fn len(&self) -> u64 {
        self.last_sequence().0
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
