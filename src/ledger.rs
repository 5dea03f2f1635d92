//! Main Ledger struct tying state, journal and subscriptions together.

use crate::action::{Action, ActionOutcome};
use crate::error::{LedgerError, Result};
use crate::journal::{FileJournal, Journal, MemoryJournal};
use crate::notification::NotificationRecord;
use crate::state::LedgerState;
use crate::subscriptions::{
    DropReason, SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{
    Hash, Identity, LedgerStats, Post, PostId, Profile, ReactionState, Sequence, Timestamp,
};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Ledger configuration.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Directory holding the journal. `None` keeps everything in memory.
    pub path: Option<PathBuf>,

    /// Whether to create the ledger if it doesn't exist.
    pub create_if_missing: bool,

    /// Sync the journal every N appends (0 = every append).
    pub sync_interval: u64,

    /// Whether CreateAccount may overwrite an existing profile.
    pub allow_reregistration: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            create_if_missing: true,
            sync_interval: FileJournal::DEFAULT_SYNC_INTERVAL,
            allow_reregistration: true,
        }
    }
}

impl LedgerConfig {
    /// On-disk ledger at `path` with default settings.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Result of a successful action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub outcome: ActionOutcome,
    /// The journaled notification describing the change.
    pub record: NotificationRecord,
}

/// Magic bytes for the ledger manifest.
const LEDGER_MAGIC: &[u8; 4] = b"SLG\0";

/// Current ledger format version.
const LEDGER_VERSION: u8 = 1;

/// The social ledger.
///
/// Actions are executed one at a time under a single write lock: planned
/// against the current state, journaled, applied, then broadcast to
/// subscribers. A failed action changes nothing and emits nothing.
pub struct Ledger {
    /// Ledger configuration.
    config: LedgerConfig,

    /// Lock file for exclusive access (on-disk ledgers only).
    _lock_file: Option<File>,

    /// Ordered notification journal.
    journal: Box<dyn Journal>,

    /// Profiles, posts, reactions and counters.
    state: RwLock<LedgerState>,

    /// Live notification subscribers.
    subscriptions: SubscriptionManager,

    /// Serializes actions.
    write_lock: Mutex<()>,
}

impl Ledger {
    /// A fresh ledger with no backing directory.
    pub fn in_memory() -> Self {
        Self::with_journal(LedgerConfig::default(), None, Box::new(MemoryJournal::new()))
    }

    /// Open an existing ledger or create a new one.
    pub fn open_or_create(config: LedgerConfig) -> Result<Self> {
        let path = match &config.path {
            Some(path) => path.clone(),
            None => return Ok(Self::with_journal(config, None, Box::new(MemoryJournal::new()))),
        };

        if path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(LedgerError::NotInitialized)
        }
    }

    /// Create an on-disk ledger. An existing ledger at the path is opened
    /// as-is.
    pub fn create(config: LedgerConfig) -> Result<Self> {
        let path = config.path.clone().ok_or(LedgerError::NotInitialized)?;

        fs::create_dir_all(&path)?;
        if !path.join("MANIFEST").exists() {
            Self::write_manifest(&path)?;
            info!(path = %path.display(), "created ledger");
        }

        Self::open(config)
    }

    /// Open an existing on-disk ledger, replaying its journal.
    pub fn open(config: LedgerConfig) -> Result<Self> {
        let path = config.path.clone().ok_or(LedgerError::NotInitialized)?;

        Self::verify_manifest(&path)?;
        let lock_file = Self::acquire_lock(&path)?;

        let journal =
            FileJournal::open_with_sync_interval(path.join("notifications.log"), config.sync_interval)?;

        let mut state = LedgerState::new(config.allow_reregistration);
        let replayed = replay(&journal, &mut state)?;
        info!(path = %path.display(), notifications = replayed, "opened ledger");

        let ledger = Self::with_journal(config, Some(lock_file), Box::new(journal));
        *ledger.state.write() = state;
        Ok(ledger)
    }

    fn with_journal(config: LedgerConfig, lock_file: Option<File>, journal: Box<dyn Journal>) -> Self {
        let state = LedgerState::new(config.allow_reregistration);
        Self {
            config,
            _lock_file: lock_file,
            journal,
            state: RwLock::new(state),
            subscriptions: SubscriptionManager::new(),
            write_lock: Mutex::new(()),
        }
    }

    // --- Actions ---

    /// Execute `action` on behalf of `caller`.
    pub fn execute(&self, caller: &Identity, action: Action) -> Result<Receipt> {
        let _lock = self.write_lock.lock();

        let planned = self.state.read().plan(caller, &action);
        let notification = match planned {
            Ok(notification) => notification,
            Err(e) => {
                warn!(caller = %caller, action = action.name(), kind = ?e.kind(), error = %e, "action rejected");
                return Err(e);
            }
        };

        let record = NotificationRecord {
            sequence: self.journal.last_sequence().next(),
            timestamp: Timestamp::now(),
            notification,
        };
        self.journal.append(&record)?;

        // Planning already validated the notification against this state, so
        // apply cannot disagree with it unless the state machine is broken.
        let outcome = self.state.write().apply(&record.notification)?;
        debug!(
            sequence = record.sequence.0,
            caller = %caller,
            action = action.name(),
            "action applied"
        );

        self.subscriptions.broadcast(&record);

        Ok(Receipt { outcome, record })
    }

    pub fn create_account(
        &self,
        caller: &Identity,
        username: &str,
        biography: &str,
        profile_picture_url: &str,
    ) -> Result<Receipt> {
        self.execute(
            caller,
            Action::create_account(username, biography, profile_picture_url),
        )
    }

    pub fn edit_profile(
        &self,
        caller: &Identity,
        identity: &Identity,
        username: &str,
        biography: &str,
        profile_picture_url: &str,
    ) -> Result<Receipt> {
        self.execute(
            caller,
            Action::edit_profile(identity.clone(), username, biography, profile_picture_url),
        )
    }

    pub fn create_post(
        &self,
        author: &Identity,
        description: &str,
        url: &str,
        post_type: &str,
    ) -> Result<Receipt> {
        self.execute(author, Action::create_post(description, url, post_type))
    }

    pub fn like_post(&self, caller: &Identity, post_id: PostId) -> Result<Receipt> {
        self.execute(caller, Action::LikePost { post_id })
    }

    pub fn unlike_post(&self, caller: &Identity, post_id: PostId) -> Result<Receipt> {
        self.execute(caller, Action::UnlikePost { post_id })
    }

    pub fn dislike_post(&self, caller: &Identity, post_id: PostId) -> Result<Receipt> {
        self.execute(caller, Action::DislikePost { post_id })
    }

    pub fn undislike_post(&self, caller: &Identity, post_id: PostId) -> Result<Receipt> {
        self.execute(caller, Action::UndislikePost { post_id })
    }

    // --- Reads ---

    pub fn profile(&self, identity: &Identity) -> Option<Profile> {
        self.state.read().profile(identity).cloned()
    }

    pub fn post(&self, post_id: PostId) -> Option<Post> {
        self.state.read().post(post_id).cloned()
    }

    pub fn reaction(&self, post_id: PostId, identity: &Identity) -> ReactionState {
        self.state.read().reaction(post_id, identity)
    }

    /// IDs of posts authored by `author`, oldest first.
    pub fn posts_by(&self, author: &Identity) -> Vec<PostId> {
        self.state.read().posts_by(author)
    }

    pub fn user_count(&self) -> u64 {
        self.state.read().user_count()
    }

    pub fn post_count(&self) -> u64 {
        self.state.read().post_count()
    }

    /// Sequence of the most recent notification.
    pub fn head(&self) -> Sequence {
        self.journal.last_sequence()
    }

    /// Journaled notifications from `from` onwards.
    pub fn notifications_from(&self, from: Sequence) -> Result<Vec<NotificationRecord>> {
        self.journal.read_from(from)
    }

    /// Digest of the full ledger state; equal digests mean equal tables.
    pub fn state_digest(&self) -> Result<Hash> {
        self.state.read().digest()
    }

    /// Get ledger statistics.
    pub fn stats(&self) -> LedgerStats {
        let state = self.state.read();
        LedgerStats {
            user_count: state.user_count(),
            post_count: state.post_count(),
            profile_count: state.profile_count() as u64,
            reaction_count: state.reaction_count() as u64,
            notification_count: self.journal.len(),
            journal_size_bytes: self.journal.size_bytes(),
        }
    }

    // --- Subscriptions ---

    /// Subscribe to notifications.
    ///
    /// With `from_sequence` set, journaled notifications from that sequence
    /// are delivered first, then `CaughtUp`, then live notifications. No
    /// action runs while catch-up is in progress, so nothing is missed or
    /// duplicated.
    pub fn subscribe(&self, config: SubscriptionConfig) -> Result<SubscriptionHandle> {
        let _lock = self.write_lock.lock();

        let from = config.from_sequence;
        let handle = self.subscriptions.subscribe(config);

        if let Some(from) = from {
            for record in self.journal.read_from(from)? {
                if !self.subscriptions.send_to(handle.id, &record) {
                    self.subscriptions
                        .drop_subscription(handle.id, DropReason::BufferOverflow);
                    return Err(LedgerError::SubscriptionDropped);
                }
            }
        }

        self.subscriptions.mark_caught_up(handle.id)?;
        Ok(handle)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    // --- Ledger Operations ---

    /// Flush the journal to disk.
    pub fn sync(&self) -> Result<()> {
        self.journal.sync()
    }

    /// Ledger directory, if on disk.
    pub fn path(&self) -> Option<&Path> {
        self.config.path.as_deref()
    }

    // --- Private Helpers ---

    fn write_manifest(path: &Path) -> Result<()> {
        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(LEDGER_MAGIC)?;
        file.write_all(&[LEDGER_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != LEDGER_MAGIC {
            return Err(LedgerError::InvalidFormat("Invalid ledger magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != LEDGER_VERSION {
            return Err(LedgerError::InvalidFormat(format!(
                "Unsupported ledger version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join("LOCK"))?;

        lock_file.try_lock_exclusive().map_err(|_| LedgerError::Locked)?;

        Ok(lock_file)
    }
}

/// Rebuild `state` by applying every journaled notification in order.
///
/// Returns the number of notifications applied.
pub fn replay(journal: &dyn Journal, state: &mut LedgerState) -> Result<u64> {
    let mut applied = 0;
    for record in journal.read_from(Sequence(1))? {
        state.apply(&record.notification)?;
        applied += 1;
    }
    Ok(applied)
}
