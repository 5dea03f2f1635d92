//! # Social Ledger
//!
//! A minimal social-graph ledger: identities register a profile, publish
//! posts, and toggle likes and dislikes on posts.
//!
//! ## Core Concepts
//!
//! - **Actions**: Atomic, caller-issued requests (create account, edit
//!   profile, create post, like/unlike, dislike/undislike)
//! - **State machine**: Profiles, posts, per-(post, identity) reactions and
//!   the user/post counters, with the rules governing them
//! - **Notifications**: One ordered event per applied action, journaled and
//!   broadcast to subscribers
//! - **Replay**: Applying the journal from the start rebuilds the ledger
//!
//! ## Example
//!
//! ```ignore
//! use social_ledger::{Identity, Ledger, LedgerConfig, PostId};
//!
//! let ledger = Ledger::open_or_create(LedgerConfig::at("./my-ledger"))?;
//! let alice = Identity::new("0xa11ce");
//!
//! ledger.create_account(&alice, "alice", "hello", "ipfs://avatar")?;
//! let receipt = ledger.create_post(&alice, "first post", "ipfs://img", "Image")?;
//! ledger.like_post(&alice, PostId(1))?;
//! ```

pub mod action;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod notification;
pub mod state;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use action::{Action, ActionOutcome};
pub use error::{ErrorKind, LedgerError, Result};
pub use journal::{FileJournal, Journal, MemoryJournal};
pub use ledger::{replay, Ledger, LedgerConfig, Receipt};
pub use notification::{Notification, NotificationKind, NotificationRecord};
pub use state::{LedgerState, Reaction};
pub use subscriptions::{
    DropReason, LedgerEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, SubscriptionManager,
};
pub use types::*;
