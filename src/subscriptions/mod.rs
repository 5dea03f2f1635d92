//! Subscription system for live notifications.
//!
//! Subscribers receive journaled notifications in sequence order. A
//! subscription may start with a historical catch-up from a given sequence,
//! after which a `CaughtUp` event marks the switch to live delivery.
//! Buffers are bounded; a subscriber that falls behind is dropped.
//!
//! # Example
//!
//! ```ignore
//! let handle = ledger.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::post(PostId(1)),
//!     from_sequence: Some(Sequence(1)),
//!     ..Default::default()
//! })?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(LedgerEvent::Notification { record }) => println!("{:?}", record),
//!         Ok(LedgerEvent::CaughtUp) => println!("Now live!"),
//!         Ok(LedgerEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, LedgerEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};
