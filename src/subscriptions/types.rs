//! Subscription types for live notification delivery.

use crate::notification::{NotificationKind, NotificationRecord};
use crate::types::{Identity, PostId, Sequence};
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Starting sequence for catch-up (None = live only).
    pub from_sequence: Option<Sequence>,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            from_sequence: None,
            filter: SubscriptionFilter::default(),
        }
    }
}

impl SubscriptionConfig {
    /// Replay the whole journal, then stream live.
    pub fn from_start() -> Self {
        Self {
            from_sequence: Some(Sequence(1)),
            ..Default::default()
        }
    }
}

/// Filter criteria for subscriptions. Empty criteria match everything.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Notification kinds (None = all kinds).
    pub kinds: Option<Vec<NotificationKind>>,

    /// Only notifications caused by this identity.
    pub identity: Option<Identity>,

    /// Only notifications about this post.
    pub post_id: Option<PostId>,
}

impl SubscriptionFilter {
    /// Subscribe to specific notification kinds.
    pub fn kinds(kinds: Vec<NotificationKind>) -> Self {
        Self {
            kinds: Some(kinds),
            ..Default::default()
        }
    }

    /// Subscribe to one identity's activity.
    pub fn identity(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..Default::default()
        }
    }

    /// Subscribe to one post's activity.
    pub fn post(post_id: PostId) -> Self {
        Self {
            post_id: Some(post_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &NotificationRecord) -> bool {
        let notification = &record.notification;

        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&notification.kind()) {
                return false;
            }
        }

        if let Some(ref identity) = self.identity {
            if notification.identity() != identity {
                return false;
            }
        }

        if let Some(post_id) = self.post_id {
            if notification.post_id() != Some(post_id) {
                return false;
            }
        }

        true
    }
}

/// Events delivered to subscribers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A notification was journaled.
    Notification { record: NotificationRecord },

    /// Finished historical catch-up, now streaming live.
    CaughtUp,

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<LedgerEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<LedgerEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<LedgerEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<LedgerEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain every notification currently buffered, skipping lifecycle events.
    pub fn drain_notifications(&self) -> Vec<NotificationRecord> {
        self.receiver
            .try_iter()
            .filter_map(|event| match event {
                LedgerEvent::Notification { record } => Some(record),
                _ => None,
            })
            .collect()
    }
}
