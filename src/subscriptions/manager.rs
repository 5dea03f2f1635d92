//! Subscription manager for broadcasting notifications.

use crate::error::{LedgerError, Result};
use crate::notification::NotificationRecord;
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use super::types::{
    DropReason, LedgerEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<LedgerEvent>,
    /// Whether catch-up is complete.
    caught_up: bool,
}

impl Subscription {
    /// Try to send an event. Returns false if buffer is full (subscriber will be dropped).
    fn try_send(&self, event: LedgerEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

/// Manages subscriptions and broadcasts notifications.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    ///
    /// The subscription receives nothing from [`broadcast`](Self::broadcast)
    /// until [`mark_caught_up`](Self::mark_caught_up) is called; historical
    /// records are pushed with [`send_to`](Self::send_to) in between.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.subscriptions.write().insert(
            id,
            Subscription {
                config,
                sender,
                caught_up: false,
            },
        );

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.drop_subscription(id, DropReason::Unsubscribed);
    }

    /// Remove a subscription, telling it why (best effort).
    pub fn drop_subscription(&self, id: SubscriptionId, reason: DropReason) {
        if let Some(sub) = self.subscriptions.write().remove(&id) {
            if reason == DropReason::BufferOverflow {
                warn!(subscription = id.0, "dropping slow subscriber");
            }
            let _ = sub.sender.try_send(LedgerEvent::Dropped { reason });
        }
    }

    /// Mark a subscription as caught up (finished historical replay).
    pub fn mark_caught_up(&self, id: SubscriptionId) -> Result<()> {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.get_mut(&id) {
            sub.caught_up = true;
            if !sub.try_send(LedgerEvent::CaughtUp) {
                subs.remove(&id);
                return Err(LedgerError::SubscriptionDropped);
            }
        }
        Ok(())
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Broadcast a journaled notification to caught-up, matching subscribers.
    /// Drops subscribers whose buffer is full.
    pub fn broadcast(&self, record: &NotificationRecord) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if sub.caught_up
                    && sub.config.filter.matches(record)
                    && !sub.try_send(LedgerEvent::Notification {
                        record: record.clone(),
                    })
                {
                    to_remove.push(*id);
                }
            }
        }

        for id in to_remove {
            self.drop_subscription(id, DropReason::BufferOverflow);
        }
    }

    // --- Catch-up Helpers ---

    /// Send a historical record directly to a subscription if its filter
    /// accepts it. Returns false if the subscription is gone or full.
    pub fn send_to(&self, id: SubscriptionId, record: &NotificationRecord) -> bool {
        let subs = self.subscriptions.read();
        match subs.get(&id) {
            Some(sub) if sub.config.filter.matches(record) => sub.try_send(LedgerEvent::Notification {
                record: record.clone(),
            }),
            Some(_) => true,
            None => false,
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
