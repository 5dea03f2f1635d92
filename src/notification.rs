//! Notifications emitted by applied actions.
//!
//! Every successful action produces exactly one [`Notification`] describing
//! the resulting state delta. The ledger stamps it with a [`Sequence`] and a
//! [`Timestamp`] and journals it as a [`NotificationRecord`]; consumers rely
//! on the strictly increasing sequence to rebuild state.

use crate::error::Result;
use crate::types::{Identity, PostId, Sequence, Timestamp};
use serde::{Deserialize, Serialize};

/// Event describing the outcome of a successful action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    AccountCreated {
        identity: Identity,
        username: String,
        biography: String,
        profile_picture_url: String,
    },
    ProfileUpdated {
        identity: Identity,
        username: String,
        biography: String,
        profile_picture_url: String,
    },
    PostCreated {
        post_id: PostId,
        author: Identity,
        description: String,
        url: String,
        post_type: String,
    },
    PostLiked {
        identity: Identity,
        post_id: PostId,
        like_count: u64,
    },
    PostUnliked {
        identity: Identity,
        post_id: PostId,
        like_count: u64,
    },
    PostDisliked {
        identity: Identity,
        post_id: PostId,
        dislike_count: u64,
    },
    PostUndisliked {
        identity: Identity,
        post_id: PostId,
        dislike_count: u64,
    },
}

/// Discriminant of a [`Notification`], used for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AccountCreated,
    ProfileUpdated,
    PostCreated,
    PostLiked,
    PostUnliked,
    PostDisliked,
    PostUndisliked,
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::AccountCreated { .. } => NotificationKind::AccountCreated,
            Notification::ProfileUpdated { .. } => NotificationKind::ProfileUpdated,
            Notification::PostCreated { .. } => NotificationKind::PostCreated,
            Notification::PostLiked { .. } => NotificationKind::PostLiked,
            Notification::PostUnliked { .. } => NotificationKind::PostUnliked,
            Notification::PostDisliked { .. } => NotificationKind::PostDisliked,
            Notification::PostUndisliked { .. } => NotificationKind::PostUndisliked,
        }
    }

    /// The identity whose action produced this notification.
    pub fn identity(&self) -> &Identity {
        match self {
            Notification::AccountCreated { identity, .. }
            | Notification::ProfileUpdated { identity, .. }
            | Notification::PostLiked { identity, .. }
            | Notification::PostUnliked { identity, .. }
            | Notification::PostDisliked { identity, .. }
            | Notification::PostUndisliked { identity, .. } => identity,
            Notification::PostCreated { author, .. } => author,
        }
    }

    /// The post this notification concerns, if any.
    pub fn post_id(&self) -> Option<PostId> {
        match self {
            Notification::AccountCreated { .. } | Notification::ProfileUpdated { .. } => None,
            Notification::PostCreated { post_id, .. }
            | Notification::PostLiked { post_id, .. }
            | Notification::PostUnliked { post_id, .. }
            | Notification::PostDisliked { post_id, .. }
            | Notification::PostUndisliked { post_id, .. } => Some(*post_id),
        }
    }

    /// Encode as MessagePack (field names included).
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decode from MessagePack produced by [`Notification::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// A notification as journaled: sequenced and timestamped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub sequence: Sequence,
    pub timestamp: Timestamp,
    pub notification: Notification,
}
