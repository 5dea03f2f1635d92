//! Action requests and their success values.

use crate::types::{Identity, PostId};
use serde::{Deserialize, Serialize};

/// A caller-initiated state transition request.
///
/// The caller identity is supplied alongside the action (see
/// [`Ledger::execute`](crate::Ledger::execute)); only `EditProfile` names a
/// target identity explicitly, every other action acts as the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CreateAccount {
        username: String,
        biography: String,
        profile_picture_url: String,
    },
    EditProfile {
        identity: Identity,
        username: String,
        biography: String,
        profile_picture_url: String,
    },
    CreatePost {
        description: String,
        url: String,
        post_type: String,
    },
    LikePost { post_id: PostId },
    UnlikePost { post_id: PostId },
    DislikePost { post_id: PostId },
    UndislikePost { post_id: PostId },
}

impl Action {
    pub fn create_account(
        username: impl Into<String>,
        biography: impl Into<String>,
        profile_picture_url: impl Into<String>,
    ) -> Self {
        Action::CreateAccount {
            username: username.into(),
            biography: biography.into(),
            profile_picture_url: profile_picture_url.into(),
        }
    }

    pub fn edit_profile(
        identity: Identity,
        username: impl Into<String>,
        biography: impl Into<String>,
        profile_picture_url: impl Into<String>,
    ) -> Self {
        Action::EditProfile {
            identity,
            username: username.into(),
            biography: biography.into(),
            profile_picture_url: profile_picture_url.into(),
        }
    }

    pub fn create_post(
        description: impl Into<String>,
        url: impl Into<String>,
        post_type: impl Into<String>,
    ) -> Self {
        Action::CreatePost {
            description: description.into(),
            url: url.into(),
            post_type: post_type.into(),
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateAccount { .. } => "create_account",
            Action::EditProfile { .. } => "edit_profile",
            Action::CreatePost { .. } => "create_post",
            Action::LikePost { .. } => "like_post",
            Action::UnlikePost { .. } => "unlike_post",
            Action::DislikePost { .. } => "dislike_post",
            Action::UndislikePost { .. } => "undislike_post",
        }
    }
}

/// Success value of an applied action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    AccountCreated { user_count: u64 },
    ProfileUpdated,
    PostCreated { post_id: PostId },
    /// Counts of the post after a like/unlike/dislike/undislike.
    Reacted {
        post_id: PostId,
        like_count: u64,
        dislike_count: u64,
    },
}
