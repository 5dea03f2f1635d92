//! Per-(post, identity) reaction transitions.

use crate::types::ReactionState;
use serde::{Deserialize, Serialize};

/// A toggle requested against a post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reaction {
    Like,
    Unlike,
    Dislike,
    Undislike,
}

impl Reaction {
    pub fn verb(self) -> &'static str {
        match self {
            Reaction::Like => "like",
            Reaction::Unlike => "unlike",
            Reaction::Dislike => "dislike",
            Reaction::Undislike => "undislike",
        }
    }
}

/// Result of a permitted transition: the new state and the counter deltas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub to: ReactionState,
    pub like_delta: i64,
    pub dislike_delta: i64,
}

impl Transition {
    const fn new(to: ReactionState, like_delta: i64, dislike_delta: i64) -> Self {
        Self {
            to,
            like_delta,
            dislike_delta,
        }
    }
}

/// Look up the transition for `reaction` from `from`.
///
/// Returns `None` for undefined transitions (unlike when not liked,
/// undislike when not disliked). Repeating a like or dislike is a no-op
/// transition with zero deltas.
pub fn transition(from: ReactionState, reaction: Reaction) -> Option<Transition> {
    use ReactionState::{Disliked, Liked, None as Neutral};

    match (from, reaction) {
        (Neutral, Reaction::Like) => Some(Transition::new(Liked, 1, 0)),
        (Liked, Reaction::Like) => Some(Transition::new(Liked, 0, 0)),
        (Disliked, Reaction::Like) => Some(Transition::new(Liked, 1, -1)),

        (Neutral, Reaction::Dislike) => Some(Transition::new(Disliked, 0, 1)),
        (Disliked, Reaction::Dislike) => Some(Transition::new(Disliked, 0, 0)),
        (Liked, Reaction::Dislike) => Some(Transition::new(Disliked, -1, 1)),

        (Liked, Reaction::Unlike) => Some(Transition::new(Neutral, -1, 0)),
        (Disliked, Reaction::Undislike) => Some(Transition::new(Neutral, 0, -1)),

        (Neutral | Disliked, Reaction::Unlike) | (Neutral | Liked, Reaction::Undislike) => None,
    }
}
