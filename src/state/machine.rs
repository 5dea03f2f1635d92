//! The ledger state machine.
//!
//! Actions are handled in two steps. [`LedgerState::plan`] validates an
//! action against the current tables without touching them and produces the
//! notification it would emit. [`LedgerState::apply`] is the only mutation
//! path: it applies a notification, checking that the counts and IDs it
//! carries agree with the tables. Journal replay goes through `apply` too.

use super::reaction::{transition, Reaction};
use crate::action::{Action, ActionOutcome};
use crate::error::{LedgerError, Result};
use crate::notification::Notification;
use crate::types::{Hash, Identity, Post, PostId, Profile, ReactionState};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// All profile, post, reaction and counter tables.
#[derive(Clone, Debug)]
pub struct LedgerState {
    profiles: HashMap<Identity, Profile>,
    posts: BTreeMap<PostId, Post>,
    /// Only non-neutral reactions are stored.
    reactions: HashMap<(PostId, Identity), ReactionState>,
    /// Author -> post IDs in creation order.
    authored: HashMap<Identity, Vec<PostId>>,
    user_count: u64,
    post_count: u64,
    allow_reregistration: bool,
}

/// Canonical, ordered view of the tables used for digests.
#[derive(Serialize)]
struct DigestView<'a> {
    user_count: u64,
    post_count: u64,
    profiles: Vec<&'a Profile>,
    posts: Vec<&'a Post>,
    reactions: Vec<(PostId, &'a Identity, ReactionState)>,
}

impl Default for LedgerState {
    /// Empty tables that allow re-registration, matching `LedgerConfig`.
    fn default() -> Self {
        Self::new(true)
    }
}

impl LedgerState {
    /// Empty tables. `allow_reregistration` controls whether CreateAccount may
    /// overwrite an existing profile.
    pub fn new(allow_reregistration: bool) -> Self {
        Self {
            profiles: HashMap::new(),
            posts: BTreeMap::new(),
            reactions: HashMap::new(),
            authored: HashMap::new(),
            user_count: 0,
            post_count: 0,
            allow_reregistration,
        }
    }

    // --- Reads ---

    pub fn profile(&self, identity: &Identity) -> Option<&Profile> {
        self.profiles.get(identity)
    }

    pub fn post(&self, post_id: PostId) -> Option<&Post> {
        self.posts.get(&post_id)
    }

    pub fn reaction(&self, post_id: PostId, identity: &Identity) -> ReactionState {
        self.reactions
            .get(&(post_id, identity.clone()))
            .copied()
            .unwrap_or_default()
    }

    pub fn posts_by(&self, author: &Identity) -> Vec<PostId> {
        self.authored.get(author).cloned().unwrap_or_default()
    }

    pub fn user_count(&self) -> u64 {
        self.user_count
    }

    pub fn post_count(&self) -> u64 {
        self.post_count
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn reaction_count(&self) -> usize {
        self.reactions.len()
    }

    /// SHA-256 over a canonical ordering of every table and counter.
    ///
    /// Two states with equal digests hold identical profiles, posts,
    /// reactions and counters.
    pub fn digest(&self) -> Result<Hash> {
        let mut profiles: Vec<&Profile> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.owner.cmp(&b.owner));

        let mut reactions: Vec<(PostId, &Identity, ReactionState)> = self
            .reactions
            .iter()
            .map(|((post_id, identity), state)| (*post_id, identity, *state))
            .collect();
        reactions.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let view = DigestView {
            user_count: self.user_count,
            post_count: self.post_count,
            profiles,
            posts: self.posts.values().collect(),
            reactions,
        };

        Ok(Hash::from_bytes(&serde_json::to_vec(&view)?))
    }

    // --- Planning ---

    /// Validate `action` issued by `caller` and build the notification it
    /// would emit. Never mutates.
    pub fn plan(&self, caller: &Identity, action: &Action) -> Result<Notification> {
        match action {
            Action::CreateAccount {
                username,
                biography,
                profile_picture_url,
            } => {
                require_non_empty("username", username)?;
                if !self.allow_reregistration && self.profiles.contains_key(caller) {
                    return Err(LedgerError::Validation(format!(
                        "{} already has a profile",
                        caller
                    )));
                }
                Ok(Notification::AccountCreated {
                    identity: caller.clone(),
                    username: username.clone(),
                    biography: biography.clone(),
                    profile_picture_url: profile_picture_url.clone(),
                })
            }

            Action::EditProfile {
                identity,
                username,
                biography,
                profile_picture_url,
            } => {
                require_non_empty("username", username)?;
                if caller != identity {
                    return Err(LedgerError::Authorization {
                        caller: caller.clone(),
                        identity: identity.clone(),
                    });
                }
                self.require_profile(identity)?;
                Ok(Notification::ProfileUpdated {
                    identity: identity.clone(),
                    username: username.clone(),
                    biography: biography.clone(),
                    profile_picture_url: profile_picture_url.clone(),
                })
            }

            Action::CreatePost {
                description,
                url,
                post_type,
            } => {
                require_non_empty("post description", description)?;
                self.require_profile(caller)?;
                Ok(Notification::PostCreated {
                    post_id: PostId(self.post_count + 1),
                    author: caller.clone(),
                    description: description.clone(),
                    url: url.clone(),
                    post_type: post_type.clone(),
                })
            }

            Action::LikePost { post_id } => {
                self.require_post(*post_id)?;
                self.require_profile(caller)?;
                let (_, post) = self.react(caller, *post_id, Reaction::Like)?;
                Ok(Notification::PostLiked {
                    identity: caller.clone(),
                    post_id: *post_id,
                    like_count: post.like_count,
                })
            }

            Action::UnlikePost { post_id } => {
                self.require_post(*post_id)?;
                let (_, post) = self.react(caller, *post_id, Reaction::Unlike)?;
                Ok(Notification::PostUnliked {
                    identity: caller.clone(),
                    post_id: *post_id,
                    like_count: post.like_count,
                })
            }

            Action::DislikePost { post_id } => {
                self.require_post(*post_id)?;
                self.require_profile(caller)?;
                let (_, post) = self.react(caller, *post_id, Reaction::Dislike)?;
                Ok(Notification::PostDisliked {
                    identity: caller.clone(),
                    post_id: *post_id,
                    dislike_count: post.dislike_count,
                })
            }

            Action::UndislikePost { post_id } => {
                self.require_post(*post_id)?;
                let (_, post) = self.react(caller, *post_id, Reaction::Undislike)?;
                Ok(Notification::PostUndisliked {
                    identity: caller.clone(),
                    post_id: *post_id,
                    dislike_count: post.dislike_count,
                })
            }
        }
    }

    // --- Applying ---

    /// Apply a notification to the tables.
    ///
    /// Fails with `Corruption`, leaving the tables untouched, when the
    /// notification disagrees with the current state (wrong next post ID,
    /// counts that do not follow from the reaction transition, edits of a
    /// missing profile).
    pub fn apply(&mut self, notification: &Notification) -> Result<ActionOutcome> {
        match notification {
            Notification::AccountCreated {
                identity,
                username,
                biography,
                profile_picture_url,
            } => {
                self.user_count += 1;
                self.profiles.insert(
                    identity.clone(),
                    Profile {
                        owner: identity.clone(),
                        username: username.clone(),
                        biography: biography.clone(),
                        profile_picture_url: profile_picture_url.clone(),
                    },
                );
                Ok(ActionOutcome::AccountCreated {
                    user_count: self.user_count,
                })
            }

            Notification::ProfileUpdated {
                identity,
                username,
                biography,
                profile_picture_url,
            } => {
                let profile = self.profiles.get_mut(identity).ok_or_else(|| {
                    LedgerError::Corruption(format!("profile update for unknown {}", identity))
                })?;
                profile.username = username.clone();
                profile.biography = biography.clone();
                profile.profile_picture_url = profile_picture_url.clone();
                Ok(ActionOutcome::ProfileUpdated)
            }

            Notification::PostCreated {
                post_id,
                author,
                description,
                url,
                post_type,
            } => {
                let expected = PostId(self.post_count + 1);
                if *post_id != expected {
                    return Err(LedgerError::Corruption(format!(
                        "post created out of order: expected {}, got {}",
                        expected, post_id
                    )));
                }
                self.post_count += 1;
                self.posts.insert(
                    *post_id,
                    Post {
                        id: *post_id,
                        author: author.clone(),
                        description: description.clone(),
                        url: url.clone(),
                        post_type: post_type.clone(),
                        like_count: 0,
                        dislike_count: 0,
                    },
                );
                self.authored
                    .entry(author.clone())
                    .or_default()
                    .push(*post_id);
                Ok(ActionOutcome::PostCreated { post_id: *post_id })
            }

            Notification::PostLiked {
                identity,
                post_id,
                like_count,
            } => self.apply_reaction(identity, *post_id, Reaction::Like, *like_count),

            Notification::PostUnliked {
                identity,
                post_id,
                like_count,
            } => self.apply_reaction(identity, *post_id, Reaction::Unlike, *like_count),

            Notification::PostDisliked {
                identity,
                post_id,
                dislike_count,
            } => self.apply_reaction(identity, *post_id, Reaction::Dislike, *dislike_count),

            Notification::PostUndisliked {
                identity,
                post_id,
                dislike_count,
            } => self.apply_reaction(identity, *post_id, Reaction::Undislike, *dislike_count),
        }
    }

    fn apply_reaction(
        &mut self,
        identity: &Identity,
        post_id: PostId,
        reaction: Reaction,
        reported: u64,
    ) -> Result<ActionOutcome> {
        let (to, updated) = self.react(identity, post_id, reaction).map_err(|e| {
            LedgerError::Corruption(format!("cannot replay {}: {}", reaction.verb(), e))
        })?;

        let computed = match reaction {
            Reaction::Like | Reaction::Unlike => updated.like_count,
            Reaction::Dislike | Reaction::Undislike => updated.dislike_count,
        };
        if computed != reported {
            return Err(LedgerError::Corruption(format!(
                "{} on post {} reports count {}, state gives {}",
                reaction.verb(),
                post_id,
                reported,
                computed
            )));
        }

        let outcome = ActionOutcome::Reacted {
            post_id,
            like_count: updated.like_count,
            dislike_count: updated.dislike_count,
        };

        let key = (post_id, identity.clone());
        match to {
            ReactionState::None => {
                self.reactions.remove(&key);
            }
            state => {
                self.reactions.insert(key, state);
            }
        }
        self.posts.insert(post_id, updated);

        Ok(outcome)
    }

    // --- Helpers ---

    /// Compute the reaction state and post counters after `reaction`,
    /// without storing them.
    fn react(
        &self,
        identity: &Identity,
        post_id: PostId,
        reaction: Reaction,
    ) -> Result<(ReactionState, Post)> {
        let post = self.require_post(post_id)?;
        let from = self.reaction(post_id, identity);

        let step = transition(from, reaction).ok_or_else(|| LedgerError::InvalidReaction {
            post_id,
            identity: identity.clone(),
            state: from,
            action: reaction.verb(),
        })?;

        let mut updated = post.clone();
        updated.like_count = shift(updated.like_count, step.like_delta, post_id)?;
        updated.dislike_count = shift(updated.dislike_count, step.dislike_delta, post_id)?;
        Ok((step.to, updated))
    }

    fn require_profile(&self, identity: &Identity) -> Result<&Profile> {
        self.profiles
            .get(identity)
            .ok_or_else(|| LedgerError::ProfileNotFound(identity.clone()))
    }

    fn require_post(&self, post_id: PostId) -> Result<&Post> {
        self.posts
            .get(&post_id)
            .ok_or(LedgerError::PostNotFound(post_id))
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(LedgerError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn shift(count: u64, delta: i64, post_id: PostId) -> Result<u64> {
    count.checked_add_signed(delta).ok_or_else(|| {
        LedgerError::Corruption(format!("counter underflow on post {}", post_id))
    })
}
