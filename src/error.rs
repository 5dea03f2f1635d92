//! Error types for the ledger.

use crate::types::{Identity, PostId, ReactionState, Sequence};
use thiserror::Error;

/// Main error type for ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Caller {caller} may not act on behalf of {identity}")]
    Authorization { caller: Identity, identity: Identity },

    #[error("Profile not found: {0}")]
    ProfileNotFound(Identity),

    #[error("Post not found: {0}")]
    PostNotFound(PostId),

    #[error("Cannot {action} post {post_id} for {identity}: reaction is {state:?}")]
    InvalidReaction {
        post_id: PostId,
        identity: Identity,
        state: ReactionState,
        action: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid sequence: {0:?} (expected {1:?})")]
    InvalidSequence(Sequence, Sequence),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid ledger format: {0}")]
    InvalidFormat(String),

    #[error("Ledger is locked by another process")]
    Locked,

    #[error("Ledger not initialized")]
    NotInitialized,

    #[error("Subscription was dropped")]
    SubscriptionDropped,
}

/// Coarse classification of a [`LedgerError`].
///
/// Action failures fall into the first four kinds; everything the journal
/// or filesystem can raise is `Storage`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    State,
    Storage,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::Authorization { .. } => ErrorKind::Authorization,
            LedgerError::ProfileNotFound(_) | LedgerError::PostNotFound(_) => ErrorKind::NotFound,
            LedgerError::InvalidReaction { .. } => ErrorKind::State,
            _ => ErrorKind::Storage,
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for LedgerError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for LedgerError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        LedgerError::Deserialization(e.to_string())
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LedgerError::Validation("empty".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::PostNotFound(PostId(3)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LedgerError::ProfileNotFound(Identity::new("alice")).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(LedgerError::Locked.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_invalid_reaction_message() {
        let err = LedgerError::InvalidReaction {
            post_id: PostId(1),
            identity: Identity::new("alice"),
            state: ReactionState::None,
            action: "unlike",
        };
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(err.to_string().contains("unlike post 1"));
    }
}
