//! Ledger state machine.
//!
//! Profiles, posts, per-(post, identity) reactions and the two counters,
//! together with the transition rules that govern them.

mod machine;
mod reaction;

pub use machine::LedgerState;
pub use reaction::{transition, Reaction, Transition};
