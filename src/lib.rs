//! Client-side codec and message builder for a jetton wallet contract.
//!
//! Bodies are built as [`cell::Cell`] trees, hashed with the standard
//! representation hash and serialized as bags of cells. Sending is left to a
//! [`contracts::Transport`] implementation.

pub mod cell;
pub mod config;
pub mod contracts;
pub mod crypto;
pub mod messages;
