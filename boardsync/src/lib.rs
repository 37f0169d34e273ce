//! `BoardSync` client library.
//!
//! Holds the local board state (cache, reconciler, optimistic
//! dispatcher), the async networking bridge to the sync channel, and
//! the layered client configuration. The CLI binary in `main.rs` is a
//! thin shell over these modules.

pub mod board;
pub mod config;
pub mod net;
