//! `BoardSync` server library.
//!
//! Exposes the authoritative board server for use in tests and
//! embedding: the task store with its order assigner, the identity
//! seam, the configuration loader, and the WebSocket sync channel.

pub mod auth;
pub mod board;
pub mod config;
pub mod server;
