//! QUARK BETS — sports wager ledger
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry points.

pub mod analytics;
pub mod api;
pub mod config;
pub mod engine;
pub mod storage;
pub mod types;
