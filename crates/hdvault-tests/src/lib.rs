//! Integration test suite for hdvault.
//!
//! Property tests exercise derivation, tracking, and signing over random
//! seeds and paths. End-to-end tests drive a whole wallet through discovery
//! against a mock ledger and through save/load cycles on disk.

pub mod helpers;
