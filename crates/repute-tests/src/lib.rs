//! Cross-crate test suite for Repute.
//!
//! Property tests pin the scoring invariants over generated inputs; the
//! end-to-end tests drive the jobs and the RPC handlers over a seeded store.

pub mod helpers;
