//! Utilities for tests that need a peer: two connections wired back to back through an
//!  in-memory link.

pub mod loopback;
