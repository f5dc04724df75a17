//! Deterministic JSON serialization for the files the session manager
//! writes.
//!
//! - 2-space indentation
//! - Trailing newline
//! - UTF-8 encoding without BOM

mod json;

pub use json::*;
