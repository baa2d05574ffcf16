//! Deterministic JSON serialization for files written by the client.

mod json;

pub use json::*;
