//! JSONL activity trail.
//!
//! Mirrors committed audit entries into per-project JSONL files under the
//! configured trail directory.

pub mod writer;
