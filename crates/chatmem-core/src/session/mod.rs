//! Session store: JSONL file persistence for memory sessions.
//!
//! # Disk format (JSONL)
//!
//! Each session is a `.jsonl` file under `~/.chatmem/sessions/`.
//! - Line 1: metadata `{"_type": "metadata", "id": "...", "strategy": {...}, "summary": "...", ...}`
//! - Lines 2+: exchanges `{"human": "hello", "ai": "hi", "timestamp": "..."}`

pub mod store;

pub use store::{SessionStore, StoredSessionSummary};
