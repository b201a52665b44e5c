//! Core of chatmem: shared types, configuration, the conversation memory
//! manager and its JSONL session store.

pub mod config;
pub mod memory;
pub mod session;
pub mod types;
pub mod utils;
