//! Per-session conversation memory.
//!
//! A [`MemoryManager`] owns a set of named sessions. Each session records
//! human/AI exchanges under one of four strategies:
//!
//! | Strategy         | Raw exchanges kept  | Summary |
//! |------------------|---------------------|---------|
//! | `buffer`         | all                 | no      |
//! | `buffer_window`  | newest K            | no      |
//! | `summary`        | none once folded    | yes     |
//! | `summary_buffer` | newest N            | yes     |
//!
//! Summaries are produced by a [`Condenser`]. When it fails, exchanges stay
//! raw and are folded on a later append.
//!
//! ```no_run
//! # async fn demo() -> chatmem_core::memory::Result<()> {
//! use chatmem_core::memory::{MemoryManager, MemoryParams};
//!
//! let memory = MemoryManager::default();
//! memory.create("noc-shift", "buffer_window", &MemoryParams::window(2))?;
//! memory.append("noc-shift", "hi", "hello").await?;
//! memory.append("noc-shift", "bye", "goodbye").await?;
//! memory.append("noc-shift", "ok", "sure").await?;
//! assert_eq!(memory.history("noc-shift")?.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod condense;
pub mod error;
pub mod exchange;
pub mod manager;
pub mod strategy;

pub use condense::{Condenser, NoopCondenser};
pub use error::{MemoryError, Result};
pub use exchange::{Exchange, SessionInfo, SessionSnapshot};
pub use manager::{MemoryManager, SUMMARY_CONTEXT_PREFIX};
pub use strategy::{MemoryParams, MemoryStrategy, RetentionPolicy, StrategyKind};
